use axum::{Router, extract::FromRef, http::HeaderName, middleware};

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod session;
pub mod views;

// Routing, split by access level (Public, Admin).
pub mod routes;
use auth::{RoleGuard, require_role};
use models::Role;
use routes::{admin, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{MemorySessionStore, Sessions};

/// AppState
///
/// The single, cloneable container for everything a request may need. Shared across
/// all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: users, posts and comments.
    pub repo: RepositoryState,
    /// Session manager: cookie signing plus the server-side session store.
    pub sessions: Sessions,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for Sessions {
    fn from_ref(app_state: &AppState) -> Sessions {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the scoped access middleware and the
/// global observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let admin_guard = RoleGuard::new(state.clone(), Role::Admin);

    let base_router = Router::new()
        // Public Routes: no middleware applied.
        .merge(public::public_routes())
        // Admin Routes: the role check runs before the handler, so a rejected
        // request never reaches the repository.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(admin_guard, require_role)),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    // Observability and Correlation Layers (outermost)
    base_router.layer(
        ServiceBuilder::new()
            // Request ID Generation: a unique UUID for every incoming request.
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            // Request Tracing: one span per request, carrying the request ID.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // Request ID Propagation: echo x-request-id back to the client.
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the span for `TraceLayer`: method, URI and the `x-request-id` header, so
/// every log line of one request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
