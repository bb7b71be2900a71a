use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Reading the blog, the account flow and the static pages. Reachable anonymously.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers. No database round trip.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Every post, in creation order.
        .route("/", get(handlers::get_all_posts))
        // GET/POST /register
        // On success the new account is logged in straight away.
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        // GET/POST /login
        .route("/login", get(handlers::login_form).post(handlers::login))
        // GET /logout
        // Idempotent: works with or without a session.
        .route("/logout", get(handlers::logout))
        // GET/POST /post/{id}
        // The post page and its comment form. POST needs a logged-in caller.
        .route(
            "/post/{id}",
            get(handlers::show_post).post(handlers::add_comment),
        )
        .route("/about", get(handlers::about))
        .route("/contact", get(handlers::contact))
}
