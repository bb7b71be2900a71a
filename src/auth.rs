use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    config::AppConfig,
    error::AppError,
    models::{Role, User},
    repository::RepositoryState,
    session::Sessions,
};

/// CurrentUser
///
/// The resolved identity of the caller. `Anonymous` is a real value, not an error:
/// every handler and template can ask it questions unconditionally.
#[derive(Debug, Clone, Default)]
pub enum CurrentUser {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl CurrentUser {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, CurrentUser::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            CurrentUser::Authenticated(user) => Some(user),
            CurrentUser::Anonymous => None,
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.user().map(|user| user.id)
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|user| user.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }
}

/// CurrentUser Extractor Implementation
///
/// Resolves the caller from the session cookie:
/// 1. Verify the signed token and find the server-side session.
/// 2. Load the user the session points at.
///
/// A missing, forged, expired or stale session yields `Anonymous`. The only rejection
/// is a database failure while loading the user.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    Sessions: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let sessions = Sessions::from_ref(state);

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(user_id) = sessions.user_id(&jar).await else {
            return Ok(CurrentUser::Anonymous);
        };

        // The session may outlive the user row it points at.
        match repo.get_user(user_id).await? {
            Some(user) => Ok(CurrentUser::Authenticated(user)),
            None => Ok(CurrentUser::Anonymous),
        }
    }
}

/// RoleGuard
///
/// State for the `require_role` middleware: the application state plus the role the
/// guarded routes demand.
#[derive(Clone)]
pub struct RoleGuard {
    pub state: AppState,
    pub role: Role,
}

impl RoleGuard {
    pub fn new(state: AppState, role: Role) -> Self {
        Self { state, role }
    }
}

/// require_role
///
/// Middleware composed in front of a router. Resolves the caller and rejects with
/// 403 before the wrapped handler runs unless the caller holds the guard's role.
pub async fn require_role(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let current = CurrentUser::from_request_parts(&mut parts, &guard.state).await?;

    if current.role() != Some(guard.role) {
        tracing::warn!(
            user_id = ?current.id(),
            required = %guard.role,
            path = %parts.uri.path(),
            "authorization denied"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// assign_role
///
/// Decides the role of a new account at creation time. With `ADMIN_EMAIL` configured
/// only that address becomes admin; without it the very first account bootstraps as admin.
pub fn assign_role(config: &AppConfig, email: &str, existing_users: i64) -> Role {
    match &config.admin_email {
        Some(admin_email) if admin_email.eq_ignore_ascii_case(email) => Role::Admin,
        Some(_) => Role::Reader,
        None if existing_users == 0 => Role::Admin,
        None => Role::Reader,
    }
}
