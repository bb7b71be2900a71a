use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Post authoring. Every route here is wrapped in the `require_role` middleware with
/// `Role::Admin` (see `create_router`), so non-admins are rejected with 403 before
/// any handler runs and before any data is touched.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /new-post
        .route(
            "/new-post",
            get(handlers::new_post_form).post(handlers::create_post),
        )
        // GET/POST /edit-post/{id}
        // Edits in place. The post keeps its original date.
        .route(
            "/edit-post/{id}",
            get(handlers::edit_post_form).post(handlers::edit_post),
        )
        // GET /delete/{id}
        // Removes the post and its comments. A plain link, no confirmation.
        .route("/delete/{id}", get(handlers::delete_post))
}
