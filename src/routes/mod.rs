/// Router Module Index
///
/// Routes are split by who may reach them. The split matters because access control
/// is applied per router (as an Axum layer) rather than inside each handler.

/// Routes open to every visitor. Handlers that write (commenting) check the caller
/// themselves and redirect anonymous visitors to the login page.
pub mod public;

/// Routes restricted to the admin role. Wrapped by the `require_role` middleware.
pub mod admin;
