/// Router Module Index
///
/// Routes are split by access level so the gate is applied once per router (as an Axum
/// route layer in `lib.rs`) instead of inside each handler. Routers sharing a path with
/// different methods are merged, so `GET /branches/{id}` can stay public while
/// `PATCH /branches/{id}` is admin-only.

/// Routes open to anonymous clients: published content and the session entry points.
pub mod public;

/// Routes that need a valid session (any role).
pub mod authenticated;

/// Routes restricted to admins. Unauthenticated callers get 401, non-admins 403.
pub mod admin;
