use crate::{AppState, handlers::session};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Self-service for a signed-in member of any role or membership status. The `AuthUser`
/// route layer runs before every handler here.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/me, PATCH /users/me
        .route("/users/me", get(session::me).patch(session::update_me))
        // POST /users/change-password
        // Ends every other session by clearing the stored refresh token.
        .route("/users/change-password", post(session::change_password))
}
