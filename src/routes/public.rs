use crate::{
    AppState,
    handlers::{branches, carousel, committee, content, events, gallery, session, settings},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only access to everything the public site renders, plus registration and the
/// login / logout / token refresh / password reset flows.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // --- Session ---
        .route("/users/register", post(session::register))
        .route("/users/login", post(session::login))
        .route("/users/logout", post(session::logout))
        .route("/users/refresh-token", post(session::refresh_token))
        .route("/users/forgot-password", post(session::forgot_password))
        .route("/users/reset-password", post(session::reset_password))
        // --- Publishing ---
        .route("/events", get(events::list_events))
        .route("/events/search", get(events::search_events))
        .route("/events/{id}", get(events::get_event))
        .route("/gallery", get(gallery::list_gallery))
        .route("/gallery/categories", get(gallery::list_categories))
        .route("/gallery/{id}", get(gallery::get_gallery_post))
        .route("/committee-members", get(committee::list_committee))
        .route("/committee-members/{id}", get(committee::get_committee_member))
        // Only active branches are listed here; `/branches/all` is admin-only.
        .route("/branches", get(branches::list_branches))
        .route("/branches/slug/{slug}", get(branches::get_branch_by_slug))
        .route("/branches/{id}", get(branches::get_branch))
        .route("/carousel", get(carousel::list_carousels))
        .route("/carousel/{id}", get(carousel::get_carousel))
        .route("/content", get(content::list_content))
        .route("/content/{key}", get(content::get_content))
        .route("/settings", get(settings::list_settings))
        .route("/settings/{key}", get(settings::get_setting))
}
