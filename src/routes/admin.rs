use crate::{
    AppState,
    handlers::{branches, carousel, committee, content, dashboard, events, gallery, settings, users},
};
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

/// Admin Router Module
///
/// Membership administration and every publishing mutation. The whole router sits behind
/// the `AdminUser` route layer.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(dashboard::dashboard_stats))
        // --- Members ---
        .route("/users", get(users::list_users))
        .route("/users/export", get(users::export_users))
        .route("/users/bulk-import", post(users::bulk_import))
        // Admin-only although they only read: both leak whether an identity is registered.
        .route("/users/check-availability", get(users::check_availability))
        .route("/users/employee/{employee_id}", get(users::find_by_employee_id))
        .route(
            "/users/{id}",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        .route("/users/{id}/approve", post(users::approve_membership))
        .route("/users/{id}/decline", post(users::decline_membership))
        // --- Events ---
        .route("/events", post(events::create_event))
        .route("/events/{id}", patch(events::update_event).delete(events::delete_event))
        .route("/events/{id}/files", delete(events::remove_event_file))
        // --- Gallery ---
        .route("/gallery", post(gallery::create_gallery_post))
        .route(
            "/gallery/{id}",
            patch(gallery::update_gallery_post).delete(gallery::delete_gallery_post),
        )
        .route("/gallery/{id}/images/{image_id}", delete(gallery::delete_gallery_image))
        // --- Committee ---
        .route("/committee-members", post(committee::create_committee_member))
        .route(
            "/committee-members/{id}",
            patch(committee::update_committee_member).delete(committee::delete_committee_member),
        )
        // --- Branches ---
        .route("/branches", post(branches::create_branch))
        .route("/branches/all", get(branches::list_all_branches))
        .route(
            "/branches/{id}",
            patch(branches::update_branch).delete(branches::delete_branch),
        )
        .route("/branches/{id}/status", patch(branches::set_branch_status))
        // --- Carousel ---
        .route("/carousel", post(carousel::create_carousel))
        .route("/carousel/all", get(carousel::list_all_carousels))
        .route(
            "/carousel/{id}",
            patch(carousel::update_carousel).delete(carousel::delete_carousel),
        )
        .route("/carousel/{id}/images/{image_id}", delete(carousel::delete_carousel_image))
        // --- Content & settings ---
        .route("/content", post(content::upsert_content))
        .route("/content/bulk", put(content::bulk_upsert_content))
        .route("/content/cache/clear", post(content::clear_content_cache))
        .route("/content/{key}", delete(content::delete_content))
        .route(
            "/settings/{key}",
            put(settings::upsert_setting).delete(settings::delete_setting),
        )
}
