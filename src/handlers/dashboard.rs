use axum::extract::State;

use crate::{AppState, error::AppResult, models::DashboardStats, response::ApiResponse};

/// dashboard_stats
///
/// Headline counts for the admin console.
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    responses(
        (status = 200, description = "Counts", body = DashboardStats),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    ),
    tag = "dashboard"
)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<DashboardStats>> {
    let stats = state.repo.dashboard_stats().await?;
    Ok(ApiResponse::ok(stats, "Dashboard stats fetched successfully"))
}
