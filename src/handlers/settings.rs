use axum::extract::State;

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{ValidJson, ValidPath},
    models::{Setting, SettingUpsert},
    response::ApiResponse,
};

fn normalized(key: &str) -> AppResult<String> {
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        return Err(AppError::missing_fields(vec!["key".into()]));
    }
    Ok(key)
}

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    responses((status = 200, description = "Every setting", body = [Setting])),
    tag = "settings"
)]
pub async fn list_settings(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Setting>>> {
    let settings = state.repo.list_settings().await?;
    Ok(ApiResponse::ok(settings, "Settings fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses((status = 200, description = "Setting", body = Setting), (status = 404, description = "Not found")),
    tag = "settings"
)]
pub async fn get_setting(
    State(state): State<AppState>,
    ValidPath(key): ValidPath<String>,
) -> AppResult<ApiResponse<Setting>> {
    let setting = state
        .repo
        .find_setting(&normalized(&key)?)
        .await?
        .ok_or_else(|| AppError::NotFound("Setting not found".into()))?;
    Ok(ApiResponse::ok(setting, "Setting fetched successfully"))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingUpsert,
    responses((status = 200, description = "Saved", body = Setting)),
    tag = "settings"
)]
pub async fn upsert_setting(
    State(state): State<AppState>,
    ValidPath(key): ValidPath<String>,
    ValidJson(req): ValidJson<SettingUpsert>,
) -> AppResult<ApiResponse<Setting>> {
    let key = normalized(&key)?;
    let setting = state.repo.upsert_setting(&key, &req).await?;
    tracing::info!(key = %setting.key, "setting saved");
    Ok(ApiResponse::ok(setting, "Setting saved successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not found")),
    tag = "settings"
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    ValidPath(key): ValidPath<String>,
) -> AppResult<ApiResponse<()>> {
    if !state.repo.delete_setting(&normalized(&key)?).await? {
        return Err(AppError::NotFound("Setting not found".into()));
    }
    Ok(ApiResponse::ok((), "Setting deleted successfully"))
}
