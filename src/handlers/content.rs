use axum::extract::State;

use crate::{
    AppState,
    cache::ContentCache,
    error::{AppError, AppResult},
    extract::{ValidJson, ValidPath, ValidQuery},
    models::{Content, ContentBulkRequest, ContentQuery, ContentUpsert},
    repository::ContentRepository,
    response::ApiResponse,
};

fn normalize_query(query: ContentQuery) -> ContentQuery {
    let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    ContentQuery { page: clean(query.page), section: clean(query.section) }
}

fn prepared(upsert: ContentUpsert) -> AppResult<ContentUpsert> {
    let key = upsert.normalized_key();
    if key.is_empty() {
        return Err(AppError::missing_fields(vec!["key".into()]));
    }
    Ok(ContentUpsert { key, ..upsert })
}

/// Writes `upserts` in order and clears the cache afterwards, including after a failure part
/// way through since the rows written before it are already live.
async fn save_all<R>(
    repo: &R,
    cache: &ContentCache,
    upserts: &[ContentUpsert],
) -> AppResult<Vec<Content>>
where
    R: ContentRepository + ?Sized,
{
    let mut saved = Vec::with_capacity(upserts.len());
    for upsert in upserts {
        match repo.upsert_content(upsert).await {
            Ok(content) => saved.push(content),
            Err(e) => {
                cache.clear();
                return Err(e.into());
            }
        }
    }
    cache.clear();
    Ok(saved)
}

/// list_content
///
/// Active rows for a page/section, served from the content cache when warm.
#[utoipa::path(
    get,
    path = "/api/v1/content",
    params(ContentQuery),
    responses((status = 200, description = "Active content rows", body = [Content])),
    tag = "content"
)]
pub async fn list_content(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<ContentQuery>,
) -> AppResult<ApiResponse<Vec<Content>>> {
    let query = normalize_query(query);
    let rows = state
        .content_cache
        .get_or_load(&query, || {
            state.repo.list_content(query.page.as_deref(), query.section.as_deref())
        })
        .await?;
    Ok(ApiResponse::ok(Vec::clone(&rows), "Content fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/content/{key}",
    params(("key" = String, Path, description = "Content key (case-insensitive)")),
    responses((status = 200, description = "Content row", body = Content), (status = 404, description = "Not found")),
    tag = "content"
)]
pub async fn get_content(
    State(state): State<AppState>,
    ValidPath(key): ValidPath<String>,
) -> AppResult<ApiResponse<Content>> {
    let content = state
        .repo
        .find_content(&key.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::NotFound("Content not found".into()))?;
    Ok(ApiResponse::ok(content, "Content fetched successfully"))
}

#[utoipa::path(
    post,
    path = "/api/v1/content",
    request_body = ContentUpsert,
    responses((status = 200, description = "Saved", body = Content), (status = 400, description = "Missing key")),
    tag = "content"
)]
pub async fn upsert_content(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ContentUpsert>,
) -> AppResult<ApiResponse<Content>> {
    let upsert = prepared(req)?;
    let content = state.repo.upsert_content(&upsert).await?;
    state.content_cache.clear();
    Ok(ApiResponse::ok(content, "Content saved successfully"))
}

/// bulk_upsert_content
///
/// Every item is validated before any is written.
#[utoipa::path(
    put,
    path = "/api/v1/content/bulk",
    request_body = ContentBulkRequest,
    responses((status = 200, description = "Saved rows", body = [Content]), (status = 400, description = "An item has no key")),
    tag = "content"
)]
pub async fn bulk_upsert_content(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ContentBulkRequest>,
) -> AppResult<ApiResponse<Vec<Content>>> {
    let upserts = req
        .items
        .into_iter()
        .map(prepared)
        .collect::<AppResult<Vec<_>>>()?;

    let saved = save_all(&*state.repo, &state.content_cache, &upserts).await?;
    tracing::info!(count = saved.len(), "content saved in bulk");
    Ok(ApiResponse::ok(saved, "Content saved successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/content/{key}",
    params(("key" = String, Path, description = "Content key")),
    responses((status = 200, description = "Deleted"), (status = 404, description = "Not found")),
    tag = "content"
)]
pub async fn delete_content(
    State(state): State<AppState>,
    ValidPath(key): ValidPath<String>,
) -> AppResult<ApiResponse<()>> {
    if !state.repo.delete_content(&key.trim().to_lowercase()).await? {
        return Err(AppError::NotFound("Content not found".into()));
    }
    state.content_cache.clear();
    Ok(ApiResponse::ok((), "Content deleted successfully"))
}

#[utoipa::path(
    post,
    path = "/api/v1/content/cache/clear",
    responses((status = 200, description = "Cache cleared")),
    tag = "content"
)]
pub async fn clear_content_cache(State(state): State<AppState>) -> ApiResponse<()> {
    state.content_cache.clear();
    ApiResponse::ok((), "Content cache cleared")
}
