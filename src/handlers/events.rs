use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{FormData, ValidJson, ValidPath, ValidQuery, ensure_allowed},
    handlers::deletion_message,
    models::{Event, EventFile, EventSearchQuery, RemoveFileRequest, check_event_files},
    response::ApiResponse,
    storage::{
        DOCUMENT_MIME_TYPES, IMAGE_MIME_TYPES, PurgeReport, StoredObject, VIDEO_MIME_TYPES, discard,
        purge, store_all,
    },
};

const CONTEXT: &str = "events";
const FILE_FIELD: &str = "files";

async fn load(state: &AppState, id: Uuid) -> AppResult<Event> {
    state
        .repo
        .find_event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

fn optional(form: &FormData, field: &str) -> Option<String> {
    form.non_empty(field)
}

/// Validates the uploads of a request and stores them, after checking the combined file list
/// (already attached plus new) against the per-category ceilings.
async fn store_event_files(
    state: &AppState,
    form: &FormData,
    existing: &[EventFile],
) -> AppResult<Vec<StoredObject>> {
    let uploads = form.files(FILE_FIELD);
    ensure_allowed(&uploads, &[IMAGE_MIME_TYPES, VIDEO_MIME_TYPES, DOCUMENT_MIME_TYPES])?;

    let mut combined = existing.to_vec();
    combined.extend(uploads.iter().map(|f| EventFile {
        url: f.file_name.clone(),
        mimetype: f.content_type.clone(),
    }));
    check_event_files(&combined).map_err(AppError::validation)?;

    Ok(store_all(state.storage.as_ref(), &uploads, CONTEXT).await?)
}

fn as_event_files(stored: &[StoredObject]) -> Vec<EventFile> {
    stored
        .iter()
        .map(|o| EventFile { url: o.url.clone(), mimetype: o.mimetype.clone() })
        .collect()
}

/// Every event, newest first. Events have no draft state.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    responses((status = 200, description = "Events, newest first", body = [Event])),
    tag = "events"
)]
pub async fn list_events(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<Event>>> {
    let events = state.repo.list_events(None).await?;
    Ok(ApiResponse::ok(events, "Events fetched successfully"))
}

/// search_events
///
/// Case-insensitive substring match on the title.
#[utoipa::path(
    get,
    path = "/api/v1/events/search",
    params(EventSearchQuery),
    responses((status = 200, description = "Matching events", body = [Event]), (status = 400, description = "Missing title")),
    tag = "events"
)]
pub async fn search_events(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<EventSearchQuery>,
) -> AppResult<ApiResponse<Vec<Event>>> {
    let needle = query.title.trim().to_lowercase();
    if needle.is_empty() {
        return Err(AppError::validation("Search title is required"));
    }
    let events = state.repo.list_events(Some(&needle)).await?;
    Ok(ApiResponse::ok(events, "Events fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses((status = 200, description = "Event", body = Event), (status = 404, description = "Not found")),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<Event>> {
    Ok(ApiResponse::ok(load(&state, id).await?, "Event fetched successfully"))
}

/// create_event
///
/// Title and description are stored lowercased; a title already in use is a conflict.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    request_body(content_type = "multipart/form-data", description = "title, description, date, time, location, files"),
    responses((status = 201, description = "Created", body = Event), (status = 400, description = "Invalid input or duplicate title")),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<Event>> {
    let title = form
        .non_empty("title")
        .ok_or_else(|| AppError::missing_fields(vec!["title".into()]))?
        .to_lowercase();

    let stored = store_event_files(&state, &form, &[]).await?;
    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        title,
        description: form.text("description").unwrap_or_default().to_lowercase(),
        date: optional(&form, "date"),
        time: optional(&form, "time"),
        location: optional(&form, "location"),
        files: as_event_files(&stored),
        created_at: now,
        updated_at: now,
    };
    let event = match state.repo.insert_event(&event).await {
        Ok(event) => event,
        Err(e) => {
            discard(state.storage.as_ref(), &stored).await;
            return Err(e.into());
        }
    };
    tracing::info!(id = %event.id, files = event.files.len(), "event created");
    Ok(ApiResponse::created(event, "Event created successfully"))
}

/// update_event
///
/// New `files` are appended to the existing attachments; the limits apply to the result.
#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body(content_type = "multipart/form-data", description = "Any event field plus additional files"),
    responses((status = 200, description = "Updated", body = Event), (status = 404, description = "Not found")),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    form: FormData,
) -> AppResult<ApiResponse<Event>> {
    let mut event = load(&state, id).await?;

    if let Some(title) = form.non_empty("title") {
        event.title = title.to_lowercase();
    }
    if let Some(description) = form.text("description") {
        event.description = description.to_lowercase();
    }
    let optional_fields: [(&str, &mut Option<String>); 3] = [
        ("date", &mut event.date),
        ("time", &mut event.time),
        ("location", &mut event.location),
    ];
    for (field, slot) in optional_fields {
        if form.has(field) {
            *slot = optional(&form, field);
        }
    }

    let stored = store_event_files(&state, &form, &event.files).await?;
    event.files.extend(as_event_files(&stored));

    let updated = match state.repo.update_event(&event).await {
        Ok(updated) => updated,
        Err(e) => {
            discard(state.storage.as_ref(), &stored).await;
            return Err(e.into());
        }
    };
    Ok(ApiResponse::ok(updated, "Event updated successfully"))
}

/// delete_event
///
/// Every attachment is deleted from storage before the event itself; files that could not be
/// removed are listed in the response.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses((status = 200, description = "Deleted", body = PurgeReport), (status = 404, description = "Not found")),
    tag = "events"
)]
pub async fn delete_event(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    let event = load(&state, id).await?;
    let files: Vec<(String, String)> = event
        .files
        .iter()
        .map(|f| (f.url.clone(), f.mimetype.clone()))
        .collect();
    let report = purge(state.storage.as_ref(), &files).await;
    if !state.repo.delete_event(id).await? {
        return Err(AppError::NotFound("Event not found".into()));
    }
    tracing::info!(
        id = %id,
        removed = report.removed,
        failed = report.failed.len(),
        "event deleted"
    );
    let message = deletion_message("Event", &report);
    Ok(ApiResponse::ok(report, message))
}

/// remove_event_file
///
/// Deletes one attachment, storage object first.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}/files",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = RemoveFileRequest,
    responses((status = 200, description = "File removed", body = Event), (status = 404, description = "Event or file not found")),
    tag = "events"
)]
pub async fn remove_event_file(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<RemoveFileRequest>,
) -> AppResult<ApiResponse<Event>> {
    let mut event = load(&state, id).await?;
    let position = event
        .files
        .iter()
        .position(|f| f.url == req.url)
        .ok_or_else(|| AppError::NotFound("File not found on this event".into()))?;

    let file = event.files.remove(position);
    state.storage.delete(&file.url, &file.mimetype).await?;
    let updated = state.repo.update_event(&event).await?;
    Ok(ApiResponse::ok(updated, "File removed successfully"))
}
