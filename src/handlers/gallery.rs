use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{FormData, ValidPath, ValidQuery, ensure_allowed},
    handlers::deletion_message,
    models::{GalleryCategory, GalleryImage, GalleryPost, GalleryQuery, MAX_GALLERY_IMAGES},
    response::ApiResponse,
    storage::{IMAGE_MIME_TYPES, PurgeReport, StoredObject, discard, purge, store_all},
};

const CONTEXT: &str = "gallery";
const IMAGE_FIELD: &str = "images";

async fn load(state: &AppState, id: Uuid) -> AppResult<GalleryPost> {
    state
        .repo
        .find_gallery_post(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Gallery post not found".into()))
}

fn parse_category(raw: &str) -> AppResult<GalleryCategory> {
    GalleryCategory::parse(raw).ok_or_else(|| AppError::Validation {
        message: "Invalid gallery category".into(),
        errors: GalleryCategory::ALL.iter().map(|c| c.as_str().to_string()).collect(),
    })
}

/// Stores the request's images once the post would stay within `MAX_GALLERY_IMAGES`.
async fn store_images(
    state: &AppState,
    form: &FormData,
    already_attached: usize,
) -> AppResult<Vec<GalleryImage>> {
    let uploads = form.files(IMAGE_FIELD);
    ensure_allowed(&uploads, &[IMAGE_MIME_TYPES])?;
    if already_attached + uploads.len() > MAX_GALLERY_IMAGES {
        return Err(AppError::validation(format!(
            "A gallery post can have at most {MAX_GALLERY_IMAGES} images"
        )));
    }
    let stored = store_all(state.storage.as_ref(), &uploads, CONTEXT).await?;
    Ok(stored.into_iter().map(gallery_image).collect())
}

fn gallery_image(object: StoredObject) -> GalleryImage {
    GalleryImage {
        id: Uuid::new_v4(),
        url: object.url,
        mimetype: object.mimetype,
        public_id: object.public_id,
    }
}

fn stored_objects(images: &[GalleryImage]) -> Vec<StoredObject> {
    images
        .iter()
        .map(|i| StoredObject {
            url: i.url.clone(),
            public_id: i.public_id.clone(),
            mimetype: i.mimetype.clone(),
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/v1/gallery",
    params(GalleryQuery),
    responses((status = 200, description = "Gallery posts, newest first", body = [GalleryPost]), (status = 400, description = "Unknown category")),
    tag = "gallery"
)]
pub async fn list_gallery(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<GalleryQuery>,
) -> AppResult<ApiResponse<Vec<GalleryPost>>> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_category(raw)?),
    };
    let posts = state.repo.list_gallery_posts(category).await?;
    Ok(ApiResponse::ok(posts, "Gallery posts fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/gallery/categories",
    responses((status = 200, description = "Every gallery category", body = [GalleryCategory])),
    tag = "gallery"
)]
pub async fn list_categories() -> ApiResponse<Vec<GalleryCategory>> {
    ApiResponse::ok(GalleryCategory::ALL.to_vec(), "Gallery categories fetched successfully")
}

#[utoipa::path(
    get,
    path = "/api/v1/gallery/{id}",
    params(("id" = Uuid, Path, description = "Gallery post id")),
    responses((status = 200, description = "Gallery post", body = GalleryPost), (status = 404, description = "Not found")),
    tag = "gallery"
)]
pub async fn get_gallery_post(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<GalleryPost>> {
    Ok(ApiResponse::ok(load(&state, id).await?, "Gallery post fetched successfully"))
}

/// create_gallery_post
///
/// At least one image is required. An absent or blank category falls back to `Other`.
#[utoipa::path(
    post,
    path = "/api/v1/gallery",
    request_body(content_type = "multipart/form-data", description = "title, category, date, images (1 to 20)"),
    responses((status = 201, description = "Created", body = GalleryPost), (status = 400, description = "Invalid input")),
    tag = "gallery"
)]
pub async fn create_gallery_post(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<GalleryPost>> {
    let mut missing = Vec::new();
    let title = form.non_empty("title");
    if title.is_none() {
        missing.push("title".to_string());
    }
    if form.files(IMAGE_FIELD).is_empty() {
        missing.push(IMAGE_FIELD.to_string());
    }
    if !missing.is_empty() {
        return Err(AppError::missing_fields(missing));
    }
    let category = match form.non_empty("category") {
        Some(raw) => parse_category(&raw)?,
        None => GalleryCategory::default(),
    };

    let images = store_images(&state, &form, 0).await?;
    let now = Utc::now();
    let post = GalleryPost {
        id: Uuid::new_v4(),
        title: title.unwrap_or_default(),
        category,
        date: form.text("date").unwrap_or_default(),
        images,
        created_at: now,
        updated_at: now,
    };
    let post = match state.repo.insert_gallery_post(&post).await {
        Ok(post) => post,
        Err(e) => {
            discard(state.storage.as_ref(), &stored_objects(&post.images)).await;
            return Err(e.into());
        }
    };
    tracing::info!(id = %post.id, images = post.images.len(), "gallery post created");
    Ok(ApiResponse::created(post, "Gallery post created successfully"))
}

/// update_gallery_post
///
/// Edits title, category and date. Uploaded images are appended after the existing ones,
/// within the per-post cap; existing images are removed one by one elsewhere.
#[utoipa::path(
    patch,
    path = "/api/v1/gallery/{id}",
    params(("id" = Uuid, Path, description = "Gallery post id")),
    request_body(content_type = "multipart/form-data", description = "title, category, date and additional images"),
    responses((status = 200, description = "Updated", body = GalleryPost), (status = 404, description = "Not found")),
    tag = "gallery"
)]
pub async fn update_gallery_post(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    form: FormData,
) -> AppResult<ApiResponse<GalleryPost>> {
    let mut post = load(&state, id).await?;
    if let Some(title) = form.non_empty("title") {
        post.title = title;
    }
    if let Some(raw) = form.non_empty("category") {
        post.category = parse_category(&raw)?;
    }
    if let Some(date) = form.text("date") {
        post.date = date;
    }

    let added = store_images(&state, &form, post.images.len()).await?;
    let added_objects = stored_objects(&added);
    post.images.extend(added);

    let updated = match state.repo.update_gallery_post(&post).await {
        Ok(updated) => updated,
        Err(e) => {
            discard(state.storage.as_ref(), &added_objects).await;
            return Err(e.into());
        }
    };
    Ok(ApiResponse::ok(updated, "Gallery post updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/gallery/{id}",
    params(("id" = Uuid, Path, description = "Gallery post id")),
    responses((status = 200, description = "Deleted", body = PurgeReport), (status = 404, description = "Not found")),
    tag = "gallery"
)]
pub async fn delete_gallery_post(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    let post = load(&state, id).await?;
    let files: Vec<(String, String)> = post
        .images
        .iter()
        .map(|i| (i.public_id.clone(), i.mimetype.clone()))
        .collect();
    let report = purge(state.storage.as_ref(), &files).await;
    if !state.repo.delete_gallery_post(id).await? {
        return Err(AppError::NotFound("Gallery post not found".into()));
    }
    let message = deletion_message("Gallery post", &report);
    Ok(ApiResponse::ok(report, message))
}

/// delete_gallery_image
///
/// Removes one image, storage object first. Removing the last image deletes the whole post,
/// in which case `data` is null.
#[utoipa::path(
    delete,
    path = "/api/v1/gallery/{id}/images/{image_id}",
    params(
        ("id" = Uuid, Path, description = "Gallery post id"),
        ("image_id" = Uuid, Path, description = "Image id")
    ),
    responses((status = 200, description = "Image removed; the remaining post, or null when it was the last image", body = GalleryPost), (status = 404, description = "Post or image not found")),
    tag = "gallery"
)]
pub async fn delete_gallery_image(
    State(state): State<AppState>,
    ValidPath((id, image_id)): ValidPath<(Uuid, Uuid)>,
) -> AppResult<ApiResponse<Option<GalleryPost>>> {
    let mut post = load(&state, id).await?;
    let position = post
        .images
        .iter()
        .position(|i| i.id == image_id)
        .ok_or_else(|| AppError::NotFound("Image not found in this gallery post".into()))?;

    let image = post.images.remove(position);
    state.storage.delete(&image.public_id, &image.mimetype).await?;

    if post.images.is_empty() {
        state.repo.delete_gallery_post(id).await?;
        tracing::info!(id = %id, "gallery post deleted with its last image");
        return Ok(ApiResponse::ok(None, "Last image removed; gallery post deleted"));
    }
    let updated = state.repo.update_gallery_post(&post).await?;
    Ok(ApiResponse::ok(Some(updated), "Image removed successfully"))
}
