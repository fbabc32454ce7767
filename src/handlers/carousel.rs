//! Homepage and branch-page slideshows. A branch carousel names its branch by slug; the slug
//! must exist when the carousel is created or moved.

use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{FormData, ValidPath, ValidQuery, ensure_allowed},
    handlers::deletion_message,
    models::{Carousel, CarouselImage, CarouselQuery, CarouselType, MAX_CAROUSEL_IMAGES},
    repository::{CarouselFilter, Placement},
    response::ApiResponse,
    storage::{
        IMAGE_MIME_TYPES, PurgeReport, StoredObject, VIDEO_MIME_TYPES, discard, purge, store_all,
    },
};

const CONTEXT: &str = "carousel";
const IMAGE_FIELD: &str = "images";

async fn load(state: &AppState, id: Uuid) -> AppResult<Carousel> {
    state
        .repo
        .find_carousel(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Carousel not found".into()))
}

fn parse_type(raw: &str) -> AppResult<CarouselType> {
    CarouselType::parse(raw).ok_or_else(|| AppError::Validation {
        message: "Invalid carousel type".into(),
        errors: vec![CarouselType::Home.as_str().into(), CarouselType::Branch.as_str().into()],
    })
}

/// resolve_branch
///
/// The `branch` value a carousel of `carousel_type` stores: `None` for home carousels, an
/// existing branch slug otherwise.
async fn resolve_branch(
    state: &AppState,
    carousel_type: CarouselType,
    branch: Option<String>,
) -> AppResult<Option<String>> {
    match carousel_type {
        CarouselType::Home => Ok(None),
        CarouselType::Branch => {
            let slug = branch
                .map(|b| b.trim().to_lowercase())
                .filter(|b| !b.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("Branch is required for branch type carousel".into())
                })?;
            if state.repo.find_branch_by_slug(&slug).await?.is_none() {
                return Err(AppError::NotFound("Branch not found for carousel".into()));
            }
            Ok(Some(slug))
        }
    }
}

/// Stores the request's images with their alt texts; a missing alt falls back to the title.
async fn store_images(
    state: &AppState,
    form: &FormData,
    already_attached: usize,
    title: &str,
) -> AppResult<Vec<CarouselImage>> {
    let uploads = form.files(IMAGE_FIELD);
    ensure_allowed(&uploads, &[IMAGE_MIME_TYPES, VIDEO_MIME_TYPES])?;
    if already_attached + uploads.len() > MAX_CAROUSEL_IMAGES {
        return Err(AppError::validation(format!(
            "A carousel can have at most {MAX_CAROUSEL_IMAGES} images"
        )));
    }
    let alts = form.json::<Vec<String>>("alts")?.unwrap_or_default();
    let stored = store_all(state.storage.as_ref(), &uploads, CONTEXT).await?;
    Ok(stored
        .into_iter()
        .enumerate()
        .map(|(i, object)| {
            let alt = alts
                .get(i)
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| title.to_string());
            CarouselImage {
                id: Uuid::new_v4(),
                url: object.url,
                mimetype: object.mimetype,
                public_id: object.public_id,
                alt,
            }
        })
        .collect())
}

fn stored_objects(images: &[CarouselImage]) -> Vec<StoredObject> {
    images
        .iter()
        .map(|i| StoredObject {
            url: i.url.clone(),
            public_id: i.public_id.clone(),
            mimetype: i.mimetype.clone(),
        })
        .collect()
}

fn filter_from(query: CarouselQuery, active_only: bool) -> AppResult<CarouselFilter> {
    let carousel_type = match query.carousel_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_type(raw)?),
    };
    let branch = query
        .branch
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty());
    Ok(CarouselFilter { carousel_type, branch, active_only })
}

/// list_carousels
///
/// Public listing: active carousels only, optionally narrowed by `type` and `branch`.
#[utoipa::path(
    get,
    path = "/api/v1/carousel",
    params(CarouselQuery),
    responses((status = 200, description = "Active carousels by order", body = [Carousel]), (status = 400, description = "Unknown type")),
    tag = "carousel"
)]
pub async fn list_carousels(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CarouselQuery>,
) -> AppResult<ApiResponse<Vec<Carousel>>> {
    let carousels = state.repo.list_carousels(&filter_from(query, true)?).await?;
    Ok(ApiResponse::ok(carousels, "Carousels fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/carousel/all",
    params(CarouselQuery),
    responses((status = 200, description = "Every carousel, including inactive ones", body = [Carousel])),
    tag = "carousel"
)]
pub async fn list_all_carousels(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CarouselQuery>,
) -> AppResult<ApiResponse<Vec<Carousel>>> {
    let carousels = state.repo.list_carousels(&filter_from(query, false)?).await?;
    Ok(ApiResponse::ok(carousels, "Carousels fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/carousel/{id}",
    params(("id" = Uuid, Path, description = "Carousel id")),
    responses((status = 200, description = "Carousel", body = Carousel), (status = 404, description = "Not found")),
    tag = "carousel"
)]
pub async fn get_carousel(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<Carousel>> {
    Ok(ApiResponse::ok(load(&state, id).await?, "Carousel fetched successfully"))
}

/// create_carousel
///
/// `type` defaults to `home`. Without an explicit `order` the carousel is placed after the
/// last one sharing its (type, branch) pair.
#[utoipa::path(
    post,
    path = "/api/v1/carousel",
    request_body(content_type = "multipart/form-data", description = "title, type, branch, isActive, order, alts (JSON array), images (1 to 10)"),
    responses(
        (status = 201, description = "Created", body = Carousel),
        (status = 400, description = "Invalid input or missing branch"),
        (status = 404, description = "Unknown branch slug")
    ),
    tag = "carousel"
)]
pub async fn create_carousel(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<Carousel>> {
    let title = form
        .non_empty("title")
        .ok_or_else(|| AppError::missing_fields(vec!["title".into()]))?;
    let carousel_type = match form.non_empty("type") {
        Some(raw) => parse_type(&raw)?,
        None => CarouselType::default(),
    };
    let branch = resolve_branch(&state, carousel_type, form.non_empty("branch")).await?;
    if form.files(IMAGE_FIELD).is_empty() {
        return Err(AppError::validation("At least one image is required"));
    }
    let is_active = form.flag("isActive")?.unwrap_or(true);
    let placement = form.int("order")?.map_or(Placement::Append, Placement::Explicit);

    let images = store_images(&state, &form, 0, &title).await?;
    let now = Utc::now();
    let carousel = Carousel {
        id: Uuid::new_v4(),
        title,
        carousel_type,
        branch,
        images,
        is_active,
        order: 0,
        created_at: now,
        updated_at: now,
    };
    let carousel = match state.repo.insert_carousel(&carousel, placement).await {
        Ok(carousel) => carousel,
        Err(e) => {
            discard(state.storage.as_ref(), &stored_objects(&carousel.images)).await;
            return Err(e.into());
        }
    };
    tracing::info!(
        id = %carousel.id,
        carousel_type = carousel.carousel_type.as_str(),
        order = carousel.order,
        "carousel created"
    );
    Ok(ApiResponse::created(carousel, "Carousel created successfully"))
}

/// update_carousel
///
/// Changing `type` or `branch` revalidates the pair. New images are appended.
#[utoipa::path(
    patch,
    path = "/api/v1/carousel/{id}",
    params(("id" = Uuid, Path, description = "Carousel id")),
    request_body(content_type = "multipart/form-data", description = "Any carousel field plus additional images"),
    responses((status = 200, description = "Updated", body = Carousel), (status = 404, description = "Not found")),
    tag = "carousel"
)]
pub async fn update_carousel(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    form: FormData,
) -> AppResult<ApiResponse<Carousel>> {
    let mut carousel = load(&state, id).await?;

    if let Some(title) = form.non_empty("title") {
        carousel.title = title;
    }
    if form.has("type") || form.has("branch") {
        let carousel_type = match form.non_empty("type") {
            Some(raw) => parse_type(&raw)?,
            None => carousel.carousel_type,
        };
        let branch = form.non_empty("branch").or_else(|| carousel.branch.clone());
        carousel.branch = resolve_branch(&state, carousel_type, branch).await?;
        carousel.carousel_type = carousel_type;
    }
    if let Some(active) = form.flag("isActive")? {
        carousel.is_active = active;
    }
    if let Some(order) = form.int("order")? {
        carousel.order = order;
    }

    let added = store_images(&state, &form, carousel.images.len(), &carousel.title).await?;
    let added_objects = stored_objects(&added);
    carousel.images.extend(added);

    let updated = match state.repo.update_carousel(&carousel).await {
        Ok(updated) => updated,
        Err(e) => {
            discard(state.storage.as_ref(), &added_objects).await;
            return Err(e.into());
        }
    };
    Ok(ApiResponse::ok(updated, "Carousel updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/carousel/{id}",
    params(("id" = Uuid, Path, description = "Carousel id")),
    responses((status = 200, description = "Deleted", body = PurgeReport), (status = 404, description = "Not found")),
    tag = "carousel"
)]
pub async fn delete_carousel(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    let carousel = load(&state, id).await?;
    let files: Vec<(String, String)> = carousel
        .images
        .iter()
        .map(|i| (i.public_id.clone(), i.mimetype.clone()))
        .collect();
    let report = purge(state.storage.as_ref(), &files).await;
    if !state.repo.delete_carousel(id).await? {
        return Err(AppError::NotFound("Carousel not found".into()));
    }
    let message = deletion_message("Carousel", &report);
    Ok(ApiResponse::ok(report, message))
}

/// delete_carousel_image
///
/// Removes one image, storage object first. The carousel goes with its last image.
#[utoipa::path(
    delete,
    path = "/api/v1/carousel/{id}/images/{image_id}",
    params(
        ("id" = Uuid, Path, description = "Carousel id"),
        ("image_id" = Uuid, Path, description = "Image id")
    ),
    responses((status = 200, description = "Image removed; the remaining carousel, or null when it was the last image", body = Carousel), (status = 404, description = "Carousel or image not found")),
    tag = "carousel"
)]
pub async fn delete_carousel_image(
    State(state): State<AppState>,
    ValidPath((id, image_id)): ValidPath<(Uuid, Uuid)>,
) -> AppResult<ApiResponse<Option<Carousel>>> {
    let mut carousel = load(&state, id).await?;
    let position = carousel
        .images
        .iter()
        .position(|i| i.id == image_id)
        .ok_or_else(|| AppError::NotFound("Image not found in this carousel".into()))?;

    let image = carousel.images.remove(position);
    state.storage.delete(&image.public_id, &image.mimetype).await?;

    if carousel.images.is_empty() {
        state.repo.delete_carousel(id).await?;
        tracing::info!(id = %id, "carousel deleted with its last image");
        return Ok(ApiResponse::ok(None, "Last image removed; carousel deleted"));
    }
    let updated = state.repo.update_carousel(&carousel).await?;
    Ok(ApiResponse::ok(Some(updated), "Image removed successfully"))
}
