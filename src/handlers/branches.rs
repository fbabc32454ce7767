//! Branch directory. Branch pages carry structured sub-documents that arrive as JSON text
//! inside the multipart body, and team member photos uploaded as one repeated
//! `teamMemberPhotos` field referenced by position (`photoIndex`).

use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AdminUser,
    error::{AppError, AppResult},
    extract::{FormData, ValidJson, ValidPath, ensure_allowed},
    handlers::{deletion_message, linked_users, purge_replaced},
    models::{
        Branch, BranchContact, BranchService, BranchStatusRequest, BranchView, TeamMember,
        TeamMemberInput, TeamMemberView, UniqueProgram, slugify,
    },
    repository::Placement,
    response::ApiResponse,
    storage::{IMAGE_MIME_TYPES, PurgeReport, StoredObject, discard, purge, store_all},
};

async fn load(state: &AppState, id: Uuid) -> AppResult<Branch> {
    state
        .repo
        .find_branch(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Branch not found".into()))
}

async fn views(state: &AppState, branches: Vec<Branch>) -> AppResult<Vec<BranchView>> {
    let ids = branches
        .iter()
        .flat_map(|b| b.team_members.iter().filter_map(|m| m.user_id))
        .collect::<Vec<Uuid>>();
    let linked = linked_users(&state.repo, ids).await?;
    Ok(branches
        .into_iter()
        .map(|branch| {
            let team = branch
                .team_members
                .iter()
                .cloned()
                .map(|m| {
                    let link = m.user_id.and_then(|id| linked.get(&id).cloned());
                    TeamMemberView::resolve(m, link)
                })
                .collect();
            BranchView { branch, team }
        })
        .collect())
}

async fn single_view(state: &AppState, branch: Branch) -> AppResult<BranchView> {
    views(state, vec![branch])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("branch view resolution lost the branch".into()))
}

/// Slug for a branch name, rejecting names with no usable characters.
fn slug_for(name: &str) -> AppResult<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::validation("Branch name must contain letters or digits"));
    }
    Ok(slug)
}

async fn ensure_slug_free(state: &AppState, slug: &str, exclude: Option<Uuid>) -> AppResult<()> {
    match state.repo.find_branch_by_slug(slug).await? {
        Some(existing) if Some(existing.id) != exclude => Err(AppError::Conflict {
            message: format!("A branch with a similar name already exists (slug '{slug}')"),
            fields: vec!["slug".into()],
        }),
        _ => Ok(()),
    }
}

/// resolve_team
///
/// Turns submitted team members into stored ones. `photoIndex` selects an entry of the
/// uploaded `teamMemberPhotos`. A submitted `profilePic` stays owned only when it is one of
/// `owned_before`, the photos this branch uploaded earlier; any other URL is kept as a
/// display-only borrow and never deleted with the branch.
fn resolve_team(
    inputs: Vec<TeamMemberInput>,
    photos: &[StoredObject],
    owned_before: &[String],
) -> AppResult<Vec<TeamMember>> {
    inputs
        .into_iter()
        .map(|input| {
            let (profile_pic, photo_owned) = match input.photo_index {
                Some(index) => {
                    let object = photos.get(index).ok_or_else(|| {
                        AppError::validation(format!(
                            "Team member photo index {index} is out of range"
                        ))
                    })?;
                    (Some(object.url.clone()), true)
                }
                None => {
                    let pic = input.profile_pic.filter(|p| !p.trim().is_empty());
                    let owned = pic.as_ref().is_some_and(|p| owned_before.contains(p));
                    (pic, owned)
                }
            };
            Ok(TeamMember {
                user_id: input.user_id,
                name: input.name.trim().to_string(),
                position: input.position.trim().to_string(),
                experience: input.experience.trim().to_string(),
                profile_pic,
                photo_owned,
            })
        })
        .collect()
}

/// Applies every branch field present in the form onto `branch`.
fn apply_fields(branch: &mut Branch, form: &FormData) -> AppResult<()> {
    let text_fields: [(&str, &mut String); 3] = [
        ("description", &mut branch.description),
        ("address", &mut branch.address),
        ("workingHours", &mut branch.working_hours),
    ];
    for (field, slot) in text_fields {
        if let Some(value) = form.text(field) {
            *slot = value;
        }
    }
    if let Some(contact) = form.json::<BranchContact>("contact")? {
        branch.contact = contact;
    }
    if let Some(services) = form.json::<Vec<BranchService>>("services")? {
        branch.services = services;
    }
    if let Some(programs) = form.json::<Vec<UniqueProgram>>("uniquePrograms")? {
        branch.unique_programs = programs;
    }
    if let Some(active) = form.flag("isActive")? {
        branch.is_active = active;
    }
    if let Some(order) = form.int("order")? {
        branch.order = order;
    }
    Ok(())
}

/// Stores the hero image (if any) followed by every team member photo.
async fn store_uploads(
    state: &AppState,
    form: &FormData,
    slug: &str,
) -> AppResult<(Option<StoredObject>, Vec<StoredObject>)> {
    let hero = form.single_file("heroImage")?;
    let photos = form.files("teamMemberPhotos");
    ensure_allowed(hero.as_slice(), &[IMAGE_MIME_TYPES])?;
    ensure_allowed(&photos, &[IMAGE_MIME_TYPES])?;

    let context = format!("branches/{slug}");
    let mut uploads: Vec<_> = hero.into_iter().collect();
    let has_hero = !uploads.is_empty();
    uploads.extend(photos);
    let mut stored = store_all(state.storage.as_ref(), &uploads, &context).await?;
    let hero = if has_hero { Some(stored.remove(0)) } else { None };
    Ok((hero, stored))
}

async fn discard_uploads(state: &AppState, hero: &Option<StoredObject>, photos: &[StoredObject]) {
    discard(state.storage.as_ref(), hero.as_slice()).await;
    discard(state.storage.as_ref(), photos).await;
}

#[utoipa::path(
    get,
    path = "/api/v1/branches",
    responses((status = 200, description = "Active branches by display order", body = [BranchView])),
    tag = "branches"
)]
pub async fn list_branches(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<BranchView>>> {
    let branches = state.repo.list_branches(true).await?;
    Ok(ApiResponse::ok(views(&state, branches).await?, "Branches fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/branches/all",
    responses((status = 200, description = "Every branch, including inactive ones", body = [BranchView])),
    tag = "branches"
)]
pub async fn list_all_branches(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<BranchView>>> {
    let branches = state.repo.list_branches(false).await?;
    Ok(ApiResponse::ok(views(&state, branches).await?, "Branches fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/branches/{id}",
    params(("id" = Uuid, Path, description = "Branch id")),
    responses((status = 200, description = "Branch", body = BranchView), (status = 404, description = "Not found")),
    tag = "branches"
)]
pub async fn get_branch(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<BranchView>> {
    let branch = load(&state, id).await?;
    Ok(ApiResponse::ok(single_view(&state, branch).await?, "Branch fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/branches/slug/{slug}",
    params(("slug" = String, Path, description = "Branch slug")),
    responses((status = 200, description = "Branch", body = BranchView), (status = 404, description = "Not found")),
    tag = "branches"
)]
pub async fn get_branch_by_slug(
    State(state): State<AppState>,
    ValidPath(slug): ValidPath<String>,
) -> AppResult<ApiResponse<BranchView>> {
    let branch = state
        .repo
        .find_branch_by_slug(&slug.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::NotFound("Branch not found".into()))?;
    Ok(ApiResponse::ok(single_view(&state, branch).await?, "Branch fetched successfully"))
}

/// create_branch
///
/// The slug is derived from the name; a collision is reported rather than disambiguated.
/// Without an explicit `order` the branch is appended after the last one.
#[utoipa::path(
    post,
    path = "/api/v1/branches",
    request_body(content_type = "multipart/form-data", description = "name, description, address, workingHours, contact/services/uniquePrograms/teamMembers as JSON, isActive, order, heroImage, teamMemberPhotos"),
    responses((status = 201, description = "Created", body = BranchView), (status = 400, description = "Invalid input or duplicate name")),
    tag = "branches"
)]
pub async fn create_branch(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    form: FormData,
) -> AppResult<ApiResponse<BranchView>> {
    let name = form
        .non_empty("name")
        .ok_or_else(|| AppError::missing_fields(vec!["name".into()]))?;
    let slug = slug_for(&name)?;
    ensure_slug_free(&state, &slug, None).await?;
    let team_inputs = form.json::<Vec<TeamMemberInput>>("teamMembers")?.unwrap_or_default();
    let placement = form.int("order")?.map_or(Placement::Append, Placement::Explicit);

    let now = Utc::now();
    let mut branch = Branch {
        id: Uuid::new_v4(),
        name,
        slug,
        description: String::new(),
        address: String::new(),
        contact: BranchContact::default(),
        working_hours: String::new(),
        services: Vec::new(),
        unique_programs: Vec::new(),
        team_members: Vec::new(),
        hero_image: None,
        is_active: true,
        order: 0,
        created_by: Some(admin.id),
        updated_by: Some(admin.id),
        created_at: now,
        updated_at: now,
    };
    apply_fields(&mut branch, &form)?;

    let (hero, photos) = store_uploads(&state, &form, &branch.slug).await?;
    branch.hero_image = hero.as_ref().map(|o| o.url.clone());
    branch.team_members = match resolve_team(team_inputs, &photos, &[]) {
        Ok(team) => team,
        Err(e) => {
            discard_uploads(&state, &hero, &photos).await;
            return Err(e);
        }
    };

    let branch = match state.repo.insert_branch(&branch, placement).await {
        Ok(branch) => branch,
        Err(e) => {
            discard_uploads(&state, &hero, &photos).await;
            return Err(e.into());
        }
    };
    tracing::info!(id = %branch.id, slug = %branch.slug, "branch created");
    Ok(ApiResponse::created(single_view(&state, branch).await?, "Branch created successfully"))
}

/// update_branch
///
/// A name change regenerates the slug. Submitted `teamMembers` replace the whole team; photos
/// no longer referenced afterwards are deleted, as is a replaced hero image.
#[utoipa::path(
    patch,
    path = "/api/v1/branches/{id}",
    params(("id" = Uuid, Path, description = "Branch id")),
    request_body(content_type = "multipart/form-data", description = "Any branch field, optional heroImage and teamMemberPhotos"),
    responses((status = 200, description = "Updated", body = BranchView), (status = 404, description = "Not found")),
    tag = "branches"
)]
pub async fn update_branch(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidPath(id): ValidPath<Uuid>,
    form: FormData,
) -> AppResult<ApiResponse<BranchView>> {
    let mut branch = load(&state, id).await?;
    let files_before = branch.owned_files();
    let team_photos_before: Vec<String> = branch.owned_team_photos().collect();

    if let Some(name) = form.non_empty("name") {
        if name != branch.name {
            let slug = slug_for(&name)?;
            ensure_slug_free(&state, &slug, Some(id)).await?;
            branch.name = name;
            branch.slug = slug;
        }
    }
    apply_fields(&mut branch, &form)?;
    let team_inputs = form.json::<Vec<TeamMemberInput>>("teamMembers")?;

    let (hero, photos) = store_uploads(&state, &form, &branch.slug).await?;
    if let Some(object) = &hero {
        branch.hero_image = Some(object.url.clone());
    }
    if let Some(inputs) = team_inputs {
        branch.team_members = match resolve_team(inputs, &photos, &team_photos_before) {
            Ok(team) => team,
            Err(e) => {
                discard_uploads(&state, &hero, &photos).await;
                return Err(e);
            }
        };
    }
    branch.updated_by = Some(admin.id);

    let updated = match state.repo.update_branch(&branch).await {
        Ok(updated) => updated,
        Err(e) => {
            discard_uploads(&state, &hero, &photos).await;
            return Err(e.into());
        }
    };
    purge_replaced(state.storage.as_ref(), files_before, &updated.owned_files()).await;
    Ok(ApiResponse::ok(single_view(&state, updated).await?, "Branch updated successfully"))
}

/// set_branch_status
///
/// Sets `isActive` to the given value, or flips it when the body omits it.
#[utoipa::path(
    patch,
    path = "/api/v1/branches/{id}/status",
    params(("id" = Uuid, Path, description = "Branch id")),
    request_body = BranchStatusRequest,
    responses((status = 200, description = "Status changed", body = Branch), (status = 404, description = "Not found")),
    tag = "branches"
)]
pub async fn set_branch_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(req): ValidJson<BranchStatusRequest>,
) -> AppResult<ApiResponse<Branch>> {
    let mut branch = load(&state, id).await?;
    branch.is_active = req.is_active.unwrap_or(!branch.is_active);
    branch.updated_by = Some(admin.id);
    let updated = state.repo.update_branch(&branch).await?;
    let message = if updated.is_active { "Branch activated" } else { "Branch deactivated" };
    Ok(ApiResponse::ok(updated, message))
}

#[utoipa::path(
    delete,
    path = "/api/v1/branches/{id}",
    params(("id" = Uuid, Path, description = "Branch id")),
    responses((status = 200, description = "Deleted", body = PurgeReport), (status = 404, description = "Not found")),
    tag = "branches"
)]
pub async fn delete_branch(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    let branch = load(&state, id).await?;
    let files: Vec<(String, String)> = branch
        .owned_files()
        .into_iter()
        .map(|url| (url, "image/*".to_string()))
        .collect();
    let report = purge(state.storage.as_ref(), &files).await;
    if !state.repo.delete_branch(id).await? {
        return Err(AppError::NotFound("Branch not found".into()));
    }
    tracing::info!(id = %id, slug = %branch.slug, "branch deleted");
    let message = deletion_message("Branch", &report);
    Ok(ApiResponse::ok(report, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(url: &str) -> StoredObject {
        StoredObject { url: url.into(), public_id: url.into(), mimetype: "image/png".into() }
    }

    #[test]
    fn team_photos_resolve_by_index() {
        let photos = vec![stored("u/0.png"), stored("u/1.png")];
        let inputs = vec![
            TeamMemberInput { name: " Sita ".into(), photo_index: Some(1), ..Default::default() },
            TeamMemberInput {
                name: "Hari".into(),
                profile_pic: Some("kept.png".into()),
                ..Default::default()
            },
        ];
        let team = resolve_team(inputs, &photos, &["kept.png".to_string()]).unwrap();
        assert_eq!(team[0].name, "Sita");
        assert_eq!(team[0].profile_pic.as_deref(), Some("u/1.png"));
        assert!(team[0].photo_owned);
        assert_eq!(team[1].profile_pic.as_deref(), Some("kept.png"));
        assert!(team[1].photo_owned);
    }

    #[test]
    fn foreign_photo_urls_are_borrowed_not_owned() {
        let inputs = vec![TeamMemberInput {
            profile_pic: Some("http://cdn/users/Images/member.png".into()),
            ..Default::default()
        }];
        let team = resolve_team(inputs, &[], &[]).unwrap();
        assert_eq!(team[0].profile_pic.as_deref(), Some("http://cdn/users/Images/member.png"));
        assert!(!team[0].photo_owned);
    }

    #[test]
    fn out_of_range_photo_index_is_rejected() {
        let inputs = vec![TeamMemberInput { photo_index: Some(3), ..Default::default() }];
        assert!(resolve_team(inputs, &[], &[]).is_err());
    }
}
