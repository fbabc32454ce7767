use axum::extract::State;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    extract::{FormData, ValidPath, ValidQuery, ensure_allowed},
    handlers::{deletion_message, linked_users},
    models::{CommitteeMember, CommitteeMemberView, CommitteeQuery, CommitteeRole, sort_roster},
    response::ApiResponse,
    storage::{IMAGE_MIME_TYPES, PurgeReport, discard, purge, store_all},
};

const CONTEXT: &str = "committee";

async fn load(state: &AppState, id: Uuid) -> AppResult<CommitteeMember> {
    state
        .repo
        .find_committee_member(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Committee member not found".into()))
}

async fn view(state: &AppState, member: CommitteeMember) -> AppResult<CommitteeMemberView> {
    let mut linked = linked_users(&state.repo, member.user_id).await?;
    let link = member.user_id.and_then(|id| linked.remove(&id));
    Ok(CommitteeMemberView::resolve(member, link))
}

fn parse_role(raw: &str) -> AppResult<CommitteeRole> {
    CommitteeRole::parse(raw).ok_or_else(|| AppError::Validation {
        message: "Invalid committee role".into(),
        errors: CommitteeRole::ALL.iter().map(|r| r.as_str().to_string()).collect(),
    })
}

/// `userId` as sent by the form: absent keeps the link, blank clears it.
fn parse_link(form: &FormData) -> AppResult<Option<Option<Uuid>>> {
    match form.text("userId") {
        None => Ok(None),
        Some(raw) if raw.is_empty() || raw == "null" => Ok(Some(None)),
        Some(raw) => Uuid::parse_str(&raw)
            .map(|id| Some(Some(id)))
            .map_err(|_| AppError::validation("userId must be a valid id")),
    }
}

/// list_committee
///
/// The roster grouped by committee title, then role rank, then name, with display data
/// borrowed from linked members.
#[utoipa::path(
    get,
    path = "/api/v1/committee-members",
    params(CommitteeQuery),
    responses((status = 200, description = "Roster", body = [CommitteeMemberView])),
    tag = "committee"
)]
pub async fn list_committee(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CommitteeQuery>,
) -> AppResult<ApiResponse<Vec<CommitteeMemberView>>> {
    let title = query.committee_title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let members = state.repo.list_committee_members(title).await?;
    let linked = linked_users(&state.repo, members.iter().filter_map(|m| m.user_id)).await?;

    let mut views: Vec<CommitteeMemberView> = members
        .into_iter()
        .map(|m| {
            let link = m.user_id.and_then(|id| linked.get(&id).cloned());
            CommitteeMemberView::resolve(m, link)
        })
        .collect();
    sort_roster(&mut views);
    Ok(ApiResponse::ok(views, "Committee members fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/committee-members/{id}",
    params(("id" = Uuid, Path, description = "Committee member id")),
    responses((status = 200, description = "Committee member", body = CommitteeMemberView), (status = 404, description = "Not found")),
    tag = "committee"
)]
pub async fn get_committee_member(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<CommitteeMemberView>> {
    let member = load(&state, id).await?;
    Ok(ApiResponse::ok(view(&state, member).await?, "Committee member fetched successfully"))
}

#[utoipa::path(
    post,
    path = "/api/v1/committee-members",
    request_body(content_type = "multipart/form-data", description = "name, role, bio, committeeTitle, startDate, endDate, userId, profilePic"),
    responses((status = 201, description = "Created", body = CommitteeMemberView), (status = 400, description = "Invalid input")),
    tag = "committee"
)]
pub async fn create_committee_member(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<CommitteeMemberView>> {
    let role = form
        .non_empty("role")
        .ok_or_else(|| AppError::missing_fields(vec!["role".into()]))
        .and_then(|raw| parse_role(&raw))?;
    let user_id = parse_link(&form)?.flatten();
    let name = form.text("name").unwrap_or_default();
    if name.is_empty() && user_id.is_none() {
        return Err(AppError::validation("Name is required when no member is linked"));
    }

    let pic = form.single_file("profilePic")?;
    if let Some(pic) = &pic {
        ensure_allowed(std::slice::from_ref(pic), &[IMAGE_MIME_TYPES])?;
    }
    let stored = store_all(state.storage.as_ref(), pic.as_slice(), CONTEXT).await?;

    let now = Utc::now();
    let member = CommitteeMember {
        id: Uuid::new_v4(),
        name,
        role,
        bio: form.text("bio").unwrap_or_default(),
        committee_title: form.text("committeeTitle").unwrap_or_default(),
        start_date: form.text("startDate").unwrap_or_default(),
        end_date: form.text("endDate").unwrap_or_default(),
        profile_pic: stored.first().map(|o| o.url.clone()),
        user_id,
        created_at: now,
        updated_at: now,
    };
    let member = match state.repo.insert_committee_member(&member).await {
        Ok(member) => member,
        Err(e) => {
            discard(state.storage.as_ref(), &stored).await;
            return Err(e.into());
        }
    };
    tracing::info!(id = %member.id, role = member.role.as_str(), "committee member created");
    Ok(ApiResponse::created(view(&state, member).await?, "Committee member created successfully"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/committee-members/{id}",
    params(("id" = Uuid, Path, description = "Committee member id")),
    request_body(content_type = "multipart/form-data", description = "Any committee member field, optional profilePic"),
    responses((status = 200, description = "Updated", body = CommitteeMemberView), (status = 404, description = "Not found")),
    tag = "committee"
)]
pub async fn update_committee_member(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    form: FormData,
) -> AppResult<ApiResponse<CommitteeMemberView>> {
    let mut member = load(&state, id).await?;

    if let Some(raw) = form.non_empty("role") {
        member.role = parse_role(&raw)?;
    }
    if let Some(link) = parse_link(&form)? {
        member.user_id = link;
    }
    let text_fields: [(&str, &mut String); 5] = [
        ("name", &mut member.name),
        ("bio", &mut member.bio),
        ("committeeTitle", &mut member.committee_title),
        ("startDate", &mut member.start_date),
        ("endDate", &mut member.end_date),
    ];
    for (field, slot) in text_fields {
        if let Some(value) = form.text(field) {
            *slot = value;
        }
    }
    if member.name.is_empty() && member.user_id.is_none() {
        return Err(AppError::validation("Name is required when no member is linked"));
    }

    let pic = form.single_file("profilePic")?;
    if let Some(pic) = &pic {
        ensure_allowed(std::slice::from_ref(pic), &[IMAGE_MIME_TYPES])?;
    }
    let stored = store_all(state.storage.as_ref(), pic.as_slice(), CONTEXT).await?;
    let previous_pic = match stored.first() {
        Some(object) => member.profile_pic.replace(object.url.clone()),
        None => None,
    };

    let updated = match state.repo.update_committee_member(&member).await {
        Ok(updated) => updated,
        Err(e) => {
            discard(state.storage.as_ref(), &stored).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous_pic {
        purge(state.storage.as_ref(), &[(old, "image/*".to_string())]).await;
    }
    Ok(ApiResponse::ok(view(&state, updated).await?, "Committee member updated successfully"))
}

/// delete_committee_member
///
/// Removes the member and its own profile picture. A picture borrowed through `userId` is
/// never touched.
#[utoipa::path(
    delete,
    path = "/api/v1/committee-members/{id}",
    params(("id" = Uuid, Path, description = "Committee member id")),
    responses((status = 200, description = "Deleted", body = PurgeReport), (status = 404, description = "Not found")),
    tag = "committee"
)]
pub async fn delete_committee_member(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    let member = load(&state, id).await?;
    let owned: Vec<(String, String)> = member
        .profile_pic
        .into_iter()
        .map(|url| (url, "image/*".to_string()))
        .collect();
    let report = purge(state.storage.as_ref(), &owned).await;
    if !state.repo.delete_committee_member(id).await? {
        return Err(AppError::NotFound("Committee member not found".into()));
    }
    let message = deletion_message("Committee member", &report);
    Ok(ApiResponse::ok(report, message))
}
