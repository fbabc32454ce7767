//! Admin-side membership management: listing, editing, the approval state machine, bulk
//! import and spreadsheet export.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AdminUser, hash_password},
    error::{AppError, AppResult},
    extract::{FormData, ValidJson, ValidPath, ValidQuery, ensure_allowed},
    handlers::deletion_message,
    mail::{approval_mail, send_in_background},
    membership::{ImportRow, create_member, export_members_xlsx, generated_password, sanitize_row},
    models::{
        Availability, AvailabilityQuery, BulkImportReport, BulkImportRequest, IDENTITY_FIELDS,
        IdentityProbe, ImportFailure, MembershipStatus, NewUser, PROFILE_FIELDS, Role, User,
        UserListQuery,
    },
    response::ApiResponse,
    storage::{IMAGE_MIME_TYPES, PurgeReport, discard, purge, store_all},
};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn parse_status(raw: Option<&str>) -> AppResult<Option<MembershipStatus>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => MembershipStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| AppError::validation("Status must be 'pending' or 'approved'")),
    }
}

async fn load_user(state: &AppState, id: Uuid) -> AppResult<User> {
    state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses((status = 200, description = "Members, newest first", body = [User])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<UserListQuery>,
) -> AppResult<ApiResponse<Vec<User>>> {
    let status = parse_status(query.status.as_deref())?;
    let users = state.repo.list_users(status).await?;
    Ok(ApiResponse::ok(users, "Users fetched successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Member", body = User), (status = 404, description = "Not found")),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<User>> {
    Ok(ApiResponse::ok(load_user(&state, id).await?, "User fetched successfully"))
}

/// update_user
///
/// Admin edit of any profile field, role and membership status, plus an optional new profile
/// picture. Identity fields are re-checked against every other member.
#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body(content_type = "multipart/form-data", description = "Profile fields, role, membershipStatus, optional profilePic"),
    responses((status = 200, description = "Updated", body = User), (status = 400, description = "Invalid or duplicate values")),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    form: FormData,
) -> AppResult<ApiResponse<User>> {
    let mut user = load_user(&state, id).await?;

    for field in PROFILE_FIELDS {
        if let Some(value) = form.text(field) {
            user.profile.set(field, value);
        }
    }
    user.profile.normalize();
    let missing = user.profile.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::missing_fields(missing));
    }
    if let Some(raw) = form.non_empty("role") {
        user.role = Role::parse(&raw)
            .ok_or_else(|| AppError::validation("Role must be 'user' or 'admin'"))?;
    }
    if let Some(status) = parse_status(form.non_empty("membershipStatus").as_deref())? {
        user.membership_status = status;
    }

    let taken = state
        .repo
        .taken_identity_fields(&IdentityProbe::for_profile(&user.profile, Some(id)))
        .await?;
    if !taken.is_empty() {
        return Err(AppError::duplicate_fields(taken));
    }

    let previous_pic = user.profile_pic.clone();
    let stored = match form.single_file("profilePic")? {
        Some(pic) => {
            ensure_allowed(std::slice::from_ref(&pic), &[IMAGE_MIME_TYPES])?;
            store_all(state.storage.as_ref(), &[pic], "users").await?
        }
        None => Vec::new(),
    };
    if let Some(object) = stored.first() {
        user.profile_pic = object.url.clone();
    }

    let updated = match state.repo.update_user(&user).await {
        Ok(updated) => updated,
        Err(e) => {
            discard(state.storage.as_ref(), &stored).await;
            return Err(e.into());
        }
    };
    if !stored.is_empty() && !previous_pic.is_empty() {
        purge(state.storage.as_ref(), &[(previous_pic, "image/*".to_string())]).await;
    }
    tracing::info!(user_id = %id, "member updated by admin");
    Ok(ApiResponse::ok(updated, "User updated successfully"))
}

/// delete_user
///
/// Hard delete of any member together with their stored files. Admins cannot delete
/// themselves.
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Deleted", body = PurgeReport), (status = 404, description = "Not found")),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    if admin.id == id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }
    let user = load_user(&state, id).await?;
    let report = purge(state.storage.as_ref(), &user.owned_files()).await;
    state
        .repo
        .delete_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    tracing::info!(user_id = %id, removed = report.removed, "member deleted");
    let message = deletion_message("User", &report);
    Ok(ApiResponse::ok(report, message))
}

/// approve_membership
///
/// `pending -> approved`, as one conditional update. Sends a best-effort notification.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/approve",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Approved", body = User), (status = 400, description = "Membership is not pending")),
    tag = "users"
)]
pub async fn approve_membership(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<User>> {
    let user = state
        .repo
        .transition_membership(id, MembershipStatus::Pending, MembershipStatus::Approved)
        .await?
        .ok_or_else(|| AppError::BadRequest("Membership is not pending".into()))?;

    tracing::info!(user_id = %id, "membership approved");
    send_in_background(
        &state.mailer,
        approval_mail(&user.profile.email, &user.username(), &user.membership_number),
    );
    Ok(ApiResponse::ok(user, "Membership approved successfully"))
}

/// decline_membership
///
/// `pending -> deleted`. The row is removed with a status-conditional delete first, so a member
/// that is no longer pending keeps both its record and its files; the files are purged after.
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/decline",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Declined and removed", body = PurgeReport), (status = 400, description = "Membership is not pending")),
    tag = "users"
)]
pub async fn decline_membership(
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> AppResult<ApiResponse<PurgeReport>> {
    let user = state
        .repo
        .delete_user_if_status(id, MembershipStatus::Pending)
        .await?
        .ok_or_else(|| AppError::BadRequest("Membership is not pending".into()))?;

    let report = purge(state.storage.as_ref(), &user.owned_files()).await;
    tracing::info!(user_id = %id, removed = report.removed, "membership declined");
    let message = if report.is_clean() {
        "Membership declined and applicant removed".to_string()
    } else {
        deletion_message("Applicant", &report)
    };
    Ok(ApiResponse::ok(report, message))
}

/// check_availability
///
/// Tests one candidate identity value before a full submission. Admin only: the answer
/// reveals whether a member exists.
#[utoipa::path(
    get,
    path = "/api/v1/users/check-availability",
    params(AvailabilityQuery),
    responses((status = 200, description = "Availability", body = Availability)),
    tag = "users"
)]
pub async fn check_availability(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<AvailabilityQuery>,
) -> AppResult<ApiResponse<Availability>> {
    let field = query.field.trim();
    if !IDENTITY_FIELDS.contains(&field) {
        return Err(AppError::validation(format!(
            "Field must be one of: {}",
            IDENTITY_FIELDS.join(", ")
        )));
    }
    let mut value = query.value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::missing_fields(vec!["value".into()]));
    }
    if field == "email" {
        value = value.to_lowercase();
    }

    let mut probe = IdentityProbe::default();
    match field {
        "employeeId" => probe.employee_id = Some(value.clone()),
        "email" => probe.email = Some(value.clone()),
        _ => probe.mobile_number = Some(value.clone()),
    }
    let available = state.repo.taken_identity_fields(&probe).await?.is_empty();
    let body = Availability { field: field.to_string(), value, available };
    let message = if available { "Value is available" } else { "Value is already in use" };
    Ok(ApiResponse::ok(body, message))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/employee/{employee_id}",
    params(("employee_id" = String, Path, description = "Employee id")),
    responses((status = 200, description = "Member", body = User), (status = 404, description = "Not found")),
    tag = "users"
)]
pub async fn find_by_employee_id(
    State(state): State<AppState>,
    ValidPath(employee_id): ValidPath<String>,
) -> AppResult<ApiResponse<User>> {
    let user = state
        .repo
        .find_user_by_employee_id(employee_id.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("No member found with that employee ID".into()))?;
    Ok(ApiResponse::ok(user, "Member fetched successfully"))
}

/// bulk_import
///
/// Processes rows one by one. A failing row is recorded with its 0-based index and reason and
/// never stops the rows after it; duplicates within the batch fail like duplicates against
/// stored members.
#[utoipa::path(
    post,
    path = "/api/v1/users/bulk-import",
    request_body = BulkImportRequest,
    responses((status = 200, description = "Import report", body = BulkImportReport)),
    tag = "users"
)]
pub async fn bulk_import(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<BulkImportRequest>,
) -> AppResult<ApiResponse<BulkImportReport>> {
    if req.members.is_empty() {
        return Err(AppError::validation("No members to import"));
    }

    let mut report = BulkImportReport { total: req.members.len(), ..Default::default() };
    for (index, raw) in req.members.iter().enumerate() {
        let row = sanitize_row(raw);
        let failure = |reason: String| ImportFailure {
            index,
            employee_id: row.profile.employee_id.clone(),
            email: row.profile.email.clone(),
            reason,
        };

        match import_row(&state, row.clone()).await {
            Ok(user) => {
                tracing::debug!(index, user_id = %user.id, "row imported");
                report.succeeded += 1;
            }
            Err(e) => {
                tracing::debug!(index, error = %e, "row rejected");
                report.failures.push(failure(e.to_string()));
            }
        }
    }
    report.failed = report.failures.len();

    tracing::info!(
        total = report.total,
        succeeded = report.succeeded,
        failed = report.failed,
        "bulk import finished"
    );
    let message = format!("Imported {} of {} members", report.succeeded, report.total);
    Ok(ApiResponse::ok(report, message))
}

async fn import_row(state: &AppState, row: ImportRow) -> AppResult<User> {
    let missing = row.profile.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::missing_fields(missing));
    }
    let taken = state
        .repo
        .taken_identity_fields(&IdentityProbe::for_profile(&row.profile, None))
        .await?;
    if !taken.is_empty() {
        return Err(AppError::duplicate_fields(taken));
    }
    let password = row.password.unwrap_or_else(generated_password);
    let password_hash = hash_password(password, state.config.bcrypt_cost).await?;
    create_member(
        &state.repo,
        NewUser {
            profile: row.profile,
            password_hash,
            role: row.role,
            membership_status: row.membership_status,
            membership_number: String::new(),
            registration_number: String::new(),
            profile_pic: String::new(),
            document: None,
        },
    )
    .await
}

#[utoipa::path(
    get,
    path = "/api/v1/users/export",
    params(UserListQuery),
    responses((status = 200, description = "members.xlsx", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")),
    tag = "users"
)]
pub async fn export_users(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<UserListQuery>,
) -> AppResult<impl IntoResponse> {
    let status = parse_status(query.status.as_deref())?;
    let users = state.repo.list_users(status).await?;
    let bytes = export_members_xlsx(&users)?;
    tracing::info!(rows = users.len(), "member export generated");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"members.xlsx\""),
        ],
        bytes,
    ))
}
