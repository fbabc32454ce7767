//! Registration and the session lifecycle: login, logout, refresh, self-service profile and
//! password flows.

use axum::{body::Bytes as RawBody, extract::State, http::HeaderMap};

use crate::{
    AppState,
    auth::{
        self, AuthUser, REFRESH_COOKIE, RESET_TOKEN_TTL_MINUTES, hash_password, is_admin_frontend,
        read_cookie, session_cookies, verify_password,
    },
    error::{AppError, AppResult, AuthFailure},
    extract::{FormData, ValidJson, ensure_allowed},
    mail::{reset_mail, send_in_background},
    membership::create_member,
    models::{
        Attachment, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
        IDENTITY_FIELDS, IdentityProbe, LoginRequest, LoginResponse, MemberProfile,
        MembershipStatus, NewUser, PROFILE_FIELDS, RefreshTokenRequest, ResetPasswordRequest, Role,
        TokenPair, User,
    },
    response::ApiResponse,
    storage::{DOCUMENT_MIME_TYPES, IMAGE_MIME_TYPES, discard, purge, store_all},
};

pub const MIN_PASSWORD_LEN: usize = 6;

fn check_password_strength(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Profile fields present in the form, trimmed and normalised.
fn profile_from_form(form: &FormData) -> MemberProfile {
    let mut profile = MemberProfile::default();
    for field in PROFILE_FIELDS {
        if let Some(value) = form.text(field) {
            profile.set(field, value);
        }
    }
    profile.normalize();
    profile
}

/// Refresh token from the cookie, falling back to a JSON body.
fn refresh_token_from(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE).or_else(|| {
        serde_json::from_slice::<RefreshTokenRequest>(body)
            .ok()
            .and_then(|req| req.refresh_token)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// register
///
/// Public membership application. Creates a `pending` member after checking required fields
/// and identity uniqueness, storing exactly one profile picture and at most one supporting
/// document. Stored files are removed again when the insert fails.
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    request_body(content_type = "multipart/form-data", description = "Member profile, password, profilePic and optional document"),
    responses(
        (status = 201, description = "Registered, awaiting approval", body = User),
        (status = 400, description = "Missing fields, duplicate identity or invalid file")
    ),
    tag = "users"
)]
pub async fn register(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<User>> {
    let profile = profile_from_form(&form);
    let password = form.value("password").unwrap_or_default().to_string();
    let profile_pic = form.single_file("profilePic")?;
    let document = form.single_file("document")?;

    let mut missing = profile.missing_fields();
    if password.trim().is_empty() {
        missing.push("password".to_string());
    }
    if profile_pic.is_none() {
        missing.push("profilePic".to_string());
    }
    if !missing.is_empty() {
        return Err(AppError::missing_fields(missing));
    }
    check_password_strength(&password)?;

    let mut uploads = Vec::new();
    if let Some(pic) = profile_pic {
        ensure_allowed(std::slice::from_ref(&pic), &[IMAGE_MIME_TYPES])?;
        uploads.push(pic);
    }
    if let Some(doc) = document {
        ensure_allowed(std::slice::from_ref(&doc), &[IMAGE_MIME_TYPES, DOCUMENT_MIME_TYPES])?;
        uploads.push(doc);
    }

    let taken = state
        .repo
        .taken_identity_fields(&IdentityProbe::for_profile(&profile, None))
        .await?;
    if !taken.is_empty() {
        return Err(AppError::duplicate_fields(taken));
    }

    let password_hash = hash_password(password, state.config.bcrypt_cost).await?;
    let stored = store_all(state.storage.as_ref(), &uploads, "users").await?;

    let new_user = NewUser {
        profile,
        password_hash,
        role: Role::User,
        membership_status: MembershipStatus::Pending,
        membership_number: String::new(),
        registration_number: String::new(),
        profile_pic: stored.first().map(|o| o.url.clone()).unwrap_or_default(),
        document: stored.get(1).map(|o| Attachment {
            url: o.url.clone(),
            mimetype: o.mimetype.clone(),
        }),
    };

    match create_member(&state.repo, new_user).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "membership application received");
            Ok(ApiResponse::created(user, "Registration successful. Awaiting admin approval."))
        }
        Err(e) => {
            discard(state.storage.as_ref(), &stored).await;
            Err(e)
        }
    }
}

/// login
///
/// Verifies credentials, rotates the stored refresh token and returns both tokens as
/// http-only cookies and in the body. Unknown email and wrong password share one message.
/// Requests flagged with `x-admin-frontend` are refused for non-admin accounts.
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Admin console login by a non-admin")
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<LoginRequest>,
) -> AppResult<(HeaderMap, ApiResponse<LoginResponse>)> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let record = state
        .repo
        .find_user_record_by_email(&email)
        .await?
        .ok_or(AppError::Authentication(AuthFailure::InvalidCredentials))?;
    if !verify_password(req.password, record.password_hash.clone()).await? {
        tracing::debug!(user_id = %record.user.id, "password mismatch");
        return Err(AppError::Authentication(AuthFailure::InvalidCredentials));
    }
    if is_admin_frontend(&headers) && record.user.role != Role::Admin {
        return Err(AppError::Forbidden("Admin access required".into()));
    }

    let pair = auth::issue_token_pair(&state.config, &record.user)?;
    state.repo.set_refresh_token(record.user.id, Some(&pair.refresh_token)).await?;
    let cookies = session_cookies(&state.config, Some(&pair))?;

    tracing::info!(user_id = %record.user.id, "user logged in");
    let body = LoginResponse {
        user: record.user,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
    };
    Ok((cookies, ApiResponse::ok(body, "Login successful")))
}

/// logout
///
/// Clears the server-side refresh token when one can be found and always clears both cookies.
#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    responses((status = 200, description = "Logged out")),
    tag = "users"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: RawBody,
) -> AppResult<(HeaderMap, ApiResponse<()>)> {
    if let Some(token) = refresh_token_from(&headers, &body) {
        if let Some(record) = state.repo.find_user_record_by_refresh_token(&token).await? {
            state.repo.set_refresh_token(record.user.id, None).await?;
            tracing::info!(user_id = %record.user.id, "user logged out");
        }
    }
    let cookies = session_cookies(&state.config, None)?;
    Ok((cookies, ApiResponse::ok((), "Logged out successfully")))
}

/// refresh_token
///
/// Exchanges a valid refresh token that matches the one stored on the user for a new pair.
#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 401, description = "Missing, invalid, expired or superseded refresh token")
    ),
    tag = "users"
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: RawBody,
) -> AppResult<(HeaderMap, ApiResponse<TokenPair>)> {
    let token = refresh_token_from(&headers, &body)
        .ok_or(AppError::Authentication(AuthFailure::MissingToken))?;
    let claims =
        auth::decode_refresh_token(&state.config, &token).map_err(AppError::Authentication)?;

    let record = state
        .repo
        .find_user_record(claims.sub)
        .await?
        .ok_or(AppError::Authentication(AuthFailure::UserNotFound))?;
    if record.refresh_token.as_deref() != Some(token.as_str()) {
        tracing::warn!(user_id = %record.user.id, "refresh token reuse or mismatch");
        return Err(AppError::Authentication(AuthFailure::InvalidToken));
    }

    let pair = auth::issue_token_pair(&state.config, &record.user)?;
    state.repo.set_refresh_token(record.user.id, Some(&pair.refresh_token)).await?;
    let cookies = session_cookies(&state.config, Some(&pair))?;
    Ok((cookies, ApiResponse::ok(pair, "Access token refreshed")))
}

/// The caller's own record, as resolved by the auth extractor.
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Current user", body = User), (status = 401, description = "Not authenticated")),
    tag = "users"
)]
pub async fn me(AuthUser(user): AuthUser) -> ApiResponse<User> {
    ApiResponse::ok(user, "Current user fetched")
}

/// update_me
///
/// Self-service update of non-identity profile fields plus an optional replacement profile
/// picture. The previous picture is deleted only after the new one is saved.
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body(content_type = "multipart/form-data", description = "Profile fields and optional profilePic"),
    responses((status = 200, description = "Profile updated", body = User)),
    tag = "users"
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    form: FormData,
) -> AppResult<ApiResponse<User>> {
    // 1. Apply editable fields; identity fields are admin-only.
    for field in PROFILE_FIELDS.iter().filter(|f| !IDENTITY_FIELDS.contains(f)) {
        if let Some(value) = form.text(field) {
            user.profile.set(field, value);
        }
    }
    user.profile.normalize();
    let missing = user.profile.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::missing_fields(missing));
    }

    // 2. Store the replacement picture, if any.
    let new_pic = form.single_file("profilePic")?;
    let previous_pic = user.profile_pic.clone();
    let stored = match new_pic {
        Some(pic) => {
            ensure_allowed(std::slice::from_ref(&pic), &[IMAGE_MIME_TYPES])?;
            let stored = store_all(state.storage.as_ref(), &[pic], "users").await?;
            if let Some(object) = stored.first() {
                user.profile_pic = object.url.clone();
            }
            stored
        }
        None => Vec::new(),
    };

    // 3. Persist, then drop the old picture.
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
    Ok(ApiResponse::ok(updated, "Profile updated successfully"))
}

/// change_password
///
/// Requires the current password. Ends every session by clearing the stored refresh token.
#[utoipa::path(
    post,
    path = "/api/v1/users/change-password",
    request_body = ChangePasswordRequest,
    responses((status = 200, description = "Password changed"), (status = 401, description = "Current password is wrong")),
    tag = "users"
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    check_password_strength(&req.new_password)?;
    let record = state
        .repo
        .find_user_record(auth.id())
        .await?
        .ok_or(AppError::Authentication(AuthFailure::UserNotFound))?;
    if !verify_password(req.current_password, record.password_hash).await? {
        return Err(AppError::BadRequest("Current password is incorrect".into()));
    }
    let hash = hash_password(req.new_password, state.config.bcrypt_cost).await?;
    state.repo.set_password(auth.id(), &hash).await?;
    tracing::info!(user_id = %auth.id(), "password changed");
    Ok(ApiResponse::ok((), "Password changed successfully"))
}

/// forgot_password
///
/// Issues a 15 minute reset token, mails it in the background and, when the deployment
/// allows it, returns it in the body as a fallback channel.
#[utoipa::path(
    post,
    path = "/api/v1/users/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset token issued", body = ForgotPasswordResponse),
        (status = 404, description = "No account with that email")
    ),
    tag = "users"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<ForgotPasswordResponse>> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::missing_fields(vec!["email".into()]));
    }
    let record = state
        .repo
        .find_user_record_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("No account found with that email".into()))?;

    let token = auth::issue_reset_token(&state.config, record.user.id)?;
    send_in_background(&state.mailer, reset_mail(&email, &token, RESET_TOKEN_TTL_MINUTES));

    let body = ForgotPasswordResponse {
        email,
        reset_token: state.config.expose_reset_token.then_some(token),
        expires_in_minutes: RESET_TOKEN_TTL_MINUTES,
    };
    Ok(ApiResponse::ok(body, "Password reset instructions sent"))
}

/// reset_password
///
/// Redeems a reset token: checks purpose and expiry, stores the new password and ends
/// existing sessions.
#[utoipa::path(
    post,
    path = "/api/v1/users/reset-password",
    request_body = ResetPasswordRequest,
    responses((status = 200, description = "Password reset"), (status = 400, description = "Invalid or expired token")),
    tag = "users"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> AppResult<ApiResponse<()>> {
    let user_id = auth::decode_reset_token(&state.config, req.token.trim())?;
    check_password_strength(&req.new_password)?;
    let user = state
        .repo
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let hash = hash_password(req.new_password, state.config.bcrypt_cost).await?;
    state.repo.set_password(user.id, &hash).await?;
    tracing::info!(user_id = %user.id, "password reset");
    Ok(ApiResponse::ok((), "Password has been reset successfully"))
}
