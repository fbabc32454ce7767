use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult, AuthFailure},
    models::{Role, TokenPair, User, parse_flag},
    repository::RepositoryState,
};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const RESET_PURPOSE: &str = "password_reset";
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;
pub const ADMIN_FRONTEND_HEADER: &str = "x-admin-frontend";

/// AccessClaims
///
/// Payload of the short-lived access token. Carries enough to label log lines without a
/// lookup; authorization always re-reads the user.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (sub): the member's id.
    pub sub: Uuid,
    pub email: String,
    /// Full name at issue time. Display only; it goes stale after a profile edit.
    pub username: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: i64,
}

/// RefreshClaims
///
/// Payload of the long-lived refresh token. `jti` makes every issued token distinct, so a
/// rotated token never equals its predecessor.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    /// Token id (jti): random per issue.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// ResetClaims
///
/// Payload of the password-reset token, signed with its own secret and valid for
/// `RESET_TOKEN_TTL_MINUTES`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetClaims {
    /// The member whose password may be reset.
    pub sub: Uuid,
    /// Always `RESET_PURPOSE`; a token of any other kind is refused even if the secrets match.
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> AppResult<String> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AuthFailure> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthFailure::ExpiredToken,
            _ => AuthFailure::InvalidToken,
        })
}

pub fn issue_access_token(config: &AppConfig, user: &User) -> AppResult<String> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user.id,
        email: user.profile.email.clone(),
        username: user.username(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(config.access_token_ttl_minutes)).timestamp(),
    };
    sign(&claims, &config.access_token_secret)
}

pub fn issue_refresh_token(config: &AppConfig, user_id: Uuid) -> AppResult<String> {
    let now = Utc::now();
    let claims = RefreshClaims {
        sub: user_id,
        jti: Uuid::new_v4(),
        iat: now.timestamp(),
        exp: (now + Duration::days(config.refresh_token_ttl_days)).timestamp(),
    };
    sign(&claims, &config.refresh_token_secret)
}

pub fn issue_token_pair(config: &AppConfig, user: &User) -> AppResult<TokenPair> {
    Ok(TokenPair {
        access_token: issue_access_token(config, user)?,
        refresh_token: issue_refresh_token(config, user.id)?,
    })
}

pub fn decode_access_token(config: &AppConfig, token: &str) -> Result<AccessClaims, AuthFailure> {
    verify(token, &config.access_token_secret)
}

pub fn decode_refresh_token(config: &AppConfig, token: &str) -> Result<RefreshClaims, AuthFailure> {
    verify(token, &config.refresh_token_secret)
}

pub fn issue_reset_token(config: &AppConfig, user_id: Uuid) -> AppResult<String> {
    let now = Utc::now();
    let claims = ResetClaims {
        sub: user_id,
        purpose: RESET_PURPOSE.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(RESET_TOKEN_TTL_MINUTES)).timestamp(),
    };
    sign(&claims, &config.reset_token_secret)
}

/// Verifies signature, expiry and purpose of a password-reset token and yields the user id.
pub fn decode_reset_token(config: &AppConfig, token: &str) -> AppResult<Uuid> {
    let claims: ResetClaims = verify(token, &config.reset_token_secret).map_err(|kind| match kind {
        AuthFailure::ExpiredToken => AppError::BadRequest("Reset token has expired".into()),
        _ => AppError::BadRequest("Invalid reset token".into()),
    })?;
    if claims.purpose != RESET_PURPOSE {
        return Err(AppError::BadRequest("Invalid reset token".into()));
    }
    Ok(claims.sub)
}

// --- Passwords ---

/// Hashes on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
}

pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(AppError::from)
}

// --- Cookies ---

fn cookie(config: &AppConfig, name: &str, value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!("{name}={value}; HttpOnly; Path=/; Max-Age={max_age_secs}");
    if config.is_production() {
        // Frontends live on other origins in production.
        cookie.push_str("; SameSite=None; Secure");
    } else {
        cookie.push_str("; SameSite=Lax");
    }
    cookie
}

/// session_cookies
///
/// `Set-Cookie` headers installing both session tokens, or clearing them when `pair` is
/// `None`.
pub fn session_cookies(config: &AppConfig, pair: Option<&TokenPair>) -> AppResult<HeaderMap> {
    let cookies = match pair {
        Some(pair) => [
            cookie(config, ACCESS_COOKIE, &pair.access_token, config.access_token_ttl_minutes * 60),
            cookie(
                config,
                REFRESH_COOKIE,
                &pair.refresh_token,
                config.refresh_token_ttl_days * 24 * 60 * 60,
            ),
        ],
        None => [cookie(config, ACCESS_COOKIE, "", 0), cookie(config, REFRESH_COOKIE, "", 0)],
    };
    let mut headers = HeaderMap::new();
    for value in cookies {
        let value = HeaderValue::from_str(&value)
            .map_err(|e| AppError::Internal(format!("invalid cookie header: {e}")))?;
        headers.append(header::SET_COOKIE, value);
    }
    Ok(headers)
}

/// Reads one cookie from every `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The access token from the `accessToken` cookie, falling back to `Authorization: Bearer`.
pub fn access_token_from(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_COOKIE).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

pub fn is_admin_frontend(headers: &HeaderMap) -> bool {
    headers
        .get(ADMIN_FRONTEND_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_flag)
        .unwrap_or(false)
}

// --- Extractors ---

/// AuthUser
///
/// The verified caller. Usable directly as a handler argument; when the auth middleware has
/// already resolved the caller the cached value is reused.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn is_admin(&self) -> bool {
        self.0.role == Role::Admin
    }
}

/// resolve_user
///
/// Token lookup, verification and user load, with a distinct failure for each step.
pub async fn resolve_user(
    headers: &HeaderMap,
    repo: &RepositoryState,
    config: &AppConfig,
) -> AppResult<User> {
    // 1. Token extraction: cookie first, then the Bearer header.
    let token = access_token_from(headers)
        .ok_or(AppError::Authentication(AuthFailure::MissingToken))?;
    // 2. Signature and expiry.
    let claims = decode_access_token(config, &token).map_err(AppError::Authentication)?;
    // 3. The member must still exist; a deleted member's token dies with them.
    repo.find_user(claims.sub)
        .await?
        .ok_or(AppError::Authentication(AuthFailure::UserNotFound))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by the auth layer for this request.
        if let Some(cached) = parts.extensions.get::<AuthUser>() {
            return Ok(cached.clone());
        }
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        let user = resolve_user(&parts.headers, &repo, &config).await?;
        tracing::debug!(user_id = %user.id, "request authenticated");
        let auth = AuthUser(user);
        parts.extensions.insert(auth.clone());
        Ok(auth)
    }
}

/// AdminUser
///
/// An `AuthUser` whose role is admin. Authentication failures stay 401; a valid non-admin
/// caller gets 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            tracing::warn!(user_id = %auth.id(), "non-admin attempted an admin route");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(auth.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig { bcrypt_cost: 4, ..AppConfig::default() }
    }

    #[test]
    fn cookie_parsing_finds_named_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=abc.def; x=1"),
        );
        assert_eq!(read_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("abc.def"));
        assert_eq!(read_cookie(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn cookie_wins_over_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(access_token_from(&headers).as_deref(), Some("from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=from-cookie"));
        assert_eq!(access_token_from(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn expired_and_foreign_tokens_are_distinguished() {
        let config = config();
        let now = Utc::now().timestamp();
        let expired = AccessClaims {
            sub: Uuid::new_v4(),
            email: "a@b.c".into(),
            username: "A".into(),
            iat: now - 3600,
            exp: now - 600,
        };
        let token = sign(&expired, &config.access_token_secret).unwrap();
        assert_eq!(decode_access_token(&config, &token).unwrap_err(), AuthFailure::ExpiredToken);

        let refresh = issue_refresh_token(&config, Uuid::new_v4()).unwrap();
        assert_eq!(decode_access_token(&config, &refresh).unwrap_err(), AuthFailure::InvalidToken);
        assert_eq!(decode_access_token(&config, "garbage").unwrap_err(), AuthFailure::InvalidToken);
    }

    #[test]
    fn reset_tokens_check_purpose() {
        let config = config();
        let id = Uuid::new_v4();
        let token = issue_reset_token(&config, id).unwrap();
        assert_eq!(decode_reset_token(&config, &token).unwrap(), id);

        let now = Utc::now().timestamp();
        let wrong = ResetClaims { sub: id, purpose: "login".into(), iat: now, exp: now + 600 };
        let token = sign(&wrong, &config.reset_token_secret).unwrap();
        assert!(decode_reset_token(&config, &token).is_err());
    }

    #[test]
    fn session_cookies_are_http_only_and_clearable() {
        let config = config();
        let pair = TokenPair { access_token: "a".into(), refresh_token: "r".into() };
        let set = session_cookies(&config, Some(&pair)).unwrap();
        let values: Vec<_> = set.get_all(header::SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 2);
        assert!(values[0].to_str().unwrap().starts_with("accessToken=a; HttpOnly"));
        assert!(!values[0].to_str().unwrap().contains("Secure"));

        let cleared = session_cookies(&config, None).unwrap();
        assert!(cleared
            .get_all(header::SET_COOKIE)
            .iter()
            .all(|v| v.to_str().unwrap().contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn password_hashes_verify() {
        let hash = hash_password("s3cret!".into(), 4).await.unwrap();
        assert!(verify_password("s3cret!".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
    }
}
