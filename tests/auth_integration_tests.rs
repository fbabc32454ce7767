mod common;

use association_portal::{
    AppConfig,
    auth::AccessClaims,
    config::Env,
    models::{MembershipStatus, Role},
    repository::UserRepository,
};
use axum::http::{Method, StatusCode, header};
use common::*;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use tower::ServiceExt;

fn login_request(email: &str, password: &str) -> axum::http::Request<axum::body::Body> {
    json(Method::POST, "/api/v1/users/login", None, json!({ "email": email, "password": password }))
}

#[tokio::test]
async fn public_reads_need_no_credentials() {
    let app = test_app();
    for uri in [
        "/api/v1/events",
        "/api/v1/gallery",
        "/api/v1/branches",
        "/api/v1/carousel",
        "/api/v1/content",
        "/api/v1/committee-members",
    ] {
        let (status, body) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body["success"], true);
    }
}

#[tokio::test]
async fn admin_routes_distinguish_unauthenticated_from_unauthorized() {
    let app = test_app();
    let (_, member_token) = seed_member(&app, "1201", Role::User, MembershipStatus::Approved).await;

    for uri in [
        "/api/v1/users",
        "/api/v1/branches/all",
        "/api/v1/carousel/all",
        "/api/v1/dashboard/stats",
    ] {
        let (status, body) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["errors"][0], "TOKEN_MISSING");

        let (status, _) = send(&app, get(uri, Some(&member_token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn login_sets_cookies_and_the_cookie_authenticates() {
    let app = test_app();
    seed_member(&app, "1301", Role::User, MembershipStatus::Approved).await;

    let response = app
        .router
        .clone()
        .oneshot(login_request("1301@example.com", PASSWORD))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<String> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    let access = cookies.iter().find(|c| c.starts_with("accessToken=")).expect("access cookie");
    assert!(access.contains("HttpOnly"));
    assert!(!access.contains("Secure"));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));

    let pair = access.split(';').next().unwrap().to_string();
    let request = axum::http::Request::builder()
        .uri("/api/v1/users/me")
        .header(header::COOKIE, pair)
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "1301@example.com");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = test_app();
    seed_member(&app, "1401", Role::User, MembershipStatus::Approved).await;

    let (status_a, body_a) = send(&app, login_request("1401@example.com", "nope-nope")).await;
    let (status_b, body_b) = send(&app, login_request("ghost@example.com", PASSWORD)).await;
    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_b, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["message"], body_b["message"]);
}

#[tokio::test]
async fn password_whitespace_is_kept_at_registration() {
    let app = test_app();
    let password = "  spaced-pass  ";
    let form = profile_fields("1450")
        .iter()
        .fold(Form::new(), |form, (k, v)| form.text(k, v))
        .text("password", password)
        .file("profilePic", "me.png", "image/png");
    let (status, _) = send(&app, form.request(Method::POST, "/api/v1/users/register", None)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, login_request("1450@example.com", password)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, login_request("1450@example.com", password.trim())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_frontend_login_rejects_regular_members() {
    let app = test_app();
    seed_member(&app, "1501", Role::User, MembershipStatus::Approved).await;
    admin(&app).await;

    let mut request = login_request("1501@example.com", PASSWORD);
    request.headers_mut().insert("x-admin-frontend", "true".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut request = login_request("admin@example.com", PASSWORD);
    request.headers_mut().insert("x-admin-frontend", "1".parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "admin");
}

#[tokio::test]
async fn refresh_rotates_and_rejects_the_old_token() {
    let app = test_app();
    seed_member(&app, "1601", Role::User, MembershipStatus::Approved).await;
    let (_, body) = send(&app, login_request("1601@example.com", PASSWORD)).await;
    let first = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json(Method::POST, "/api/v1/users/refresh-token", None, json!({ "refreshToken": first })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let second = body["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let (status, body) = send(
        &app,
        json(Method::POST, "/api/v1/users/refresh-token", None, json!({ "refreshToken": first })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"][0], "TOKEN_INVALID");
}

#[tokio::test]
async fn logout_clears_the_stored_refresh_token() {
    let app = test_app();
    let (user, _) = seed_member(&app, "1701", Role::User, MembershipStatus::Approved).await;
    let (_, body) = send(&app, login_request("1701@example.com", PASSWORD)).await;
    let refresh = body["data"]["refreshToken"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json(Method::POST, "/api/v1/users/logout", None, json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let record = app.repo.find_user_record(user.id).await.unwrap().unwrap();
    assert!(record.refresh_token.is_none());
}

#[tokio::test]
async fn expired_and_tampered_tokens_are_rejected() {
    let app = test_app();
    let (user, token) = seed_member(&app, "1801", Role::User, MembershipStatus::Approved).await;

    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user.id,
        email: user.profile.email.clone(),
        username: user.username(),
        iat: now - 1200,
        exp: now - 600,
    };
    let expired = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(app.config.access_token_secret.as_bytes()),
    )
    .unwrap();
    let (status, body) = send(&app, get("/api/v1/users/me", Some(&expired))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"][0], "TOKEN_EXPIRED");

    let tampered = format!("{token}x");
    let (status, body) = send(&app, get("/api/v1/users/me", Some(&tampered))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"][0], "TOKEN_INVALID");
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = test_app();
    seed_member(&app, "1901", Role::User, MembershipStatus::Approved).await;

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/forgot-password",
            None,
            json!({ "email": "nobody@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/forgot-password",
            None,
            json!({ "email": "1901@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["expiresInMinutes"], 15);
    let token = body["data"]["resetToken"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/reset-password",
            None,
            json!({ "token": token, "newPassword": "brand-new-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, login_request("1901@example.com", PASSWORD)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, login_request("1901@example.com", "brand-new-pass")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/reset-password",
            None,
            json!({ "token": "garbage", "newPassword": "another-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_token_is_withheld_when_not_exposed() {
    let app = test_app_with(AppConfig { expose_reset_token: false, ..test_config() });
    seed_member(&app, "2001", Role::User, MembershipStatus::Approved).await;

    let (_, body) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/forgot-password",
            None,
            json!({ "email": "2001@example.com" }),
        ),
    )
    .await;
    assert!(body["data"]["resetToken"].is_null());
}

#[tokio::test]
async fn production_cookies_are_secure_and_cross_site() {
    let app = test_app_with(AppConfig { env: Env::Production, ..test_config() });
    seed_member(&app, "2101", Role::User, MembershipStatus::Approved).await;

    let response = app
        .router
        .clone()
        .oneshot(login_request("2101@example.com", PASSWORD))
        .await
        .unwrap();
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=None"));
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
    let app = test_app();
    let (_, token) = seed_member(&app, "2201", Role::User, MembershipStatus::Pending).await;

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&token),
            json!({ "currentPassword": "wrong-one", "newPassword": "next-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&token),
            json!({ "currentPassword": PASSWORD, "newPassword": "next-pass" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, login_request("2201@example.com", "next-pass")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let app = test_app();
    let (status, body) = send(&app, get("/api/v1/nothing-here", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 404);
}
