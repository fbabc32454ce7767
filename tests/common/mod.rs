#![allow(dead_code)]

use association_portal::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, auth, create_router,
    membership::create_member,
    models::{MemberProfile, MembershipStatus, NewUser, Role, User},
    repository::RepositoryState,
    storage::StorageState,
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "secret-pass";

pub struct TestApp {
    pub router: Router,
    pub repo: RepositoryState,
    pub storage: Arc<MockStorageService>,
    pub config: AppConfig,
}

/// Fast hashing; everything else as in local mode.
pub fn test_config() -> AppConfig {
    AppConfig { bcrypt_cost: 4, ..AppConfig::default() }
}

pub fn test_app() -> TestApp {
    test_app_with(test_config())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let repo: RepositoryState = Arc::new(InMemoryRepository::new());
    let storage = Arc::new(MockStorageService::new());
    let state = AppState::new(repo.clone(), storage.clone() as StorageState, config.clone());
    TestApp { router: create_router(state), repo, storage, config }
}

/// A complete profile whose identity fields are derived from `seed`.
pub fn profile(seed: &str) -> MemberProfile {
    MemberProfile {
        employee_id: format!("EMP-{seed}"),
        name: "Ram".into(),
        surname: format!("Sharma {seed}"),
        email: format!("{seed}@example.com"),
        mobile_number: format!("98{seed:0>8}"),
        phone_number: String::new(),
        dob: "2010-01-01".into(),
        province: "Gandaki".into(),
        district: "Kaski".into(),
        municipality: "Pokhara".into(),
        ward_number: "8".into(),
        tole: "Lakeside".into(),
        post_at_retirement: "Officer".into(),
        pension_lease_number: format!("PL-{seed}"),
        office: "District Office".into(),
        service_start_date: "2040-01-01".into(),
        retirement_date: "2075-01-01".into(),
        fill_up_date: "2081-01-01".into(),
        place: "Pokhara".into(),
    }
}

/// Profile as the flat JSON / form field map clients send.
pub fn profile_fields(seed: &str) -> Vec<(String, String)> {
    let value = serde_json::to_value(profile(seed)).expect("profile serialises");
    value
        .as_object()
        .expect("profile is an object")
        .iter()
        .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
        .collect()
}

/// Inserts a member directly and returns it with a valid access token.
pub async fn seed_member(
    app: &TestApp,
    seed: &str,
    role: Role,
    status: MembershipStatus,
) -> (User, String) {
    let password_hash = auth::hash_password(PASSWORD.to_string(), 4).await.unwrap();
    let user = create_member(
        &app.repo,
        NewUser {
            profile: profile(seed),
            password_hash,
            role,
            membership_status: status,
            membership_number: String::new(),
            registration_number: String::new(),
            profile_pic: format!("http://localhost:9000/mock-bucket/users/{seed}.png"),
            document: None,
        },
    )
    .await
    .unwrap();
    let token = auth::issue_access_token(&app.config, &user).unwrap();
    (user, token)
}

pub async fn admin(app: &TestApp) -> (User, String) {
    seed_member(app, "admin", Role::Admin, MembershipStatus::Approved).await
}

pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    builder(Method::GET, uri, token).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    builder(Method::DELETE, uri, token).body(Body::empty()).unwrap()
}

pub fn json(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    builder(method, uri, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Minimal multipart/form-data body builder.
pub struct Form {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self { boundary: "portal-test-boundary", body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        let part = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
            self.boundary
        );
        self.body.extend_from_slice(part.as_bytes());
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, mime: &str) -> Self {
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n",
            self.boundary
        );
        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(b"file-bytes");
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn request(mut self, method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        self.body.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        builder(method, uri, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// A registration form for `seed`, with password and profile picture.
pub fn registration_form(seed: &str) -> Form {
    profile_fields(seed)
        .iter()
        .fold(Form::new(), |form, (k, v)| form.text(k, v))
        .text("password", PASSWORD)
        .file("profilePic", "me.png", "image/png")
}
