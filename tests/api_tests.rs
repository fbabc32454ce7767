use association_portal::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, create_router,
    repository::RepositoryState, storage::StorageState,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Serves the full router on an ephemeral port, backed by the in-memory repository and the
/// storage mock.
async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(MockStorageService::new()) as StorageState;
    let config = AppConfig { bcrypt_cost: 4, ..AppConfig::default() };
    let router = create_router(AppState::new(repo, storage, config));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, client: reqwest::Client::new() }
}

fn registration_form(seed: &str) -> reqwest::multipart::Form {
    let picture = reqwest::multipart::Part::bytes(b"png-bytes".to_vec())
        .file_name("me.png")
        .mime_str("image/png")
        .unwrap();
    [
        ("employeeId", format!("EMP-{seed}")),
        ("name", "Sita".to_string()),
        ("surname", "Karki".to_string()),
        ("email", format!("{seed}@example.com")),
        ("mobileNumber", format!("98{seed:0>8}")),
        ("dob", "2012-04-01".to_string()),
        ("province", "Koshi".to_string()),
        ("district", "Morang".to_string()),
        ("municipality", "Biratnagar".to_string()),
        ("wardNumber", "3".to_string()),
        ("postAtRetirement", "Section Officer".to_string()),
        ("pensionLeaseNumber", format!("PL-{seed}")),
        ("office", "Land Revenue Office".to_string()),
        ("serviceStartDate", "2045-01-01".to_string()),
        ("retirementDate", "2078-01-01".to_string()),
        ("fillUpDate", "2081-05-01".to_string()),
        ("place", "Biratnagar".to_string()),
        ("password", "secret-pass".to_string()),
    ]
    .into_iter()
    .fold(reqwest::multipart::Form::new(), |form, (k, v)| form.text(k, v))
    .part("profilePic", picture)
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: Value = app
        .client
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"].get("/api/v1/users/register").is_some());
    assert!(doc["paths"].get("/api/v1/carousel/{id}/images/{image_id}").is_some());
}

#[tokio::test]
async fn test_register_then_login_over_http() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/api/v1/users/register", app.address))
        .multipart(registration_form("4242"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = app
        .client
        .post(format!("{}/api/v1/users/login", app.address))
        .json(&json!({ "email": "4242@example.com", "password": "secret-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let token = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["membershipStatus"], "pending");

    let me: Value = app
        .client
        .get(format!("{}/api/v1/users/me", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["data"]["employeeId"], "EMP-4242");
}

#[tokio::test]
async fn test_cors_preflight_allows_local_frontends() {
    let app = spawn_app().await;
    let response = app
        .client
        .request(reqwest::Method::OPTIONS, format!("{}/api/v1/events", app.address))
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:5173"
    );
    assert_eq!(response.headers()["access-control-allow-credentials"], "true");

    let response = app
        .client
        .request(reqwest::Method::OPTIONS, format!("{}/api/v1/events", app.address))
        .header("origin", "https://evil.example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}
