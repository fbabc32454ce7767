mod common;

use association_portal::{
    models::{MembershipStatus, Role},
    repository::UserRepository,
};
use axum::http::{Method, StatusCode, header};
use common::*;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tower::ServiceExt;

#[tokio::test]
async fn registration_creates_a_pending_member_with_numbers() {
    let app = test_app();
    let (status, body) = send(
        &app,
        registration_form("1001").request(Method::POST, "/api/v1/users/register", None),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 201);
    let user = &body["data"];
    assert_eq!(user["membershipStatus"], "pending");
    assert_eq!(user["role"], "user");
    assert!(user["membershipNumber"].as_str().unwrap().starts_with("MEM-"));
    assert!(user["registrationNumber"].as_str().unwrap().starts_with("REG-"));
    assert!(user.get("password").is_none());
    assert_eq!(app.storage.stored().len(), 1);
}

#[tokio::test]
async fn registration_names_every_missing_field() {
    let app = test_app();
    let form = Form::new().text("name", "Sita").text("email", "sita@example.com");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/users/register", None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let errors: Vec<&str> =
        body["errors"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    for field in ["employeeId", "surname", "mobileNumber", "password", "profilePic"] {
        assert!(errors.contains(&field), "missing {field} in {errors:?}");
    }
    assert!(!errors.contains(&"name"));
    assert!(app.storage.stored().is_empty());
}

#[tokio::test]
async fn registration_rejects_duplicate_identity_fields() {
    let app = test_app();
    seed_member(&app, "2002", Role::User, MembershipStatus::Approved).await;

    let (status, body) = send(
        &app,
        registration_form("2002").request(Method::POST, "/api/v1/users/register", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.contains(&json!("employeeId")));
    assert!(errors.contains(&json!("email")));
    assert!(errors.contains(&json!("mobileNumber")));
}

#[tokio::test]
async fn registration_rejects_unsupported_profile_picture() {
    let app = test_app();
    let form = profile_fields("3003")
        .iter()
        .fold(Form::new(), |form, (k, v)| form.text(k, v))
        .text("password", PASSWORD)
        .file("profilePic", "me.exe", "application/x-msdownload");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/users/register", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported file type");
}

#[tokio::test]
async fn concurrent_duplicate_registrations_produce_one_member() {
    let app = test_app();
    let mut tasks = JoinSet::new();
    for _ in 0..5 {
        let router = app.router.clone();
        let request =
            registration_form("4004").request(Method::POST, "/api/v1/users/register", None);
        tasks.spawn(async move { router.oneshot(request).await.unwrap().status() });
    }

    let mut created = 0;
    let mut rejected = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::BAD_REQUEST => rejected += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(rejected, 4);
    assert_eq!(app.repo.list_users(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn approval_only_applies_to_pending_members() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "5005", Role::User, MembershipStatus::Pending).await;
    let uri = format!("/api/v1/users/{}/approve", member.id);

    let (status, body) = send(&app, json(Method::POST, &uri, Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["membershipStatus"], "approved");

    let (status, body) = send(&app, json(Method::POST, &uri, Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Membership is not pending");
    let stored = app.repo.find_user(member.id).await.unwrap().unwrap();
    assert_eq!(stored.membership_status, MembershipStatus::Approved);
}

#[tokio::test]
async fn declining_deletes_the_member_and_its_files() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "6006", Role::User, MembershipStatus::Pending).await;

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            &format!("/api/v1/users/{}/decline", member.id),
            Some(&token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.storage.deleted().contains(&member.profile_pic));

    let (status, _) = send(&app, get(&format!("/api/v1/users/{}", member.id), Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        json(
            Method::POST,
            &format!("/api/v1/users/{}/decline", member.id),
            Some(&token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Membership is not pending");
}

#[tokio::test]
async fn declining_an_approved_member_leaves_it_untouched() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "6106", Role::User, MembershipStatus::Approved).await;

    let (status, _) = send(
        &app,
        json(
            Method::POST,
            &format!("/api/v1/users/{}/decline", member.id),
            Some(&token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.repo.find_user(member.id).await.unwrap().is_some());
    assert!(app.storage.deleted().is_empty());
}

#[tokio::test]
async fn bulk_import_reports_the_failing_row_and_continues() {
    let app = test_app();
    let (_, token) = admin(&app).await;

    let rows: Vec<Value> = (0..4)
        .map(|i| {
            let mut row = serde_json::to_value(profile(&format!("70{i}"))).unwrap();
            if i == 2 {
                row["surname"] = json!("   ");
            }
            row
        })
        .collect();
    let (status, body) = send(
        &app,
        json(Method::POST, "/api/v1/users/bulk-import", Some(&token), json!({ "members": rows })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["total"], 4);
    assert_eq!(report["succeeded"], 3);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["failures"][0]["index"], 2);
    assert!(report["failures"][0]["reason"].as_str().unwrap().contains("surname"));
    // the admin plus the three imported rows
    assert_eq!(app.repo.list_users(None).await.unwrap().len(), 4);
}

#[tokio::test]
async fn bulk_import_rejects_duplicates_within_the_batch() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let row = serde_json::to_value(profile("7777")).unwrap();

    let (_, body) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/users/bulk-import",
            Some(&token),
            json!({ "members": [row.clone(), row] }),
        ),
    )
    .await;
    assert_eq!(body["data"]["succeeded"], 1);
    assert_eq!(body["data"]["failures"][0]["index"], 1);
}

#[tokio::test]
async fn availability_and_employee_lookup() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "8008", Role::User, MembershipStatus::Approved).await;

    let (_, body) = send(
        &app,
        get("/api/v1/users/check-availability?field=email&value=8008@example.com", Some(&token)),
    )
    .await;
    assert_eq!(body["data"]["available"], false);
    let (_, body) = send(
        &app,
        get("/api/v1/users/check-availability?field=email&value=free@example.com", Some(&token)),
    )
    .await;
    assert_eq!(body["data"]["available"], true);

    let (status, body) = send(&app, get("/api/v1/users/employee/EMP-8008", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], member.id.to_string());
    let (status, _) = send(&app, get("/api/v1/users/employee/EMP-nobody", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_returns_a_spreadsheet_attachment() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    seed_member(&app, "9009", Role::User, MembershipStatus::Approved).await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/users/export", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("members.xlsx"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // xlsx files are zip archives
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let app = test_app();
    let (me, token) = admin(&app).await;
    let (status, _) = send(&app, delete(&format!("/api/v1/users/{}", me.id), Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.repo.find_user(me.id).await.unwrap().is_some());
}

#[tokio::test]
async fn dashboard_counts_members_by_status() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    seed_member(&app, "1111", Role::User, MembershipStatus::Pending).await;

    let (status, body) = send(&app, get("/api/v1/dashboard/stats", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pendingMembers"], 1);
    assert_eq!(body["data"]["approvedMembers"], 1);
}
