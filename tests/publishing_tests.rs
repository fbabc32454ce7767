mod common;

use association_portal::{
    models::{ContentUpsert, MembershipStatus, Role},
    repository::ContentRepository,
};
use axum::http::{Method, StatusCode};
use common::*;
use serde_json::{Value, json};

async fn create_branch(app: &TestApp, token: &str, name: &str) -> (StatusCode, Value) {
    let form = Form::new().text("name", name).text("address", "Lakeside, Pokhara");
    send(app, form.request(Method::POST, "/api/v1/branches", Some(token))).await
}

fn ids(body: &Value, path: &str) -> Vec<String> {
    body["data"][path]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect()
}

// --- Branches ---

#[tokio::test]
async fn branch_slugs_are_derived_and_never_duplicated() {
    let app = test_app();
    let (_, token) = admin(&app).await;

    let (status, body) = create_branch(&app, &token, "Pokhara Branch!!").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["slug"], "pokharabranch");
    assert_eq!(body["data"]["order"], 1);

    let (status, body) = create_branch(&app, &token, "pokhara branch").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["slug"]));

    let (status, body) = send(&app, get("/api/v1/branches/slug/PokharaBranch", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Pokhara Branch!!");

    let (status, _) = create_branch(&app, &token, "!!!").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn team_photos_are_matched_by_index_and_links_resolved() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "3101", Role::User, MembershipStatus::Approved).await;

    let team = json!([
        { "name": "Hari", "position": "Manager", "photoIndex": 0 },
        { "userId": member.id, "position": "Clerk" }
    ]);
    let form = Form::new()
        .text("name", "Butwal")
        .text("teamMembers", &team.to_string())
        .file("heroImage", "hero.jpg", "image/jpeg")
        .file("teamMemberPhotos", "hari.png", "image/png");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/branches", Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);

    let stored = app.storage.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(body["data"]["heroImage"], stored[0]);
    let team = body["data"]["team"].as_array().unwrap();
    assert_eq!(team[0]["displayPhoto"], stored[1]);
    assert_eq!(team[1]["displayName"], "Ram Sharma 3101");
    assert_eq!(team[1]["displayPhoto"], member.profile_pic);

    let bad = Form::new()
        .text("name", "Dang")
        .text("teamMembers", &json!([{ "name": "X", "photoIndex": 3 }]).to_string())
        .file("teamMemberPhotos", "x.png", "image/png");
    let (status, _) = send(&app, bad.request(Method::POST, "/api/v1/branches", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.storage.deleted().len(), 1);
}

#[tokio::test]
async fn inactive_branches_are_hidden_from_the_public_listing() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (_, body) = create_branch(&app, &token, "Itahari").await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let status_uri = format!("/api/v1/branches/{id}/status");

    let (status, body) =
        send(&app, json(Method::PATCH, &status_uri, Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Branch deactivated");

    let (_, public) = send(&app, get("/api/v1/branches", None)).await;
    assert!(public["data"].as_array().unwrap().is_empty());
    let (_, all) = send(&app, get("/api/v1/branches/all", Some(&token))).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app,
        json(Method::PATCH, &status_uri, Some(&token), json!({ "isActive": true })),
    )
    .await;
    assert_eq!(body["data"]["isActive"], true);
}

#[tokio::test]
async fn renaming_a_branch_moves_its_slug_and_deleting_purges_files() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = Form::new().text("name", "Old Name").file("heroImage", "hero.png", "image/png");
    let (_, body) = send(&app, form.request(Method::POST, "/api/v1/branches", Some(&token))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let hero = body["data"]["heroImage"].as_str().unwrap().to_string();

    let rename = Form::new().text("name", "New Name");
    let (status, body) = send(
        &app,
        rename.request(Method::PATCH, &format!("/api/v1/branches/{id}"), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "newname");
    let (status, _) = send(&app, get("/api/v1/branches/slug/oldname", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, delete(&format!("/api/v1/branches/{id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 1);
    assert!(app.storage.deleted().contains(&hero));
}

// --- Carousel ---

#[tokio::test]
async fn branch_carousels_require_an_existing_branch() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    create_branch(&app, &token, "Pokhara").await;

    let no_branch = Form::new()
        .text("title", "Welcome")
        .text("type", "branch")
        .file("images", "a.png", "image/png");
    let (status, body) =
        send(&app, no_branch.request(Method::POST, "/api/v1/carousel", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Branch is required for branch type carousel");

    let unknown = Form::new()
        .text("title", "Welcome")
        .text("type", "branch")
        .text("branch", "nowhere")
        .file("images", "a.png", "image/png");
    let (status, _) =
        send(&app, unknown.request(Method::POST, "/api/v1/carousel", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.storage.stored().is_empty());

    let valid = Form::new()
        .text("title", "Welcome")
        .text("type", "branch")
        .text("branch", "Pokhara")
        .text("alts", r#"["first"]"#)
        .file("images", "a.png", "image/png")
        .file("images", "b.png", "image/png")
        .file("images", "c.mp4", "video/mp4");
    let (status, body) =
        send(&app, valid.request(Method::POST, "/api/v1/carousel", Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);
    let carousel = &body["data"];
    assert_eq!(carousel["order"], 1);
    assert_eq!(carousel["branch"], "pokhara");
    assert_eq!(carousel["images"].as_array().unwrap().len(), 3);
    assert_eq!(carousel["images"][0]["alt"], "first");
    assert_eq!(carousel["images"][1]["alt"], "Welcome");

    let (_, listed) = send(&app, get("/api/v1/carousel?type=branch&branch=pokhara", None)).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn carousel_needs_at_least_one_image() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = Form::new().text("title", "Empty");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/carousel", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "At least one image is required");
}

#[tokio::test]
async fn removing_the_last_carousel_image_deletes_the_carousel() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = Form::new().text("title", "Home").file("images", "a.png", "image/png");
    let (_, body) = send(&app, form.request(Method::POST, "/api/v1/carousel", Some(&token))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let image = ids(&body, "images").remove(0);

    let (status, body) =
        send(&app, delete(&format!("/api/v1/carousel/{id}/images/{image}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
    let (status, _) = send(&app, get(&format!("/api/v1/carousel/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn removing_a_middle_carousel_image_keeps_the_rest_in_order() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = Form::new()
        .text("title", "Home")
        .file("images", "a.png", "image/png")
        .file("images", "b.png", "image/png")
        .file("images", "c.png", "image/png");
    let (_, body) = send(&app, form.request(Method::POST, "/api/v1/carousel", Some(&token))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let images = ids(&body, "images");
    let middle_url = body["data"]["images"][1]["url"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/carousel/{id}/images/{}", images[1]);
    let (status, body) = send(&app, delete(&uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body, "images"), vec![images[0].clone(), images[2].clone()]);
    assert_eq!(app.storage.deleted(), vec![middle_url]);

    let (_, body) = send(&app, get(&format!("/api/v1/carousel/{id}"), None)).await;
    assert_eq!(ids(&body, "images"), vec![images[0].clone(), images[2].clone()]);
}

// --- Gallery ---

#[tokio::test]
async fn gallery_image_removal_keeps_order_and_cascades_on_the_last() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = Form::new()
        .text("title", "Annual meeting")
        .text("category", "meeting")
        .file("images", "1.png", "image/png")
        .file("images", "2.png", "image/png")
        .file("images", "3.png", "image/png");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/gallery", Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["category"], "Meeting");
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let images = ids(&body, "images");

    let (_, body) = send(
        &app,
        delete(&format!("/api/v1/gallery/{id}/images/{}", images[1]), Some(&token)),
    )
    .await;
    assert_eq!(ids(&body, "images"), vec![images[0].clone(), images[2].clone()]);

    send(&app, delete(&format!("/api/v1/gallery/{id}/images/{}", images[0]), Some(&token))).await;
    let (status, body) = send(
        &app,
        delete(&format!("/api/v1/gallery/{id}/images/{}", images[2]), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
    assert_eq!(app.storage.deleted().len(), 3);

    let (status, _) = send(&app, get(&format!("/api/v1/gallery/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gallery_rejects_unknown_categories_and_missing_images() {
    let app = test_app();
    let (_, token) = admin(&app).await;

    let (status, body) = send(&app, get("/api/v1/gallery?category=Picnic", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 6);

    let form = Form::new().text("category", "Event");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/gallery", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["title", "images"]));

    let (_, body) = send(&app, get("/api/v1/gallery/categories", None)).await;
    assert!(body["data"].as_array().unwrap().contains(&json!("Social Service")));
}

// --- Events ---

#[tokio::test]
async fn event_file_limits_are_enforced_before_storing() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = (0..6).fold(Form::new().text("title", "Picnic"), |form, i| {
        form.file("files", &format!("{i}.jpg"), "image/jpeg")
    });
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/events", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "An event can have at most 5 images");
    assert!(app.storage.stored().is_empty());
}

#[tokio::test]
async fn events_are_searchable_by_lowercased_title() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    for title in ["Annual General Meeting", "Health Camp"] {
        let form = Form::new().text("title", title).text("location", "Hall");
        let (status, _) =
            send(&app, form.request(Method::POST, "/api/v1/events", Some(&token))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, get("/api/v1/events/search?title=GENERAL", None)).await;
    let found = body["data"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "annual general meeting");

    let (status, _) = send(&app, get("/api/v1/events/search?title=%20", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_event_files_can_be_removed() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let form = Form::new()
        .text("title", "Seminar")
        .file("files", "agenda.pdf", "application/pdf")
        .file("files", "poster.png", "image/png");
    let (_, body) = send(&app, form.request(Method::POST, "/api/v1/events", Some(&token))).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let agenda = body["data"]["files"][0]["url"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/events/{id}/files");

    let (status, body) =
        send(&app, json(Method::DELETE, &uri, Some(&token), json!({ "url": agenda }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["files"].as_array().unwrap().len(), 1);
    assert_eq!(app.storage.deleted(), vec![agenda.clone()]);

    let (status, _) =
        send(&app, json(Method::DELETE, &uri, Some(&token), json!({ "url": agenda }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Committee ---

#[tokio::test]
async fn committee_roster_is_ranked_and_borrows_linked_details() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "3201", Role::User, MembershipStatus::Approved).await;

    let secretary = Form::new()
        .text("name", "Gita")
        .text("role", "secretary")
        .text("committeeTitle", "Central");
    let chairman = Form::new()
        .text("role", "Chairman")
        .text("committeeTitle", "Central")
        .text("userId", &member.id.to_string());
    for form in [secretary, chairman] {
        let (status, _) =
            send(&app, form.request(Method::POST, "/api/v1/committee-members", Some(&token))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, get("/api/v1/committee-members", None)).await;
    let roster = body["data"].as_array().unwrap();
    assert_eq!(roster[0]["role"], "Chairman");
    assert_eq!(roster[0]["displayName"], "Ram Sharma 3201");
    assert_eq!(roster[0]["displayPhoto"], member.profile_pic);
    assert_eq!(roster[1]["displayName"], "Gita");

    let nameless = Form::new().text("role", "Member");
    let (status, _) =
        send(&app, nameless.request(Method::POST, "/api/v1/committee-members", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_committee_member_purges_only_its_own_photo() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "3301", Role::User, MembershipStatus::Approved).await;

    let linked = Form::new()
        .text("role", "Treasurer")
        .text("userId", &member.id.to_string());
    let (_, body) =
        send(&app, linked.request(Method::POST, "/api/v1/committee-members", Some(&token))).await;
    let linked_id = body["data"]["id"].as_str().unwrap().to_string();

    let own = Form::new()
        .text("name", "Hari")
        .text("role", "Member")
        .text("userId", &member.id.to_string())
        .file("profilePic", "hari.png", "image/png");
    let (_, body) =
        send(&app, own.request(Method::POST, "/api/v1/committee-members", Some(&token))).await;
    let own_id = body["data"]["id"].as_str().unwrap().to_string();
    let own_pic = body["data"]["profilePic"].as_str().unwrap().to_string();

    let (status, _) =
        send(&app, delete(&format!("/api/v1/committee-members/{linked_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.storage.deleted().is_empty());

    let (status, _) =
        send(&app, delete(&format!("/api/v1/committee-members/{own_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.storage.deleted(), vec![own_pic]);
    assert!(!app.storage.deleted().contains(&member.profile_pic));
}

#[tokio::test]
async fn deleting_a_branch_leaves_borrowed_team_photos_alone() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "3302", Role::User, MembershipStatus::Approved).await;

    let team = json!([
        { "userId": member.id, "position": "Clerk", "profilePic": member.profile_pic },
        { "name": "Hari", "position": "Manager", "photoIndex": 0 }
    ]);
    let form = Form::new()
        .text("name", "Hetauda")
        .text("teamMembers", &team.to_string())
        .file("teamMemberPhotos", "hari.png", "image/png");
    let (status, body) =
        send(&app, form.request(Method::POST, "/api/v1/branches", Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uploaded = app.storage.stored();

    let replace_team = json!([{ "userId": member.id, "profilePic": member.profile_pic }]);
    let update = Form::new().text("teamMembers", &replace_team.to_string());
    let (status, _) = send(
        &app,
        update.request(Method::PATCH, &format!("/api/v1/branches/{id}"), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.storage.deleted(), uploaded);

    let (status, body) = send(&app, delete(&format!("/api/v1/branches/{id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 0);
    assert!(!app.storage.deleted().contains(&member.profile_pic));
}

#[tokio::test]
async fn deleting_a_member_keeps_committee_and_team_entries() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (member, _) = seed_member(&app, "3303", Role::User, MembershipStatus::Approved).await;

    let seat = Form::new()
        .text("name", "Ram")
        .text("role", "Member")
        .text("userId", &member.id.to_string());
    let (status, _) =
        send(&app, seat.request(Method::POST, "/api/v1/committee-members", Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);
    let team = json!([{ "userId": member.id, "name": "Ram", "position": "Clerk" }]);
    let branch = Form::new().text("name", "Janakpur").text("teamMembers", &team.to_string());
    let (status, _) =
        send(&app, branch.request(Method::POST, "/api/v1/branches", Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) =
        send(&app, delete(&format!("/api/v1/users/{}", member.id), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/v1/committee-members", None)).await;
    let roster = body["data"].as_array().unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["userId"], json!(member.id));
    assert_eq!(roster[0]["displayName"], "Ram");
    assert!(roster[0]["linkedUser"].is_null());

    let (_, body) = send(&app, get("/api/v1/branches/slug/janakpur", None)).await;
    let team = body["data"]["team"].as_array().unwrap();
    assert_eq!(team.len(), 1);
    assert_eq!(team[0]["displayName"], "Ram");
    assert!(team[0]["linkedUser"].is_null());
}

// --- Content and settings ---

#[tokio::test]
async fn content_reads_are_cached_until_cleared() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let (status, _) = send(
        &app,
        json(
            Method::POST,
            "/api/v1/content",
            Some(&token),
            json!({ "key": " Home.Hero ", "value": "Welcome", "page": "home" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/v1/content?page=home", None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["key"], "home.hero");

    // Written behind the API's back, so the cached listing stays stale.
    app.repo
        .upsert_content(&ContentUpsert {
            key: "home.tagline".into(),
            value: "Together".into(),
            page: Some("home".into()),
            ..ContentUpsert::default()
        })
        .await
        .unwrap();
    let (_, body) = send(&app, get("/api/v1/content?page=home", None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        json(Method::POST, "/api/v1/content/cache/clear", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/api/v1/content?page=home", None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn bulk_content_is_validated_before_anything_is_written() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let items = json!({
        "items": [{ "key": "about.title", "value": "About" }, { "key": "  ", "value": "x" }]
    });
    let (status, _) =
        send(&app, json(Method::PUT, "/api/v1/content/bulk", Some(&token), items)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, get("/api/v1/content/about.title", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_round_trip() {
    let app = test_app();
    let (_, token) = admin(&app).await;
    let uri = "/api/v1/settings/site.contact";

    let (status, _) = send(&app, get(uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let value = json!({ "phone": "061-123456", "email": "info@example.org" });
    let (status, body) = send(
        &app,
        json(
            Method::PUT,
            uri,
            Some(&token),
            json!({ "value": value, "description": "Footer contact" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], value);

    let (_, body) = send(&app, get("/api/v1/settings/SITE.CONTACT", None)).await;
    assert_eq!(body["data"]["description"], "Footer contact");

    let (status, _) = send(&app, delete(uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, delete(uri, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
