#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::clone_on_ref_ptr, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_only_admins_manage_categories() {
    let app = common::TestApp::spawn().await;
    let reader = app.register_user("reader").await;
    let admin = app.register_admin().await;

    let resp = app.create_category(&reader, "Poetry").await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Access denied: Admins only");

    let form = reqwest::multipart::Form::new().text("name", "Poetry");
    let resp = app.client.post(app.api("/category/admin/add")).multipart(form).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let icon = reqwest::multipart::Part::bytes(b"<svg/>".to_vec()).file_name("quill.svg");
    let form = reqwest::multipart::Form::new().text("name", " Poetry ").part("icon", icon);
    let resp =
        app.client.post(app.api("/category/admin/add")).bearer_auth(&admin.token).multipart(form).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let category: Value = resp.json().await.unwrap();
    assert_eq!(category["name"], "poetry");
    let icon_path = category["icon"].as_str().unwrap().to_string();
    let resp = app.client.get(format!("{}/{icon_path}", app.server_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.create_category(&admin, "POETRY").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let id = category["id"].as_str().unwrap();
    let form = reqwest::multipart::Form::new().text("name", "Verse");
    let resp = app
        .client
        .put(app.api(&format!("/category/{id}")))
        .bearer_auth(&reader.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app.client.delete(app.api(&format!("/category/{id}"))).bearer_auth(&reader.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_category_lifecycle() {
    let app = common::TestApp::spawn().await;
    let admin = app.register_admin().await;
    let reader = app.register_user("reader").await;

    let fiction = app.seed_category(&admin, "Fiction").await;
    app.seed_category(&admin, "Biography").await;

    let resp = app.client.get(app.api("/category/all")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let all: Vec<Value> = resp.json().await.unwrap();
    let names: Vec<&str> = all.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["biography", "fiction"]);

    let resp = app.client.get(app.api(&format!("/category/{fiction}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.client.get(app.api(&format!("/category/{}", Uuid::new_v4()))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.client.get(app.api("/category/not-a-uuid")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let form = reqwest::multipart::Form::new().text("name", "Novels");
    let resp = app
        .client
        .put(app.api(&format!("/category/{fiction}")))
        .bearer_auth(&admin.token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let renamed: Value = resp.json().await.unwrap();
    assert_eq!(renamed["name"], "novels");

    let book = app.list_book(&reader, fiction, "A Wizard of Earthsea").await;
    let resp = app.client.delete(app.api(&format!("/category/{fiction}"))).bearer_auth(&admin.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let book_id = book["id"].as_str().unwrap();
    let resp =
        app.client.delete(app.api(&format!("/book/delete/{book_id}"))).bearer_auth(&reader.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.client.delete(app.api(&format!("/category/{fiction}"))).bearer_auth(&admin.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.client.delete(app.api(&format!("/category/{fiction}"))).bearer_auth(&admin.token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
