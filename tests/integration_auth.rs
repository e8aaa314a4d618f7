#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::clone_on_ref_ptr, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_signup_verify_signin_flow() {
    let app = common::TestApp::spawn().await;
    let email = format!("reader_{}@example.com", &Uuid::new_v4().to_string()[..8]);

    let resp = app.signup("Reader", &email, "password123").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["isVerified"], false);
    assert!(body.get("passwordHash").is_none());

    // Unverified accounts cannot sign in yet
    let resp =
        app.client.post(app.api("/user/signin")).json(&json!({ "email": email, "password": "password123" })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .client
        .post(app.api("/user/verify-otp"))
        .json(&json!({ "email": email, "otp": "not-the-code" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let code = app.mailer.last_code(&email);
    let resp =
        app.client.post(app.api("/user/verify-otp")).json(&json!({ "email": email, "otp": code })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp =
        app.client.post(app.api("/user/signin")).json(&json!({ "email": email, "password": "password123" })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session: Value = resp.json().await.unwrap();
    let token = session["token"].as_str().unwrap();
    assert_eq!(session["user"]["email"], email.as_str());
    assert_eq!(session["user"]["isVerified"], true);

    let resp = app.client.post(app.api("/user/get-user-details")).bearer_auth(token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let details: Value = resp.json().await.unwrap();
    assert_eq!(details["fullName"], "Reader");

    let resp = app.client.post(app.api("/user/signout")).bearer_auth(token).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signup_rejects_duplicates_and_bad_input() {
    let app = common::TestApp::spawn().await;
    let user = app.register_user("dup").await;

    let resp = app.signup("Again", &user.email, "password123").await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = app.signup("NoMail", "not-an-email", "password123").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Email is not valid");

    let resp = app.signup("", "empty@example.com", "").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = common::TestApp::spawn().await;
    let user = app.register_user("wrongpw").await;

    let resp = app
        .client
        .post(app.api("/user/signin"))
        .json(&json!({ "email": user.email, "password": "not-my-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.post(app.api("/user/get-user-details")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app.client.get(app.api("/msg/chat-users")).bearer_auth("garbage").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = common::TestApp::spawn().await;
    let user = app.register_user("forgetful").await;

    let resp = app.client.post(app.api("/user/forgot-password")).json(&json!({ "email": user.email })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token = app.mailer.last_reset_token(&user.email);

    let resp = app
        .client
        .post(app.api("/user/reset-password"))
        .json(&json!({ "token": token, "newPassword": "brandnew456", "confirmPassword": "different789" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .client
        .post(app.api("/user/reset-password"))
        .json(&json!({ "token": token, "newPassword": "brandnew456", "confirmPassword": "brandnew456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .client
        .post(app.api("/user/signin"))
        .json(&json!({ "email": user.email, "password": "brandnew456" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // A login token is not a reset token
    let resp = app
        .client
        .post(app.api("/user/reset-password"))
        .json(&json!({ "token": user.token, "newPassword": "x1", "confirmPassword": "x1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password_checks_old_password() {
    let app = common::TestApp::spawn().await;
    let user = app.register_user("changer").await;

    let resp = app
        .client
        .post(app.api("/user/change-password"))
        .bearer_auth(&user.token)
        .json(&json!({ "oldPassword": "wrong", "newPassword": "another123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Old password is incorrect");

    let resp = app
        .client
        .post(app.api("/user/change-password"))
        .bearer_auth(&user.token)
        .json(&json!({ "oldPassword": "password123", "newPassword": "another123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .client
        .post(app.api("/user/signin"))
        .json(&json!({ "email": user.email, "password": "another123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_resend_otp_for_verified_user_is_rejected() {
    let app = common::TestApp::spawn().await;
    let user = app.register_user("verified").await;

    let resp = app.client.post(app.api("/user/resend-otp")).json(&json!({ "email": user.email })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
