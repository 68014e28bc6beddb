mod common;

use common::TestApp;
use common::MAX_ATTEMPTS;
use identity_service::auth::models::NotificationTemplate;
use reqwest::StatusCode;
use serde_json::json;
use serde_json::Value;

#[tokio::test]
async fn test_register_success() {
    let app = TestApp::spawn().await;

    let response = app.register("alice", "correct-horse").await;

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(body["data"]["user"]["email"], "alice@example.com");
    assert_eq!(body["data"]["user"]["emailVerified"], false);
    assert_eq!(body["data"]["verificationRequired"], true);
    assert!(body["data"]["user"].get("password").is_none());

    let sent = app.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "alice@example.com");
    assert_eq!(sent[0].template, NotificationTemplate::EmailVerification);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;

    let response = app
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "correct-horse"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "registration_failed");
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = TestApp::spawn().await;

    let response = app.register("alice", "short").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "validation_failed");
}

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;

    let data = app.login_ok("alice@example.com", "correct-horse").await;

    assert_eq!(data["success"], true);
    assert!(data["sessionId"].is_string());
    assert!(data["accessToken"].is_string());
    assert!(data["refreshToken"].is_string());
    assert_ne!(data["accessToken"], data["refreshToken"]);
    assert_eq!(data["user"]["username"], "alice");
    assert!(data["settings"].is_object());
}

#[tokio::test]
async fn test_login_unknown_user_looks_like_wrong_password() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;

    let ghost = app.login("ghost", "whatever-pass").await;
    let wrong = app.login("alice", "wrong-password").await;

    assert_eq!(ghost.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ghost: Value = ghost.json().await.expect("Failed to parse response");
    let wrong: Value = wrong.json().await.expect("Failed to parse response");
    assert_eq!(ghost, wrong);
    assert_eq!(ghost["data"]["kind"], "invalid_credentials");
    assert_eq!(ghost["data"]["toMany"], false);
}

#[tokio::test]
async fn test_login_lockout() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;

    for _ in 0..MAX_ATTEMPTS - 1 {
        let response = app.login("alice", "wrong-password").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // The attempt reaching the threshold is already reported as locked
    let response = app.login("alice", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "account_locked");

    // Correct password is refused while locked
    let response = app.login("alice", "correct-horse").await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "account_locked");
    assert_eq!(body["data"]["toMany"], true);
    assert!(body["data"]["retryAfterSeconds"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let login = app.login_ok("alice", "correct-horse").await;

    let response = app
        .post("/api/auth/refresh-token")
        .json(&json!({ "refreshToken": login["refreshToken"] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_ne!(body["data"]["refreshToken"], login["refreshToken"]);
    assert_eq!(body["data"]["user"]["username"], "alice");

    // The rotated-out token is dead
    let replay = app
        .post("/api/auth/refresh-token")
        .json(&json!({ "refreshToken": login["refreshToken"] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    let replay: Value = replay.json().await.expect("Failed to parse response");
    assert_eq!(replay["data"]["kind"], "invalid_token");

    // The new access token still works
    let me = app
        .get_authenticated("/api/users/me", body["data"]["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_me_requires_bearer_token() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/api/users/me")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .get_authenticated("/api/users/me", "not-a-jwt")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "invalid_token");
}

#[tokio::test]
async fn test_logout_is_idempotent_and_ends_session() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let login = app.login_ok("alice", "correct-horse").await;
    let access = login["accessToken"].as_str().unwrap();

    let response = app
        .post_authenticated("/api/auth/logout", access)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The access token now names a dead session; ending it again still succeeds
    let again = app
        .post_authenticated("/api/auth/logout", access)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(again.status(), StatusCode::NO_CONTENT);

    let forged = app
        .post_authenticated("/api/auth/logout", "not-a-token")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let me = app
        .get_authenticated("/api/users/me", access)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let refresh = app
        .post("/api/auth/refresh-token")
        .json(&json!({ "refreshToken": login["refreshToken"] }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
    let body: Value = refresh.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "session_expired");
}

#[tokio::test]
async fn test_logout_other_session_forbidden() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let first = app.login_ok("alice", "correct-horse").await;
    let second = app.login_ok("alice", "correct-horse").await;

    let response = app
        .post_authenticated("/api/auth/logout", first["accessToken"].as_str().unwrap())
        .json(&json!({ "sessionId": second["sessionId"] }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_all() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let first = app.login_ok("alice", "correct-horse").await;
    let second = app.login_ok("alice", "correct-horse").await;

    let response = app
        .post_authenticated("/api/auth/logout-all", first["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["revoked"], 2);

    let me = app
        .get_authenticated("/api/users/me", second["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_user_once() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let token = app.last_token(NotificationTemplate::EmailVerification);

    let response = app
        .get("/api/auth/verify-user")
        .query(&[("token", token.as_str())])
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["verified"], true);

    let again = app
        .get("/api/auth/verify-user")
        .query(&[("token", token.as_str())])
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    let body: Value = again.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "verification_already_used");

    let login = app.login_ok("alice", "correct-horse").await;
    assert_eq!(login["user"]["emailVerified"], true);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let before = app.login_ok("alice", "correct-horse").await;

    let response = app
        .post("/api/auth/password-reset/initiate")
        .json(&json!({ "emailOrUsername": "alice@example.com" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let token = app.last_token(NotificationTemplate::PasswordReset);
    let reset = |token: String| {
        app.post("/api/auth/password-reset/reset")
            .json(&json!({ "token": token, "newPassword": "battery-staple" }))
            .send()
    };

    let response = reset(token.clone())
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let reuse = reset(token).await.expect("Failed to execute request");
    assert_eq!(reuse.status(), StatusCode::BAD_REQUEST);
    let body: Value = reuse.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["kind"], "verification_already_used");

    // Existing sessions end with the old password
    let me = app
        .get_authenticated("/api/users/me", before["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        app.login("alice", "correct-horse").await.status(),
        StatusCode::UNAUTHORIZED
    );
    app.login_ok("alice", "battery-staple").await;
}

#[tokio::test]
async fn test_password_reset_for_unknown_account_is_accepted() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/api/auth/password-reset/initiate")
        .json(&json!({ "emailOrUsername": "ghost@example.com" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(app.sent().is_empty());
}

#[tokio::test]
async fn test_invite_flow() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let login = app.login_ok("alice", "correct-horse").await;

    let response = app
        .post_authenticated("/api/auth/invites", login["accessToken"].as_str().unwrap())
        .json(&json!({
            "email": "bob@example.com",
            "website": "https://portal.example.com"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let invite = app
        .sent()
        .into_iter()
        .find(|sent| sent.template == NotificationTemplate::Invite)
        .expect("Invite not sent");
    assert_eq!(invite.recipient, "bob@example.com");
    assert_eq!(invite.payload["invitedBy"], "alice");

    let token = app.last_token(NotificationTemplate::Invite);
    let response = app
        .post("/api/auth/invites/accept")
        .json(&json!({
            "token": token,
            "username": "bob",
            "password": "bobs-password"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["user"]["email"], "bob@example.com");
    assert_eq!(body["data"]["user"]["emailVerified"], true);
    assert_eq!(body["data"]["verificationRequired"], false);

    app.login_ok("bob", "bobs-password").await;
}

#[tokio::test]
async fn test_me_returns_current_user() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let login = app.login_ok("alice", "correct-horse").await;

    let response = app
        .get_authenticated("/api/users/me", login["accessToken"].as_str().unwrap())
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["id"], login["user"]["id"]);
}

#[tokio::test]
async fn test_concurrent_refresh_with_same_token_has_single_winner() {
    let app = TestApp::spawn().await;
    app.register("alice", "correct-horse").await;
    let login = app.login_ok("alice", "correct-horse").await;

    let requests = (0..6).map(|_| {
        app.post("/api/auth/refresh-token")
            .json(&json!({ "refreshToken": login["refreshToken"] }))
            .send()
    });
    let statuses: Vec<StatusCode> = futures::future::join_all(requests)
        .await
        .into_iter()
        .map(|response| response.expect("Failed to execute request").status())
        .collect();

    let winners = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert_eq!(winners, 1, "{:?}", statuses);
    assert!(statuses
        .iter()
        .all(|s| *s == StatusCode::OK || *s == StatusCode::UNAUTHORIZED));
}
