mod common;

use axum::http::StatusCode;
use owasp_api::Lesson;

use common::{app, bearer, get, send, sibling};

#[tokio::test]
async fn vulnerable_rejects_missing_token() {
    let app = app(Lesson::AccessControl).await;

    let (status, body) = send(&app.router, get("/profile?username=alice", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Not authenticated");
}

#[tokio::test]
async fn vulnerable_allows_cross_user_access() {
    let app = app(Lesson::AccessControl).await;
    let alice = bearer("alice");

    let (status, body) = send(&app.router, get("/profile?username=bob", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "bob");
    assert_eq!(body["age"], 25);
}

#[tokio::test]
async fn secure_blocks_cross_user_access() {
    let app = app(Lesson::AccessControlSecure).await;
    let alice = bearer("alice");

    let (status, body) = send(&app.router, get("/profile?username=bob", Some(&alice))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["detail"].as_str().unwrap().contains("Access denied"));
}

#[tokio::test]
async fn secure_allows_own_profile() {
    let app = app(Lesson::AccessControlSecure).await;
    let alice = bearer("alice");

    let (status, body) = send(&app.router, get("/profile?username=alice", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["age"], 30);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn vulnerable_user_not_found() {
    let app = app(Lesson::AccessControl).await;
    let alice = bearer("alice");

    let (status, body) = send(
        &app.router,
        get("/profile?username=nonexistent", Some(&alice)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "User not found");
}

#[tokio::test]
async fn secure_user_not_found_for_deleted_account() {
    let app = app(Lesson::AccessControlSecure).await;
    sqlx::query("DELETE FROM users WHERE username = 'alice'")
        .execute(&app.pool)
        .await
        .unwrap();
    let alice = bearer("alice");

    let (status, body) = send(&app.router, get("/profile?username=alice", Some(&alice))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "User not found");
}

#[tokio::test]
async fn invalid_token_rejected_by_both() {
    for lesson in [Lesson::AccessControl, Lesson::AccessControlSecure] {
        let app = app(lesson).await;

        let (status, _) = send(
            &app.router,
            get("/profile?username=alice", Some("Bearer invalid-token")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{lesson:?}");
    }
}

#[tokio::test]
async fn missing_username_parameter_is_bad_request() {
    let app = app(Lesson::AccessControlSecure).await;
    let alice = bearer("alice");

    let vulnerable = sibling(Lesson::AccessControl, &app.pool);
    for router in [&app.router, &vulnerable] {
        let (status, body) = send(router, get("/profile", Some(&alice))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("username"));
    }
}
