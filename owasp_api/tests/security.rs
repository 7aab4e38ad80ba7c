mod common;

use serde_json::{json, Value};
use sqlx::SqlitePool;
use tokio::net::TcpListener;

use owasp_api::{build_router, db, entities::LoginResponse, prepare, Lesson};

async fn spawn(lesson: Lesson, pool: &SqlitePool) -> String {
    let app = build_router(lesson, pool.clone(), common::tokens());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("{lesson:?} server error: {e:?}");
        }
    });

    format!("http://{addr}")
}

/// The whole A01 walkthrough over real sockets: log in on the auth server,
/// then use alice's token to ask both profile servers for bob.
#[tokio::test]
async fn test_security() {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    prepare(Lesson::Auth, &pool).await.unwrap();

    let auth = spawn(Lesson::Auth, &pool).await;
    let vulnerable = spawn(Lesson::AccessControl, &pool).await;
    let secure = spawn(Lesson::AccessControlSecure, &pool).await;

    let client = reqwest::Client::new();

    let response = client
        .post(format!("{auth}/login"))
        .json(&json!({ "username": "alice", "password": "alice123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let login: LoginResponse = response.json().await.unwrap();

    // broken access control: alice reads bob's profile
    let response = client
        .get(format!("{vulnerable}/profile"))
        .query(&[("username", "bob")])
        .bearer_auth(&login.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let profile: Value = response.json().await.unwrap();
    assert_eq!(profile["username"], "bob");

    let response = client
        .get(format!("{secure}/profile"))
        .query(&[("username", "bob")])
        .bearer_auth(&login.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{secure}/profile"))
        .query(&[("username", "alice")])
        .bearer_auth(&login.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // no token at all
    let response = client
        .get(format!("{vulnerable}/profile?username=bob"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");
}
