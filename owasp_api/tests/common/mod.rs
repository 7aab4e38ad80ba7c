#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Duration;
use jsonwebtoken::Algorithm;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt; // for oneshot

use owasp_api::{authentication::TokenService, build_router, db, prepare, Lesson};

pub const SECRET: &str = "test-secret";

pub fn tokens() -> TokenService {
    TokenService::new(SECRET, Algorithm::HS256, Duration::minutes(30))
}

pub fn bearer(username: &str) -> String {
    format!("Bearer {}", tokens().issue(username).unwrap())
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
}

/// Router over a private in-memory database prepared for the lesson.
pub async fn app(lesson: Lesson) -> TestApp {
    let pool = db::connect("sqlite::memory:").await.unwrap();
    prepare(lesson, &pool).await.unwrap();
    TestApp {
        router: build_router(lesson, pool.clone(), tokens()),
        pool,
    }
}

/// Another lesson's router over the same database.
pub fn sibling(lesson: Lesson, pool: &SqlitePool) -> Router {
    build_router(lesson, pool.clone(), tokens())
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::String(
            String::from_utf8_lossy(&body).into_owned(),
        ))
    };
    (status, json)
}

pub fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, authorization: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}
