use axum::{
    extract::Extension,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    authentication::CurrentUser,
    crypto,
    entities::{ChangePasswordRequest, PasswordGuess, StoredCredential},
    error::ApiError,
    extract::JsonBody,
};

async fn store_password(
    sqlite_pool: &SqlitePool,
    username: &str,
    password_hash: &str,
) -> Result<(), ApiError> {
    let result = sqlx::query("UPDATE users SET password = ? WHERE username = ?")
        .bind(password_hash)
        .bind(username)
        .execute(sqlite_pool)
        .await?;

    if result.rows_affected() > 0 {
        tracing::info!(username, "password changed");
        Ok(())
    } else {
        Err(ApiError::BadRequest("User not found".into()))
    }
}

pub async fn change_password(
    Extension(sqlite_pool): Extension<SqlitePool>,
    current_user: CurrentUser,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let password_hash = crypto::hash_md5(&request.new_password);
    store_password(&sqlite_pool, &current_user.username, &password_hash).await?;

    Ok(Json(json!({ "message": "Password changed (MD5)" })))
}

pub async fn change_password_secure(
    Extension(sqlite_pool): Extension<SqlitePool>,
    current_user: CurrentUser,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let password_hash = crypto::hash_password(request.new_password).await?;
    store_password(&sqlite_pool, &current_user.username, &password_hash).await?;

    Ok(Json(json!({ "message": "Password changed (argon2)" })))
}

pub async fn all_data(Extension(sqlite_pool): Extension<SqlitePool>) -> Result<Json<Value>, ApiError> {
    let users: Vec<StoredCredential> =
        sqlx::query_as("SELECT username, password, credit_card_number FROM users ORDER BY id")
            .fetch_all(&sqlite_pool)
            .await?;

    Ok(Json(json!({ "users": users })))
}

/// Digest the guess once and match it against every stored value. Works only
/// because the digest is unsalted.
pub async fn exploit_passwords(
    Extension(sqlite_pool): Extension<SqlitePool>,
    JsonBody(guess): JsonBody<PasswordGuess>,
) -> Result<Json<Value>, ApiError> {
    let hash = crypto::hash_md5(&guess.password);
    let users: Vec<String> =
        sqlx::query_scalar("SELECT username FROM users WHERE password = ? ORDER BY id")
            .bind(&hash)
            .fetch_all(&sqlite_pool)
            .await?;

    Ok(Json(json!({ "hash": hash, "users": users })))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "A02 - Cryptographic Failure (vulnerable)",
        "endpoints": ["/change-password", "/all-data", "/exploit-passwords"]
    }))
}

async fn index_secure() -> Json<Value> {
    Json(json!({
        "message": "A02 - Cryptographic Failure (secure)",
        "endpoints": ["/change-password", "/all-data"]
    }))
}

pub fn vulnerable_router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/change-password", post(change_password))
        .route("/all-data", get(all_data))
        .route("/exploit-passwords", post(exploit_passwords))
}

pub fn secure_router() -> Router {
    Router::new()
        .route("/", get(index_secure))
        .route("/change-password", post(change_password_secure))
        .route("/all-data", get(all_data))
}
