//! A01 Broken Access Control: `/profile` with and without an ownership check.

use axum::{
    extract::Extension,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    authentication::{find_user, CurrentUser},
    entities::{ProfileQuery, UserProfile},
    error::ApiError,
    extract::QueryParams,
};

async fn lookup(sqlite_pool: &SqlitePool, username: &str) -> Result<Json<UserProfile>, ApiError> {
    find_user(sqlite_pool, username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

pub async fn get_profile(
    Extension(sqlite_pool): Extension<SqlitePool>,
    current_user: CurrentUser,
    QueryParams(params): QueryParams<ProfileQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    if params.username != current_user.username {
        tracing::debug!(
            requester = %current_user.username,
            requested = %params.username,
            "serving another user's profile"
        );
    }

    // trusts the query parameter, not the token
    lookup(&sqlite_pool, &params.username).await
}

pub async fn get_profile_secure(
    Extension(sqlite_pool): Extension<SqlitePool>,
    current_user: CurrentUser,
    QueryParams(params): QueryParams<ProfileQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    if params.username != current_user.username {
        tracing::warn!(
            requester = %current_user.username,
            requested = %params.username,
            "cross-user profile access denied"
        );
        return Err(ApiError::Forbidden(
            "Access denied: You can only access your own profile".into(),
        ));
    }

    lookup(&sqlite_pool, &current_user.username).await
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "OWASP A01 - Broken Access Control (vulnerable)",
        "vulnerability": "Users can read other users' profiles by changing the username parameter",
        "endpoints": {
            "/profile": "GET - Requires authentication, trusts the username query parameter"
        }
    }))
}

async fn index_secure() -> Json<Value> {
    Json(json!({
        "message": "OWASP A01 - Broken Access Control (secure)",
        "security": "Users can only access their own profile data",
        "improvements": [
            "Validates user authorization before data access",
            "Returns 403 Forbidden for unauthorized access attempts",
            "Uses authenticated user data instead of query parameters"
        ]
    }))
}

pub fn vulnerable_router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/profile", get(get_profile))
}

pub fn secure_router() -> Router {
    Router::new()
        .route("/", get(index_secure))
        .route("/profile", get(get_profile_secure))
}
