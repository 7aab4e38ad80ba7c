use axum::{
    extract::{Extension, FromRequestParts},
    http::{header, request::Parts},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    config::{Settings, SettingsError},
    crypto, db,
    entities::{LoginRequest, LoginResponse, UserProfile},
    error::ApiError,
    extract::JsonBody,
};

const INVALID_CREDENTIALS: &str = "Invalid authentication credentials";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Signs and checks the bearer tokens every lesson server accepts.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, algorithm: Algorithm, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            ttl,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let ttl = Duration::try_minutes(settings.jwt_expire_minutes)
            .ok_or(SettingsError::Expiry(settings.jwt_expire_minutes))?;

        Ok(Self::new(&settings.jwt_secret, settings.algorithm()?, ttl))
    }

    pub fn issue(&self, username: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| ApiError::Internal(format!("token lifetime {} overflows", self.ttl)))?;
        let claims = Claims {
            sub: username.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(self.algorithm);

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) if !data.claims.sub.is_empty() => Ok(data.claims),
            Ok(_) => Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into())),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                Err(ApiError::Unauthorized("Token expired".into()))
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected bearer token");
                Err(ApiError::Unauthorized(INVALID_CREDENTIALS.into()))
            }
        }
    }
}

/// Identity proven by a valid bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub username: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

        let tokens = parts.extensions.get::<TokenService>().ok_or_else(|| {
            tracing::error!("TokenService extension missing from router");
            ApiError::Unauthorized(INVALID_CREDENTIALS.into())
        })?;

        let claims = tokens.verify(token)?;
        Ok(CurrentUser {
            username: claims.sub,
        })
    }
}

pub async fn find_user(
    sqlite_pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserProfile>, sqlx::Error> {
    sqlx::query_as("SELECT id, username, age FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(sqlite_pool)
        .await
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    username: String,
    age: Option<i64>,
    password: String,
}

/// Checks a username/password pair. Accounts still on MD5 are compared by
/// digest; accounts moved to a PHC hash by the secure A02 endpoint go through
/// the slow verifier.
pub async fn authenticate_user(
    sqlite_pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Option<UserProfile>, ApiError> {
    let row: Option<CredentialRow> =
        sqlx::query_as("SELECT id, username, age, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(sqlite_pool)
            .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let matches = if crypto::is_phc_hash(&row.password) {
        crypto::verify_password(password.to_string(), row.password).await?
    } else {
        crypto::hash_md5(password) == row.password
    };

    Ok(matches.then_some(UserProfile {
        id: row.id,
        username: row.username,
        age: row.age,
    }))
}

pub async fn login(
    Extension(sqlite_pool): Extension<SqlitePool>,
    Extension(tokens): Extension<TokenService>,
    JsonBody(credentials): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = authenticate_user(&sqlite_pool, &credentials.username, &credentials.password)
        .await?
        .ok_or_else(|| {
            tracing::info!(username = %credentials.username, "failed login");
            ApiError::Unauthorized("Invalid username or password".into())
        })?;

    let access_token = tokens.issue(&user.username)?;
    tracing::info!(username = %user.username, "issued access token");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".into(),
        username: user.username,
    }))
}

pub async fn me(
    Extension(sqlite_pool): Extension<SqlitePool>,
    current_user: CurrentUser,
) -> Result<Json<UserProfile>, ApiError> {
    find_user(&sqlite_pool, &current_user.username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

pub async fn setup(Extension(sqlite_pool): Extension<SqlitePool>) -> Result<Json<Value>, ApiError> {
    db::reset_test_users(&sqlite_pool).await?;
    Ok(Json(json!({ "message": "Test users created successfully" })))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "OWASP Authentication Server",
        "endpoints": {
            "/login": "POST - Login with username/password",
            "/me": "GET - Get current user info (requires auth)",
            "/setup": "POST - Create test users alice and bob"
        },
        "test_users": {
            "alice": "password: alice123",
            "bob": "password: bob123"
        }
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/setup", post(setup))
}
