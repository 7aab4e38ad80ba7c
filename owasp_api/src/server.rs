use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    access_control, authentication, authentication::TokenService, config::Settings,
    crypto_failure, db, injection,
};

/// One runnable workshop server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Lesson {
    /// Token issuing server
    Auth,
    #[value(name = "a01")]
    AccessControl,
    #[value(name = "a01-secure")]
    AccessControlSecure,
    #[value(name = "a02")]
    CryptoFailure,
    #[value(name = "a02-secure")]
    CryptoFailureSecure,
    #[value(name = "a03")]
    Injection,
    #[value(name = "a03-secure")]
    InjectionSecure,
}

impl Lesson {
    pub fn default_port(self) -> u16 {
        match self {
            Lesson::Auth => 8000,
            Lesson::AccessControl => 8001,
            Lesson::AccessControlSecure => 8002,
            Lesson::CryptoFailure => 8003,
            Lesson::CryptoFailureSecure => 8004,
            Lesson::Injection => 8005,
            Lesson::InjectionSecure => 8006,
        }
    }

    pub fn is_injection(self) -> bool {
        matches!(self, Lesson::Injection | Lesson::InjectionSecure)
    }

    /// The two injection servers reset their tables on start, so neither
    /// shares a database with anything else.
    pub fn database_url(self, settings: &Settings) -> &str {
        match self {
            Lesson::Injection => &settings.injection_database_url,
            Lesson::InjectionSecure => &settings.injection_secure_database_url,
            _ => &settings.database_url,
        }
    }

    fn routes(self) -> Router {
        match self {
            Lesson::Auth => authentication::router(),
            Lesson::AccessControl => access_control::vulnerable_router(),
            Lesson::AccessControlSecure => access_control::secure_router(),
            Lesson::CryptoFailure => crypto_failure::vulnerable_router(),
            Lesson::CryptoFailureSecure => crypto_failure::secure_router(),
            Lesson::Injection => injection::vulnerable_router(),
            Lesson::InjectionSecure => injection::secure_router(),
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

pub fn build_router(lesson: Lesson, sqlite_pool: SqlitePool, tokens: TokenService) -> Router {
    lesson
        .routes()
        .fallback(not_found)
        .layer(Extension(sqlite_pool))
        .layer(Extension(tokens))
        .layer(TraceLayer::new_for_http())
}

/// Creates whatever tables the lesson reads. The injection lesson starts from
/// a fresh copy of its data every time.
pub async fn prepare(lesson: Lesson, sqlite_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    if lesson.is_injection() {
        injection::init_db(sqlite_pool).await
    } else {
        db::create_users_table(sqlite_pool).await?;
        db::seed_test_users(sqlite_pool).await
    }
}

/// Connects to the lesson's configured database and prepares it.
pub async fn open_database(lesson: Lesson, settings: &Settings) -> Result<SqlitePool, sqlx::Error> {
    let sqlite_pool = db::connect(lesson.database_url(settings)).await?;
    prepare(lesson, &sqlite_pool).await?;
    Ok(sqlite_pool)
}

pub async fn run(lesson: Lesson, port: Option<u16>, settings: &Settings) -> anyhow::Result<()> {
    let tokens = TokenService::from_settings(settings)?;
    let sqlite_pool = open_database(lesson, settings).await?;
    let app = build_router(lesson, sqlite_pool, tokens);

    let port = port.unwrap_or(lesson.default_port());
    let listener = TcpListener::bind((settings.host.as_str(), port)).await?;

    tracing::info!(?lesson, addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
