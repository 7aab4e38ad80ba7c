//! A03 Injection. Each server owns its database; see [`init_db`].

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::{
    sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool, TypeInfo, ValueRef,
};

use crate::{
    entities::{Account, AccountSummary, LoginRequest, Product, SearchQuery},
    error::ApiError,
    extract::{JsonBody, QueryParams},
};

pub const MAX_CATEGORY_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 10;

const ACCOUNTS: [(i64, &str, &str, &str, &str); 4] = [
    (1, "admin", "admin123", "admin@company.com", "admin"),
    (2, "alice", "alice123", "alice@company.com", "user"),
    (3, "bob", "bob456", "bob@company.com", "user"),
    (4, "charlie", "charlie789", "charlie@company.com", "user"),
];

const PRODUCTS: [(i64, &str, &str, f64, &str); 5] = [
    (1, "Laptop", "electronics", 999.99, "High-performance laptop"),
    (2, "Phone", "electronics", 599.99, "Smartphone with great camera"),
    (3, "Book", "books", 29.99, "Programming guide"),
    (4, "Headphones", "electronics", 199.99, "Noise-canceling headphones"),
    (5, "Tablet", "electronics", 399.99, "Portable tablet device"),
];

const PRODUCT_COLUMNS: [&str; 5] = ["id", "name", "category", "price", "description"];

pub async fn init_db(sqlite_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = sqlite_pool.begin().await?;

    sqlx::query("DROP TABLE IF EXISTS users")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS products")
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL
        )",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "CREATE TABLE products (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            price REAL NOT NULL,
            description TEXT NOT NULL
        )",
    )
    .execute(&mut *tx)
    .await?;

    for (id, username, password, email, role) in ACCOUNTS {
        sqlx::query("INSERT INTO users (id, username, password, email, role) VALUES (?, ?, ?, ?, ?)")
            .bind(id)
            .bind(username)
            .bind(password)
            .bind(email)
            .bind(role)
            .execute(&mut *tx)
            .await?;
    }

    for (id, name, category, price, description) in PRODUCTS {
        sqlx::query(
            "INSERT INTO products (id, name, category, price, description) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(category)
        .bind(price)
        .bind(description)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

fn login_success(account: Account) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("message".into(), json!("Login successful"));
    body.insert("user".into(), json!(AccountSummary::from(account)));
    body
}

/// Reply used when an injected statement fails: the driver's message and the
/// statement itself go back to the caller, which is half the lesson.
fn leaked_error(error: sqlx::Error, sql: String) -> Response {
    tracing::warn!(error = %error, sql = %sql, "injected statement failed");
    Json(json!({ "error": error.to_string(), "query_executed": sql })).into_response()
}

/// Decodes a column by the storage class of the value actually returned, so a
/// UNION that lands text in the `price` column still comes back.
fn loose_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get_unchecked::<i64, _>(index).map(Value::from),
        "REAL" | "NUMERIC" => row.try_get_unchecked::<f64, _>(index).map(|v| json!(v)),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or(Value::Null)
}

fn loose_product(row: &SqliteRow) -> Value {
    let fields: Map<String, Value> = PRODUCT_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| (column.to_string(), loose_value(row, index)))
        .collect();
    Value::Object(fields)
}

pub async fn login(
    Extension(sqlite_pool): Extension<SqlitePool>,
    JsonBody(credentials): JsonBody<LoginRequest>,
) -> Response {
    let sql = format!(
        "SELECT * FROM users WHERE username = '{}' AND password = '{}'",
        credentials.username, credentials.password
    );

    let result = sqlx::query_as::<_, Account>(&sql)
        .fetch_optional(&sqlite_pool)
        .await;

    match result {
        Ok(Some(account)) => {
            let mut body = login_success(account);
            body.insert("query_executed".into(), Value::String(sql));
            Json(Value::Object(body)).into_response()
        }
        Ok(None) => ApiError::Unauthorized("Invalid credentials".into()).into_response(),
        Err(e) => leaked_error(e, sql),
    }
}

pub async fn login_secure(
    Extension(sqlite_pool): Extension<SqlitePool>,
    JsonBody(credentials): JsonBody<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let account: Option<Account> =
        sqlx::query_as("SELECT * FROM users WHERE username = ? AND password = ?")
            .bind(&credentials.username)
            .bind(&credentials.password)
            .fetch_optional(&sqlite_pool)
            .await?;

    match account {
        Some(account) => Ok(Json(Value::Object(login_success(account)))),
        None => {
            tracing::info!(username = %credentials.username, "failed login");
            Err(ApiError::Unauthorized("Invalid credentials".into()))
        }
    }
}

pub async fn search_products(
    Extension(sqlite_pool): Extension<SqlitePool>,
    QueryParams(params): QueryParams<SearchQuery>,
) -> Response {
    let mut sql = String::from("SELECT * FROM products WHERE 1=1");
    if let Some(category) = params.category.filter(|c| !c.is_empty()) {
        sql.push_str(&format!(" AND category = '{category}'"));
    }
    if let Some(name) = params.name.filter(|n| !n.is_empty()) {
        sql.push_str(&format!(" AND name LIKE '%{name}%'"));
    }

    let result = sqlx::query(&sql).fetch_all(&sqlite_pool).await;

    match result {
        Ok(rows) => {
            let products: Vec<Value> = rows.iter().map(loose_product).collect();
            Json(json!({ "products": products, "query_executed": sql })).into_response()
        }
        Err(e) => leaked_error(e, sql),
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub async fn search_products_secure(
    Extension(sqlite_pool): Extension<SqlitePool>,
    QueryParams(params): QueryParams<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let category = params.category.filter(|c| !c.is_empty());
    let name = params.name.filter(|n| !n.is_empty());

    if category
        .as_ref()
        .is_some_and(|c| c.chars().count() > MAX_CATEGORY_LEN)
    {
        return Err(ApiError::BadRequest("Category name too long".into()));
    }
    if name.as_ref().is_some_and(|n| n.chars().count() > MAX_NAME_LEN) {
        return Err(ApiError::BadRequest("Product name too long".into()));
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, name, category, price, description FROM products WHERE 1=1",
    );
    if let Some(category) = category {
        query.push(" AND category = ").push_bind(category);
    }
    if let Some(name) = name {
        query
            .push(" AND name LIKE ")
            .push_bind(format!("%{}%", escape_like(&name)))
            .push(" ESCAPE '\\'");
    }

    let products: Vec<Product> = query.build_query_as().fetch_all(&sqlite_pool).await?;
    Ok(Json(json!({ "products": products })))
}

#[derive(Debug, Deserialize)]
pub struct RawLimit {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Limit {
    pub limit: Option<i64>,
}

pub async fn get_users(
    Extension(sqlite_pool): Extension<SqlitePool>,
    QueryParams(params): QueryParams<RawLimit>,
) -> Response {
    let limit = params.limit.unwrap_or_else(|| DEFAULT_LIMIT.to_string());
    let sql = format!("SELECT id, username, email, role FROM users LIMIT {limit}");

    let result = sqlx::query_as::<_, AccountSummary>(&sql)
        .fetch_all(&sqlite_pool)
        .await;

    match result {
        Ok(users) => Json(json!({ "users": users, "query_executed": sql })).into_response(),
        Err(e) => leaked_error(e, sql),
    }
}

pub async fn get_users_secure(
    Extension(sqlite_pool): Extension<SqlitePool>,
    params: Result<Query<Limit>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::Unprocessable(rejection.body_text()))?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest("Invalid limit parameter".into()));
    }

    let users: Vec<AccountSummary> =
        sqlx::query_as("SELECT id, username, email, role FROM users LIMIT ?")
            .bind(limit)
            .fetch_all(&sqlite_pool)
            .await?;

    Ok(Json(json!({ "users": users })))
}

#[derive(sqlx::FromRow, serde::Serialize)]
struct ColumnInfo {
    name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    kind: String,
}

pub async fn db_schema(
    Extension(sqlite_pool): Extension<SqlitePool>,
) -> Result<Json<Value>, ApiError> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&sqlite_pool)
    .await?;

    let mut schema = Map::new();
    for table in tables {
        let columns: Vec<ColumnInfo> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
                .bind(&table)
                .fetch_all(&sqlite_pool)
                .await?;
        schema.insert(table, json!(columns));
    }

    Ok(Json(json!({ "schema": schema })))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "A03 - Injection (vulnerable)",
        "endpoints": ["/login", "/search", "/users", "/debug/db-schema"]
    }))
}

async fn index_secure() -> Json<Value> {
    Json(json!({
        "message": "A03 - Injection (secure)",
        "endpoints": ["/login", "/search", "/users"]
    }))
}

pub fn vulnerable_router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login))
        .route("/search", get(search_products))
        .route("/users", get(get_users))
        .route("/debug/db-schema", get(db_schema))
}

pub fn secure_router() -> Router {
    Router::new()
        .route("/", get(index_secure))
        .route("/login", post(login_secure))
        .route("/search", get(search_products_secure))
        .route("/users", get(get_users_secure))
}
