use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::crypto;

/// Test accounts: (username, password, age, credit card number).
pub const TEST_USERS: [(&str, &str, i64, &str); 2] = [
    ("alice", "alice123", 30, "1234567890123456"),
    ("bob", "bob123", 25, "9876543210987654"),
];

/// Opens a pool. An in-memory database lives only as long as its connection,
/// so those get exactly one connection that is never recycled.
pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqlitePoolOptions::new();
    let options = if url.contains(":memory:") {
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options
    };

    options.connect(url).await
}

pub async fn create_users_table(sqlite_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL,
            age INTEGER,
            credit_card_number TEXT
        )",
    )
    .execute(sqlite_pool)
    .await?;

    Ok(())
}

/// Inserts alice and bob unless they already exist. Passwords are stored as
/// MD5 digests: the workshop starts from the vulnerable state.
pub async fn seed_test_users(sqlite_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for (username, password, age, card) in TEST_USERS {
        sqlx::query(
            "INSERT INTO users (username, password, age, credit_card_number)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(username)
        .bind(crypto::hash_md5(password))
        .bind(age)
        .bind(card)
        .execute(sqlite_pool)
        .await?;
    }

    Ok(())
}

/// Like [`seed_test_users`] but also puts back the seeded passwords, undoing
/// any change made through the A02 endpoints.
pub async fn reset_test_users(sqlite_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_users_table(sqlite_pool).await?;

    let mut tx = sqlite_pool.begin().await?;
    for (username, password, age, card) in TEST_USERS {
        sqlx::query(
            "INSERT INTO users (username, password, age, credit_card_number)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (username) DO UPDATE SET
                password = excluded.password,
                age = excluded.age,
                credit_card_number = excluded.credit_card_number",
        )
        .bind(username)
        .bind(crypto::hash_md5(password))
        .bind(age)
        .bind(card)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
}
