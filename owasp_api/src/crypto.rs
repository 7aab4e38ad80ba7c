//! Password storage primitives for both halves of the A02 lesson.

use md5::{Digest, Md5};

use crate::error::ApiError;

/// Unsalted MD5 hex digest. Identical passwords give identical digests and the
/// function is fast enough to brute force.
pub fn hash_md5(password: &str) -> String {
    format!("{:x}", Md5::digest(password.as_bytes()))
}

/// Whether `stored` is a self-describing PHC string rather than a bare digest.
pub fn is_phc_hash(stored: &str) -> bool {
    stored.starts_with('$')
}

/// Salted Argon2 hash in PHC format.
// `password_auth::generate_hash()` is deliberately slow, keep it off the runtime threads
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    let hash = tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;
    Ok(hash)
}

pub async fn verify_password(password: String, stored: String) -> Result<bool, ApiError> {
    let matches = tokio::task::spawn_blocking(move || {
        password_auth::verify_password(password, &stored).is_ok()
    })
    .await?;
    Ok(matches)
}
