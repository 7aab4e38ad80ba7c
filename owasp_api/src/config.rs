use std::str::FromStr;

use config::{Config, Environment, File};
use jsonwebtoken::Algorithm;
use serde::Deserialize;

/// Upper bound on token lifetime: one year.
pub const MAX_EXPIRE_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("unsupported jwt_algorithm {0:?}: only HS256, HS384 and HS512 are accepted")]
    Algorithm(String),

    #[error("jwt_expire_minutes must be between 1 and {MAX_EXPIRE_MINUTES}, got {0}")]
    Expiry(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database_url: String,
    /// Both injection lessons drop and recreate their tables on start, so
    /// each gets a database of its own.
    pub injection_database_url: String,
    pub injection_secure_database_url: String,
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub jwt_expire_minutes: i64,
    pub host: String,
}

impl Settings {
    /// Defaults, then an optional `workshop.toml`, then `WORKSHOP_*` env vars.
    pub fn load() -> Result<Self, SettingsError> {
        let config = Config::builder()
            .set_default("database_url", "sqlite://workshop.db?mode=rwc")?
            .set_default("injection_database_url", "sqlite://injection.db?mode=rwc")?
            .set_default(
                "injection_secure_database_url",
                "sqlite://injection_secure.db?mode=rwc",
            )?
            .set_default("jwt_secret", "your-super-secret-jwt-key")?
            .set_default("jwt_algorithm", "HS256")?
            .set_default("jwt_expire_minutes", 30_i64)?
            .set_default("host", "0.0.0.0")?
            .add_source(File::with_name("workshop").required(false))
            .add_source(Environment::with_prefix("WORKSHOP").try_parsing(true))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.algorithm()?;
        if !(1..=MAX_EXPIRE_MINUTES).contains(&self.jwt_expire_minutes) {
            return Err(SettingsError::Expiry(self.jwt_expire_minutes));
        }
        Ok(())
    }

    /// Tokens are signed with a shared secret, so only the HMAC family applies.
    pub fn algorithm(&self) -> Result<Algorithm, SettingsError> {
        match Algorithm::from_str(&self.jwt_algorithm) {
            Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
            _ => Err(SettingsError::Algorithm(self.jwt_algorithm.clone())),
        }
    }
}
