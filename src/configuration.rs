use std::time::Duration;

use secrecy::{ExposeSecret, Secret};

use crate::auth::DEFAULT_HASH_COST;
use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
}

/// Which user store backend the server runs against
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_store")]
    pub store: StoreKind,
    /// bcrypt work factor, fixed for the lifetime of the process
    #[serde(default = "default_hash_cost")]
    pub password_hash_cost: u32,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    /// Upper bound for a single store call
    #[serde(default = "default_timeout_milliseconds")]
    pub timeout_milliseconds: u64,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> Secret<String> {
        Secret::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name
        ))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    /// No default; must come from the environment or a local file
    #[serde(default = "missing_secret")]
    pub secret: Secret<String>,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64, // seconds (900 = 15 minutes)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64, // seconds (259200 = 72 hours)
}

impl JwtSettings {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Secret::new(secret.into()),
            access_token_expiry: default_access_token_expiry(),
            refresh_token_expiry: default_refresh_token_expiry(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.access_token_expiry <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expiry must be positive".to_string(),
            ));
        }
        if self.refresh_token_expiry > MAX_TOKEN_EXPIRY {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.refresh_token_expiry must not exceed {} seconds",
                MAX_TOKEN_EXPIRY
            )));
        }
        if self.refresh_token_expiry <= self.access_token_expiry {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expiry must exceed jwt.access_token_expiry".to_string(),
            ));
        }
        Ok(())
    }
}

/// Longest accepted token lifetime in seconds (one year)
pub const MAX_TOKEN_EXPIRY: i64 = 365 * 24 * 60 * 60;

fn missing_secret() -> Secret<String> {
    Secret::new(String::new())
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_store() -> StoreKind {
    StoreKind::Postgres
}

fn default_hash_cost() -> u32 {
    DEFAULT_HASH_COST
}

fn default_timeout_milliseconds() -> u64 {
    5000
}

fn default_access_token_expiry() -> i64 {
    15 * 60
}

fn default_refresh_token_expiry() -> i64 {
    72 * 60 * 60
}

/// Load settings from an optional `configuration` file, then `APP_*`
/// environment variables (`APP_JWT__SECRET`, `APP_APPLICATION__PORT`, ...).
///
/// A missing or empty signing secret is reported here so startup fails
/// before the server binds.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    settings_from(settings)
}

fn settings_from(source: config::Config) -> Result<Settings, ConfigError> {
    let settings = source
        .try_deserialize::<Settings>()
        .map_err(|e| match e {
            config::ConfigError::NotFound(key) => ConfigError::MissingRequired(key),
            other => ConfigError::InvalidValue(other.to_string()),
        })?;

    settings.jwt.validate()?;
    Ok(settings)
}
