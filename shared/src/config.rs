use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_STORE_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "atrium";
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SOCKET_IDLE_TIMEOUT_MS: u64 = 45_000;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEFAULT_ADMIN_NAME: &str = "Administrator";

pub const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;

/// Connection settings for the credential store. Pool options given in the
/// connection string itself take precedence over these values.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub uri: String,
    pub database: String,
    pub max_pool_size: u32,
    pub server_selection_timeout_ms: u64,
    pub socket_idle_timeout_ms: u64,
}

impl StoreSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            uri: get("MONGODB_URI").unwrap_or_else(|| DEFAULT_STORE_URI.to_string()),
            database: get("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            max_pool_size: parse_number(&get, "STORE_MAX_POOL_SIZE", DEFAULT_MAX_POOL_SIZE)?,
            server_selection_timeout_ms: parse_number(
                &get,
                "STORE_SERVER_SELECTION_TIMEOUT_MS",
                DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
            )?,
            socket_idle_timeout_ms: parse_number(
                &get,
                "STORE_SOCKET_IDLE_TIMEOUT_MS",
                DEFAULT_SOCKET_IDLE_TIMEOUT_MS,
            )?,
        })
    }
}

/// Target admin identity for the bootstrap and diagnostic entry points.
/// The password has no built-in default anywhere; the development example
/// value lives in .env.example only. Under APP_ENV=production every value
/// must be supplied explicitly.
#[derive(Debug, Clone)]
pub struct AdminSettings {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl AdminSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let production = get("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let email = match get("ADMIN_EMAIL") {
            Some(value) if !value.trim().is_empty() => value,
            Some(_) | None if production => {
                return Err(ConfigError::MissingInProduction("ADMIN_EMAIL"))
            }
            _ => DEFAULT_ADMIN_EMAIL.to_string(),
        };
        let name = match get("ADMIN_NAME") {
            Some(value) if !value.trim().is_empty() => value,
            Some(_) | None if production => {
                return Err(ConfigError::MissingInProduction("ADMIN_NAME"))
            }
            _ => DEFAULT_ADMIN_NAME.to_string(),
        };
        let password = match get("ADMIN_PASSWORD") {
            Some(value) if !value.trim().is_empty() => value,
            _ => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
        };

        Ok(Self {
            email,
            password,
            name,
        })
    }
}

/// Session-token signing settings for the auth layer.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub secret: String,
    pub ttl_secs: i64,
}

impl SessionSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let secret = match get("SESSION_SECRET") {
            Some(value) if !value.trim().is_empty() => value,
            _ => return Err(ConfigError::Missing("SESSION_SECRET")),
        };
        Ok(Self {
            secret,
            ttl_secs: parse_number(&get, "SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
        })
    }
}

fn parse_number<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key, raw)),
        None => Ok(default),
    }
}
