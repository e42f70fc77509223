use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

use crate::domain::DEFAULT_MAX_RESULTS;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub announcements: AnnouncementConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider that issues tokens.
    pub jwt_secret: String,
    pub token_duration_hours: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnnouncementConfig {
    /// Cap applied to every live view.
    pub max_results: usize,
    /// Capacity of the store's change-notification channel. Slow subscribers
    /// that fall further behind than this resynchronise with a full refresh.
    pub change_buffer: usize,
}

/// Placeholder secret shipped in older sample configs. Tokens signed with it
/// are forgeable by anyone, so it is treated like no secret at all.
pub const PLACEHOLDER_JWT_SECRET: &str = "change-me-in-production";

const MIN_JWT_SECRET_LEN: usize = 32;

/// Rejects token secrets that would let anyone mint admin tokens.
pub fn check_jwt_secret(secret: &str) -> Result<(), ConfigError> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(ConfigError::Message(
            "auth.jwt_secret is not set (PORTAL__AUTH__JWT_SECRET)".to_string(),
        ));
    }
    if secret == PLACEHOLDER_JWT_SECRET {
        return Err(ConfigError::Message(
            "auth.jwt_secret is the published placeholder value".to_string(),
        ));
    }
    if secret.len() < MIN_JWT_SECRET_LEN {
        return Err(ConfigError::Message(format!(
            "auth.jwt_secret must be at least {} bytes",
            MIN_JWT_SECRET_LEN
        )));
    }
    Ok(())
}

impl AuthConfig {
    pub fn ensure_secure(&self) -> Result<(), ConfigError> {
        check_jwt_secret(&self.jwt_secret)
    }
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            change_buffer: 256,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://campus-portal.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_duration_hours", 24)?
            .set_default("announcements.max_results", DEFAULT_MAX_RESULTS as i64)?
            .set_default("announcements.change_buffer", 256)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with PORTAL__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("PORTAL").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://campus-portal.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                token_duration_hours: 24,
            },
            announcements: AnnouncementConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_have_no_usable_secret() {
        assert!(Settings::default().auth.ensure_secure().is_err());
    }

    #[test]
    fn test_placeholder_and_short_secrets_rejected() {
        assert!(check_jwt_secret(PLACEHOLDER_JWT_SECRET).is_err());
        assert!(check_jwt_secret("   ").is_err());
        assert!(check_jwt_secret("short-secret").is_err());
    }

    #[test]
    fn test_long_random_secret_accepted() {
        assert!(check_jwt_secret("f3b1c9d27a8e4f60b5d2c7a19e0f4b83").is_ok());
    }
}
