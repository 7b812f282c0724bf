//! API configuration

use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// API configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApiConfig {
    /// Server host
    #[validate(length(min = 1))]
    pub host: String,
    /// Server port
    #[validate(range(min = 1))]
    pub port: u16,
    /// JWT secret for authentication
    #[validate(length(min = 16, message = "jwt_secret must be at least 16 characters"))]
    pub jwt_secret: String,
    /// JWT expiration in seconds
    #[validate(range(min = 60))]
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    /// Seed a demo request into the in-memory request store at startup
    pub seed_demo: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            seed_demo: false,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_`-prefixed environment variables
    ///
    /// Unset variables keep their default value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config: ApiConfig = config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs as i64)?
            .set_default("log_level", defaults.log_level)?
            .set_default("seed_demo", defaults.seed_demo)?
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let config = ApiConfig {
            jwt_secret: "short".to_string(),
            ..ApiConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("jwt_secret"));
    }
}
