//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub cors_origin: String,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Relay
    pub relay_require_auth: bool,
    pub relay_ping_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            cors_origin: env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                // Signing key must be strong enough for HS256
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Relay
            relay_require_auth: env::var("RELAY_REQUIRE_AUTH")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            relay_ping_interval_secs: {
                let secs = env::var("RELAY_PING_INTERVAL_SECS")
                    .unwrap_or_else(|_| "25".to_string())
                    .parse()
                    .unwrap_or(25);
                if secs == 0 {
                    return Err(ConfigError::Invalid(
                        "RELAY_PING_INTERVAL_SECS must be greater than zero",
                    ));
                }
                secs
            },
        })
    }

    /// Defaults for everything except the signing secret
    pub fn with_jwt_secret(secret: impl Into<String>) -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            jwt_secret: secret.into(),
            jwt_expiry_hours: 24,
            relay_require_auth: false,
            relay_ping_interval_secs: 25,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}
