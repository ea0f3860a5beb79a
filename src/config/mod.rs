//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment
//! variables using the `config` and `dotenvy` crates. Configuration is
//! loaded with the `GATEWARDEN` prefix and nested values use double
//! underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use gatewarden::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod error;
mod guard;

pub use auth::AuthConfig;
pub use error::{ConfigError, ValidationError};
pub use guard::GuardConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Authentication configuration (Firebase Identity Toolkit)
    pub auth: AuthConfig,

    /// Route guard configuration
    #[serde(default)]
    pub guard: GuardConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `GATEWARDEN` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `GATEWARDEN__AUTH__API_KEY=AIza...` -> `auth.api_key`
    /// - `GATEWARDEN__GUARD__LOGIN_PATH=/signin` -> `guard.login_path`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("GATEWARDEN")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.auth.validate()?;
        self.guard.validate()?;
        Ok(())
    }
}
