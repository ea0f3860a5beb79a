//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Identity endpoint must be an http(s) URL")]
    InvalidEndpoint,

    #[error("Redirect path must start with '/': {0}")]
    InvalidRedirectPath(&'static str),

    #[error("Settle timeout must be between 1 and 60000 milliseconds")]
    InvalidSettleTimeout,
}
