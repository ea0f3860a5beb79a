//! Route guard configuration

use std::time::Duration;

use serde::Deserialize;

use super::error::ValidationError;
use crate::guards::GuardPolicy;

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_post_login_path() -> String {
    "/dashboard".to_string()
}

fn default_unauthorized_path() -> String {
    "/unauthorized".to_string()
}

fn default_settle_timeout_ms() -> u64 {
    5_000
}

/// Route guard configuration (redirect targets and settle bound)
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    /// Where unauthenticated navigations are redirected
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Where authenticated users land when hitting anonymous-only routes
    #[serde(default = "default_post_login_path")]
    pub post_login_path: String,

    /// Where authenticated-but-insufficient navigations are redirected
    #[serde(default = "default_unauthorized_path")]
    pub unauthorized_path: String,

    /// Upper bound in milliseconds on waiting for the session to settle
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

impl GuardConfig {
    /// Get the settle timeout as Duration
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    /// Build the policy object guards consume
    pub fn policy(&self) -> GuardPolicy {
        GuardPolicy {
            login_path: self.login_path.clone(),
            post_login_path: self.post_login_path.clone(),
            unauthorized_path: self.unauthorized_path.clone(),
            settle_timeout: self.settle_timeout(),
        }
    }

    /// Validate guard configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.login_path.starts_with('/') {
            return Err(ValidationError::InvalidRedirectPath("login_path"));
        }
        if !self.post_login_path.starts_with('/') {
            return Err(ValidationError::InvalidRedirectPath("post_login_path"));
        }
        if !self.unauthorized_path.starts_with('/') {
            return Err(ValidationError::InvalidRedirectPath("unauthorized_path"));
        }
        if self.settle_timeout_ms == 0 || self.settle_timeout_ms > 60_000 {
            return Err(ValidationError::InvalidSettleTimeout);
        }
        Ok(())
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            post_login_path: default_post_login_path(),
            unauthorized_path: default_unauthorized_path(),
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GuardConfig::default().validate().is_ok());
    }

    #[test]
    fn relative_redirect_path_is_rejected() {
        let config = GuardConfig {
            login_path: "login".to_string(),
            ..GuardConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidRedirectPath("login_path"))
        ));
    }

    #[test]
    fn zero_settle_timeout_is_rejected() {
        let config = GuardConfig {
            settle_timeout_ms: 0,
            ..GuardConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidSettleTimeout)
        ));
    }

    #[test]
    fn policy_carries_paths_and_timeout() {
        let config = GuardConfig {
            settle_timeout_ms: 250,
            ..GuardConfig::default()
        };
        let policy = config.policy();
        assert_eq!(policy.login_path, "/login");
        assert_eq!(policy.settle_timeout, Duration::from_millis(250));
    }
}
