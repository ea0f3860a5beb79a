//! Authentication configuration (Firebase)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

fn default_endpoint() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

/// Authentication configuration (Firebase Identity Toolkit)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Web API key of the Firebase project
    pub api_key: SecretString,

    /// Firebase project id (used for log context, not requests)
    pub project_id: String,

    /// Identity Toolkit endpoint; override for the local emulator
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl AuthConfig {
    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("GATEWARDEN__AUTH__API_KEY"));
        }
        if self.project_id.is_empty() {
            return Err(ValidationError::MissingRequired(
                "GATEWARDEN__AUTH__PROJECT_ID",
            ));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ValidationError::InvalidEndpoint);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        AuthConfig {
            api_key: SecretString::new("AIza-test".to_string()),
            project_id: "gatewarden-test".to_string(),
            endpoint: default_endpoint(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let config = AuthConfig {
            api_key: SecretString::new(String::new()),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let config = AuthConfig {
            endpoint: "ftp://example.com".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidEndpoint)
        ));
    }

    #[test]
    fn emulator_endpoint_is_accepted() {
        let config = AuthConfig {
            endpoint: "http://localhost:9099/identitytoolkit.googleapis.com/v1".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn api_key_is_not_printed_by_debug() {
        let config = valid_config();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("AIza-test"));
    }
}
