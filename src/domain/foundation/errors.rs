//! Error types for the domain layer.
//!
//! `AuthError` is the closed taxonomy of authentication failures surfaced
//! to callers and stored on the session as `last_error`. Provider-specific
//! codes are mapped into this set at the adapter boundary; codes outside
//! the taxonomy carry the raw message in `Unknown` for diagnostics without
//! widening the set.

use thiserror::Error;

use super::UserId;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Classified authentication failure.
///
/// The display strings are the stable, user-displayable messages; callers
/// (UI) decide presentation but never see raw provider codes except
/// through `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No account exists for the supplied email address.
    #[error("No account found with this email address")]
    AccountNotFound,

    /// The password does not match the account.
    #[error("Incorrect password")]
    WrongPassword,

    /// The supplied credential (OAuth token, expired session) was rejected.
    #[error("The supplied credential is invalid or has expired")]
    InvalidCredential,

    /// Registration attempted with an email that already has an account.
    #[error("An account already exists with this email address")]
    EmailAlreadyInUse,

    /// The password does not meet the provider's strength requirements.
    #[error("Password is too weak")]
    WeakPassword,

    /// The email address is not syntactically valid.
    #[error("The email address is badly formatted")]
    InvalidEmail,

    /// The provider is rate limiting this account or device.
    #[error("Too many attempts, try again later")]
    TooManyAttempts,

    /// The user dismissed the OAuth consent flow before completing it.
    #[error("The sign-in popup was closed before completing")]
    PopupClosedByUser,

    /// An operation requiring a live provider session was called without one.
    #[error("No user is currently signed in")]
    NoActiveSession,

    /// The provider could not be reached at all.
    #[error("Identity provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// Any provider code outside the taxonomy, carrying the raw message.
    #[error("Authentication failed: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Returns true when the failure is attributable to the submitted
    /// credentials and resubmitting corrected input may succeed.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthError::AccountNotFound
                | AuthError::WrongPassword
                | AuthError::InvalidCredential
                | AuthError::InvalidEmail
        )
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::TooManyAttempts | AuthError::ProviderUnreachable(_)
        )
    }
}

/// Errors from the profile document store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store is unreachable or rejected the request.
    #[error("Profile store unavailable: {0}")]
    Unavailable(String),

    /// A partial update targeted a record that does not exist.
    #[error("No profile record for user {0}")]
    NotFound(UserId),

    /// A stored record could not be decoded into a profile.
    #[error("Profile record malformed: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("user_id");
        assert_eq!(format!("{}", err), "Field 'user_id' cannot be empty");
    }

    #[test]
    fn validation_error_invalid_format_displays_correctly() {
        let err = ValidationError::invalid_format("role", "unknown role 'superuser'");
        assert_eq!(
            format!("{}", err),
            "Field 'role' has invalid format: unknown role 'superuser'"
        );
    }

    #[test]
    fn auth_error_messages_are_stable() {
        assert_eq!(
            format!("{}", AuthError::AccountNotFound),
            "No account found with this email address"
        );
        assert_eq!(format!("{}", AuthError::WrongPassword), "Incorrect password");
        assert_eq!(
            format!("{}", AuthError::EmailAlreadyInUse),
            "An account already exists with this email address"
        );
        assert_eq!(
            format!("{}", AuthError::NoActiveSession),
            "No user is currently signed in"
        );
    }

    #[test]
    fn auth_error_unknown_carries_raw_message() {
        let err = AuthError::Unknown("QUOTA_EXCEEDED".to_string());
        assert_eq!(format!("{}", err), "Authentication failed: QUOTA_EXCEEDED");
    }

    #[test]
    fn auth_error_credential_failures_are_classified() {
        assert!(AuthError::WrongPassword.is_credential_failure());
        assert!(AuthError::AccountNotFound.is_credential_failure());
        assert!(AuthError::InvalidEmail.is_credential_failure());
        assert!(!AuthError::TooManyAttempts.is_credential_failure());
        assert!(!AuthError::NoActiveSession.is_credential_failure());
    }

    #[test]
    fn auth_error_is_transient_for_rate_limit_and_network() {
        assert!(AuthError::TooManyAttempts.is_transient());
        assert!(AuthError::ProviderUnreachable("timeout".to_string()).is_transient());
        assert!(!AuthError::WrongPassword.is_transient());
    }

    #[test]
    fn store_error_not_found_names_the_user() {
        let uid = UserId::new("user-123").unwrap();
        let err = StoreError::NotFound(uid);
        assert_eq!(format!("{}", err), "No profile record for user user-123");
    }
}
