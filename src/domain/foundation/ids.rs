//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// User identifier issued by the identity provider.
///
/// Provider uids are opaque strings (Firebase `localId`); the only
/// invariant enforced here is non-emptiness.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_non_empty_string() {
        let id = UserId::new("firebase-uid-123").unwrap();
        assert_eq!(id.as_str(), "firebase-uid-123");
    }

    #[test]
    fn user_id_rejects_empty_string() {
        let result = UserId::new("");
        assert!(result.is_err());
    }

    #[test]
    fn user_id_displays_inner_value() {
        let id = UserId::new("user-456").unwrap();
        assert_eq!(format!("{}", id), "user-456");
    }

    #[test]
    fn user_id_serializes_transparently() {
        let id = UserId::new("user-789").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"user-789\"");
    }

    #[test]
    fn user_id_deserializes_from_plain_string() {
        let id: UserId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.as_str(), "abc");
    }
}
