//! Role value object - the closed set of coarse-grained access categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Coarse-grained access category attached to a user profile.
///
/// Roles form a closed set with no hierarchy: access checks are
/// set-membership only, so `Admin` does not imply `Moderator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    Moderator,
    Guest,
}

impl Role {
    /// Returns all roles in the closed set.
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::User, Role::Moderator, Role::Guest]
    }

    /// Returns the canonical string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "guest" => Ok(Role::Guest),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_all_lists_the_closed_set() {
        assert_eq!(Role::all().len(), 4);
        assert!(Role::all().contains(&Role::Admin));
        assert!(Role::all().contains(&Role::Guest));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in Role::all() {
            let parsed: Role = role.as_str().parse().unwrap();
            assert_eq!(parsed, *role);
        }
    }

    #[test]
    fn role_rejects_unknown_string() {
        let result: Result<Role, _> = "superuser".parse();
        assert!(result.is_err());
    }

    #[test]
    fn role_serializes_as_snake_case() {
        let json = serde_json::to_string(&Role::Moderator).unwrap();
        assert_eq!(json, "\"moderator\"");
    }

    #[test]
    fn role_deserializes_from_snake_case() {
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn role_display_matches_canonical_form() {
        assert_eq!(format!("{}", Role::Guest), "guest");
    }
}
