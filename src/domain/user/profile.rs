//! Persisted user profile record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Role, Timestamp, UserId};
use crate::domain::session::ProviderIdentity;

/// Role set granted on first login: every account starts as a `user`.
pub fn default_roles() -> BTreeSet<Role> {
    BTreeSet::from([Role::User])
}

/// Permission set granted on first login.
pub fn default_permissions() -> BTreeSet<String> {
    BTreeSet::from(["read".to_string()])
}

/// Persisted user profile, keyed 1:1 by provider uid.
///
/// Role and permission sets are never empty for a reconciled profile:
/// records written without them deserialize to the defaults, and
/// [`UserProfile::ensure_default_access`] repairs records that carry
/// explicitly empty sets.
///
/// Timestamps are store-assigned at write time; values set here are
/// placeholders until the record round-trips through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub uid: UserId,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default = "default_roles")]
    pub roles: BTreeSet<Role>,
    #[serde(default = "default_permissions")]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub last_login_at: Timestamp,
}

impl UserProfile {
    /// Builds the record created on first login from a provider identity.
    pub fn from_identity(identity: &ProviderIdentity) -> Self {
        let now = Timestamp::now();
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone().unwrap_or_default(),
            display_name: identity.display_name.clone(),
            photo_url: identity.photo_url.clone(),
            roles: default_roles(),
            permissions: default_permissions(),
            created_at: now,
            updated_at: now,
            last_login_at: now,
        }
    }

    /// Replaces empty role/permission sets with the defaults.
    ///
    /// Storage may hold records written before access sets existed; a
    /// reconciled profile must never expose empty sets.
    pub fn ensure_default_access(&mut self) {
        if self.roles.is_empty() {
            self.roles = default_roles();
        }
        if self.permissions.is_empty() {
            self.permissions = default_permissions();
        }
    }

    /// Set-membership role check.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Permission tag membership check.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Partial update applied through `ProfileStore::update`.
///
/// `updated_at` is always store-assigned at write time; `last_login_at`
/// refreshes only when `refresh_last_login` is set.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub roles: Option<BTreeSet<Role>>,
    pub permissions: Option<BTreeSet<String>>,
    pub refresh_last_login: bool,
}

impl ProfilePatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch refreshing the login stamp, used after a successful sign-in.
    pub fn login_refresh() -> Self {
        Self {
            refresh_last_login: true,
            ..Self::default()
        }
    }

    /// Replaces the role set.
    pub fn with_roles(mut self, roles: BTreeSet<Role>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Replaces the permission set.
    pub fn with_permissions(mut self, permissions: BTreeSet<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Replaces the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// True when the patch carries no field changes and no stamp refresh.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.photo_url.is_none()
            && self.roles.is_none()
            && self.permissions.is_none()
            && !self.refresh_last_login
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> ProviderIdentity {
        ProviderIdentity {
            uid: UserId::new("user-123").unwrap(),
            email: Some("alice@example.com".to_string()),
            email_verified: false,
            display_name: Some("Alice".to_string()),
            photo_url: None,
        }
    }

    #[test]
    fn from_identity_applies_default_access_sets() {
        let profile = UserProfile::from_identity(&test_identity());

        assert_eq!(profile.uid.as_str(), "user-123");
        assert_eq!(profile.email, "alice@example.com");
        assert_eq!(profile.roles, default_roles());
        assert_eq!(profile.permissions, default_permissions());
    }

    #[test]
    fn default_role_is_exactly_user() {
        assert_eq!(default_roles(), BTreeSet::from([Role::User]));
    }

    #[test]
    fn default_permission_is_exactly_read() {
        assert_eq!(default_permissions(), BTreeSet::from(["read".to_string()]));
    }

    #[test]
    fn ensure_default_access_repairs_empty_sets() {
        let mut profile = UserProfile::from_identity(&test_identity());
        profile.roles.clear();
        profile.permissions.clear();

        profile.ensure_default_access();

        assert_eq!(profile.roles, default_roles());
        assert_eq!(profile.permissions, default_permissions());
    }

    #[test]
    fn ensure_default_access_leaves_populated_sets_alone() {
        let mut profile = UserProfile::from_identity(&test_identity());
        profile.roles = BTreeSet::from([Role::Admin, Role::Moderator]);

        profile.ensure_default_access();

        assert_eq!(profile.roles, BTreeSet::from([Role::Admin, Role::Moderator]));
    }

    #[test]
    fn profile_deserializes_missing_access_sets_to_defaults() {
        let json = r#"{
            "uid": "user-9",
            "email": "bob@example.com",
            "created_at": "2024-01-15T10:30:00Z",
            "updated_at": "2024-01-15T10:30:00Z",
            "last_login_at": "2024-01-15T10:30:00Z"
        }"#;

        let profile: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.roles, default_roles());
        assert_eq!(profile.permissions, default_permissions());
    }

    #[test]
    fn has_role_and_permission_are_membership_checks() {
        let profile = UserProfile::from_identity(&test_identity());

        assert!(profile.has_role(Role::User));
        assert!(!profile.has_role(Role::Admin));
        assert!(profile.has_permission("read"));
        assert!(!profile.has_permission("write"));
    }

    #[test]
    fn empty_patch_reports_empty() {
        assert!(ProfilePatch::new().is_empty());
        assert!(!ProfilePatch::login_refresh().is_empty());
        assert!(!ProfilePatch::new()
            .with_roles(BTreeSet::from([Role::Admin]))
            .is_empty());
    }

    #[test]
    fn login_refresh_patch_only_touches_the_stamp() {
        let patch = ProfilePatch::login_refresh();
        assert!(patch.refresh_last_login);
        assert!(patch.roles.is_none());
        assert!(patch.permissions.is_none());
        assert!(patch.display_name.is_none());
    }
}
