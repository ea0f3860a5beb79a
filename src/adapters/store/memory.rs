//! In-memory profile store.
//!
//! Implements the `ProfileStore` port over a hash map, with the same
//! timestamp-assignment semantics a server-backed document store has:
//! `created_at` on first write, `updated_at` on every write that changes
//! the record. Used in tests and as the reference implementation of the
//! store contract.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in
//! production. It uses `.expect()` on lock operations which will panic if
//! locks are poisoned.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{StoreError, Timestamp, UserId};
use crate::domain::user::{ProfilePatch, UserProfile};
use crate::ports::ProfileStore;

/// In-memory profile store for testing.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    /// Optional error to return for all calls (for error testing)
    force_error: RwLock<Option<StoreError>>,
}

impl InMemoryProfileStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record verbatim, bypassing timestamp assignment.
    pub fn with_profile(self, profile: UserProfile) -> Self {
        self.profiles
            .write()
            .expect("InMemoryProfileStore: profile lock poisoned")
            .insert(profile.uid.clone(), profile);
        self
    }

    /// Forces all calls to return the specified error.
    pub fn with_error(self, error: StoreError) -> Self {
        *self
            .force_error
            .write()
            .expect("InMemoryProfileStore: error lock poisoned") = Some(error);
        self
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *self
            .force_error
            .write()
            .expect("InMemoryProfileStore: error lock poisoned") = None;
    }

    /// Number of stored records.
    pub fn profile_count(&self) -> usize {
        self.profiles
            .read()
            .expect("InMemoryProfileStore: profile lock poisoned")
            .len()
    }

    /// Returns the raw stored record without read-time repairs.
    pub fn raw(&self, uid: &UserId) -> Option<UserProfile> {
        self.profiles
            .read()
            .expect("InMemoryProfileStore: profile lock poisoned")
            .get(uid)
            .cloned()
    }

    fn forced_error(&self) -> Option<StoreError> {
        self.force_error
            .read()
            .expect("InMemoryProfileStore: error lock poisoned")
            .clone()
    }
}

/// Applies a patch, returning true when anything changed.
fn apply_patch(record: &mut UserProfile, patch: &ProfilePatch) -> bool {
    let mut changed = false;
    if let Some(name) = &patch.display_name {
        if record.display_name.as_ref() != Some(name) {
            record.display_name = Some(name.clone());
            changed = true;
        }
    }
    if let Some(url) = &patch.photo_url {
        if record.photo_url.as_ref() != Some(url) {
            record.photo_url = Some(url.clone());
            changed = true;
        }
    }
    if let Some(roles) = &patch.roles {
        if &record.roles != roles {
            record.roles = roles.clone();
            changed = true;
        }
    }
    if let Some(permissions) = &patch.permissions {
        if &record.permissions != permissions {
            record.permissions = permissions.clone();
            changed = true;
        }
    }
    changed
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, uid: &UserId) -> Result<Option<UserProfile>, StoreError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }

        let profile = self
            .profiles
            .read()
            .expect("InMemoryProfileStore: profile lock poisoned")
            .get(uid)
            .cloned();
        Ok(profile.map(|mut p| {
            p.ensure_default_access();
            p
        }))
    }

    async fn set(&self, profile: &UserProfile, merge: bool) -> Result<(), StoreError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }

        let now = Timestamp::now();
        let mut profiles = self
            .profiles
            .write()
            .expect("InMemoryProfileStore: profile lock poisoned");

        match profiles.get_mut(&profile.uid) {
            Some(existing) => {
                let mut record = profile.clone();
                record.created_at = existing.created_at;
                if merge {
                    // Unset incoming fields preserve what is stored.
                    if record.display_name.is_none() {
                        record.display_name = existing.display_name.clone();
                    }
                    if record.photo_url.is_none() {
                        record.photo_url = existing.photo_url.clone();
                    }
                    if record.roles.is_empty() {
                        record.roles = existing.roles.clone();
                    }
                    if record.permissions.is_empty() {
                        record.permissions = existing.permissions.clone();
                    }
                    record.last_login_at = existing.last_login_at;
                }
                record.updated_at = now;
                *existing = record;
            }
            None => {
                let mut record = profile.clone();
                record.created_at = now;
                record.updated_at = now;
                record.last_login_at = now;
                profiles.insert(record.uid.clone(), record);
            }
        }
        Ok(())
    }

    async fn update(&self, uid: &UserId, patch: ProfilePatch) -> Result<(), StoreError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }

        let now = Timestamp::now();
        let mut profiles = self
            .profiles
            .write()
            .expect("InMemoryProfileStore: profile lock poisoned");
        let record = profiles
            .get_mut(uid)
            .ok_or_else(|| StoreError::NotFound(uid.clone()))?;

        let mut changed = apply_patch(record, &patch);
        if patch.refresh_last_login {
            record.last_login_at = now;
            changed = true;
        }
        if changed {
            record.updated_at = now;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Role;
    use crate::domain::session::ProviderIdentity;
    use std::collections::BTreeSet;

    fn test_identity() -> ProviderIdentity {
        ProviderIdentity {
            uid: UserId::new("user-123").unwrap(),
            email: Some("alice@example.com".to_string()),
            email_verified: false,
            display_name: Some("Alice".to_string()),
            photo_url: None,
        }
    }

    fn test_uid() -> UserId {
        UserId::new("user-123").unwrap()
    }

    #[tokio::test]
    async fn get_returns_none_for_absent_record() {
        let store = InMemoryProfileStore::new();
        let result = store.get(&test_uid()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryProfileStore::new();
        let profile = UserProfile::from_identity(&test_identity());

        store.set(&profile, true).await.unwrap();
        let fetched = store.get(&test_uid()).await.unwrap().unwrap();

        assert_eq!(fetched.uid, profile.uid);
        assert_eq!(fetched.email, profile.email);
        assert_eq!(fetched.roles, profile.roles);
    }

    #[tokio::test]
    async fn set_assigns_timestamps_on_first_write() {
        let store = InMemoryProfileStore::new();
        let profile = UserProfile::from_identity(&test_identity());

        store.set(&profile, true).await.unwrap();
        let stored = store.raw(&test_uid()).unwrap();

        assert_eq!(stored.created_at, stored.updated_at);
        assert_eq!(stored.created_at, stored.last_login_at);
    }

    #[tokio::test]
    async fn set_preserves_created_at_on_rewrite() {
        let store = InMemoryProfileStore::new();
        let profile = UserProfile::from_identity(&test_identity());

        store.set(&profile, true).await.unwrap();
        let created_at = store.raw(&test_uid()).unwrap().created_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.set(&profile, false).await.unwrap();
        let stored = store.raw(&test_uid()).unwrap();

        assert_eq!(stored.created_at, created_at);
        assert!(stored.updated_at.is_after(&created_at));
    }

    #[tokio::test]
    async fn merge_set_preserves_stored_display_data() {
        let store = InMemoryProfileStore::new();
        let mut profile = UserProfile::from_identity(&test_identity());
        store.set(&profile, true).await.unwrap();

        profile.display_name = None;
        profile.roles = BTreeSet::new();
        store.set(&profile, true).await.unwrap();

        let stored = store.raw(&test_uid()).unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Alice"));
        assert!(!stored.roles.is_empty());
    }

    #[tokio::test]
    async fn get_repairs_empty_access_sets() {
        let mut profile = UserProfile::from_identity(&test_identity());
        profile.roles = BTreeSet::new();
        profile.permissions = BTreeSet::new();
        let store = InMemoryProfileStore::new().with_profile(profile);

        let fetched = store.get(&test_uid()).await.unwrap().unwrap();

        assert!(fetched.has_role(Role::User));
        assert!(fetched.has_permission("read"));
        // The stored record is untouched; repair happens at read time.
        assert!(store.raw(&test_uid()).unwrap().roles.is_empty());
    }

    #[tokio::test]
    async fn update_absent_record_is_not_found() {
        let store = InMemoryProfileStore::new();
        let result = store.update(&test_uid(), ProfilePatch::login_refresh()).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_applies_roles_and_bumps_updated_at() {
        let store = InMemoryProfileStore::new();
        store
            .set(&UserProfile::from_identity(&test_identity()), true)
            .await
            .unwrap();
        let before = store.raw(&test_uid()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let patch = ProfilePatch::new().with_roles(BTreeSet::from([Role::Admin, Role::User]));
        store.update(&test_uid(), patch).await.unwrap();

        let after = store.raw(&test_uid()).unwrap();
        assert_eq!(after.roles, BTreeSet::from([Role::Admin, Role::User]));
        assert!(after.updated_at.is_after(&before.updated_at));
        assert_eq!(after.last_login_at, before.last_login_at);
    }

    #[tokio::test]
    async fn no_op_update_leaves_record_identical() {
        let store = InMemoryProfileStore::new();
        store
            .set(&UserProfile::from_identity(&test_identity()), true)
            .await
            .unwrap();

        let patch = ProfilePatch::new().with_roles(default_roles_set());
        store.update(&test_uid(), patch.clone()).await.unwrap();
        let first = store.raw(&test_uid()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.update(&test_uid(), patch).await.unwrap();
        let second = store.raw(&test_uid()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn login_refresh_bumps_login_stamp() {
        let store = InMemoryProfileStore::new();
        store
            .set(&UserProfile::from_identity(&test_identity()), true)
            .await
            .unwrap();
        let before = store.raw(&test_uid()).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .update(&test_uid(), ProfilePatch::login_refresh())
            .await
            .unwrap();

        let after = store.raw(&test_uid()).unwrap();
        assert!(after.last_login_at.is_after(&before.last_login_at));
        assert!(after.updated_at.is_after(&before.updated_at));
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn forced_error_surfaces_on_all_calls() {
        let store =
            InMemoryProfileStore::new().with_error(StoreError::Unavailable("down".to_string()));

        assert!(store.get(&test_uid()).await.is_err());
        assert!(store
            .set(&UserProfile::from_identity(&test_identity()), true)
            .await
            .is_err());

        store.clear_error();
        assert!(store.get(&test_uid()).await.is_ok());
    }

    fn default_roles_set() -> BTreeSet<Role> {
        crate::domain::user::default_roles()
    }
}
