//! Profile store port.
//!
//! The document store holding user profile records, keyed 1:1 by provider
//! uid. Timestamps are assigned by the store at write time (server-side,
//! monotonic per write), never by callers.

use async_trait::async_trait;

use crate::domain::foundation::{StoreError, UserId};
use crate::domain::user::{ProfilePatch, UserProfile};

/// Document store for user profile records.
///
/// # Contract
///
/// Implementations must:
/// - Return `Ok(None)` from `get` when no record exists (absence is not
///   an error)
/// - Repair empty role/permission sets to the defaults at read time
/// - Assign `created_at` on first write and `updated_at` on every write
///   that changes the record
/// - Return `StoreError::NotFound` from `update` when the record is absent
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Reads the profile record for a user, if one exists.
    async fn get(&self, uid: &UserId) -> Result<Option<UserProfile>, StoreError>;

    /// Writes a profile record.
    ///
    /// With `merge` set, unset fields of the incoming record (`None`
    /// display data, empty access sets) preserve what is already stored;
    /// without it the record is replaced wholesale. `created_at` of an
    /// existing record is preserved either way.
    async fn set(&self, profile: &UserProfile, merge: bool) -> Result<(), StoreError>;

    /// Applies a partial update to an existing record.
    ///
    /// A patch that changes nothing leaves the record byte-identical,
    /// including its timestamps.
    async fn update(&self, uid: &UserId, patch: ProfilePatch) -> Result<(), StoreError>;
}
