//! User module - the persisted profile aggregate.
//!
//! A profile is the domain record describing a user: roles, permissions,
//! and display data. It is keyed 1:1 by provider identity id and is never
//! deleted by this crate (account deletion is out of scope).

pub mod profile;

pub use profile::{default_permissions, default_roles, ProfilePatch, UserProfile};
