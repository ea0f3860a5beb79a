//! Session vocabulary - provider identity, push events, and the
//! observable session snapshot.
//!
//! The snapshot is the single source of truth for "who is logged in and
//! what can they do". It is published by the session manager and consumed
//! read-only by guards and UI code.

use std::collections::BTreeSet;

use secrecy::SecretString;

use super::foundation::{AuthError, Role, UserId};
use super::user::UserProfile;

/// Federated identity providers supported for OAuth sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    /// Provider identifier in the form the identity toolkit expects.
    pub fn provider_id(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google.com",
            OAuthProvider::Github => "github.com",
        }
    }

    /// Name of the token parameter the provider's exchange endpoint expects.
    pub fn token_param(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "id_token",
            OAuthProvider::Github => "access_token",
        }
    }
}

/// Provider-issued OAuth token to exchange for a session.
///
/// The interactive consent flow (popup, standard profile scopes) is a
/// presentation concern; the core only performs the exchange.
#[derive(Debug, Clone)]
pub struct OAuthCredential {
    pub provider: OAuthProvider,
    pub token: SecretString,
}

impl OAuthCredential {
    /// Wraps a provider-issued token for exchange.
    pub fn new(provider: OAuthProvider, token: impl Into<String>) -> Self {
        Self {
            provider,
            token: SecretString::new(token.into()),
        }
    }
}

/// Identity attached to a live provider session.
///
/// This is the domain view of the provider's opaque handle: token material
/// stays inside the adapter that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub uid: UserId,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Push event emitted by the identity provider over its event channel.
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    SignedIn(ProviderIdentity),
    SignedOut,
}

/// Coarse session lifecycle state derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The first provider event has not been reconciled yet, or an
    /// imperative operation is in flight.
    Loading,
    /// A provider identity exists and its profile reconciled successfully.
    Authenticated,
    /// No provider identity, or reconciliation failed closed.
    Anonymous,
}

/// Point-in-time view of the session.
///
/// Invariant: `profile` is `Some` if and only if `identity` is `Some` and
/// reconciliation completed successfully. A failed reconciliation clears
/// both - a torn or stale profile is never surfaced.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub identity: Option<ProviderIdentity>,
    pub profile: Option<UserProfile>,
    pub loading: bool,
    pub last_error: Option<AuthError>,
}

impl SessionSnapshot {
    /// The snapshot published before the first provider event reconciles.
    pub fn initial() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
            last_error: None,
        }
    }

    /// Derives the coarse lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.loading {
            SessionState::Loading
        } else if self.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    /// True when a reconciled profile is attached.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.profile.is_some()
    }

    /// Live verified flag from the provider identity (storage does not
    /// carry it).
    pub fn email_verified(&self) -> bool {
        self.identity.as_ref().is_some_and(|i| i.email_verified)
    }

    /// Roles of the reconciled profile; empty when anonymous.
    pub fn roles(&self) -> BTreeSet<Role> {
        self.profile
            .as_ref()
            .map(|p| p.roles.clone())
            .unwrap_or_default()
    }

    /// Permissions of the reconciled profile; empty when anonymous.
    pub fn permissions(&self) -> BTreeSet<String> {
        self.profile
            .as_ref()
            .map(|p| p.permissions.clone())
            .unwrap_or_default()
    }

    /// Set-membership check; no role implies any other.
    pub fn has_role(&self, role: Role) -> bool {
        self.profile.as_ref().is_some_and(|p| p.has_role(role))
    }

    /// True when at least one of the given roles is held.
    pub fn has_any_role(&self, roles: impl IntoIterator<Item = Role>) -> bool {
        roles.into_iter().any(|r| self.has_role(r))
    }

    /// True when every one of the given roles is held.
    ///
    /// Vacuously true for an empty iterator.
    pub fn has_all_roles(&self, roles: impl IntoIterator<Item = Role>) -> bool {
        roles.into_iter().all(|r| self.has_role(r))
    }

    /// Permission tag membership check.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|p| p.has_permission(permission))
    }

    /// True when at least one of the given permission tags is held.
    pub fn has_any_permission<'a>(&self, permissions: impl IntoIterator<Item = &'a str>) -> bool {
        permissions.into_iter().any(|p| self.has_permission(p))
    }

    /// True when every one of the given permission tags is held.
    ///
    /// Vacuously true for an empty iterator.
    pub fn has_all_permissions<'a>(&self, permissions: impl IntoIterator<Item = &'a str>) -> bool {
        permissions.into_iter().all(|p| self.has_permission(p))
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
