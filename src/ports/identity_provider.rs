//! Identity provider port.
//!
//! This port defines the contract with the remote identity provider that
//! owns credential verification and session tokens. It is
//! provider-agnostic - implementations exist for Firebase and mock
//! testing, and could be added for Auth0, Supabase, etc.
//!
//! # Push events
//!
//! Instead of a callback registration, the provider exposes a
//! single-consumer event channel: `subscribe` returns a receiver of
//! [`IdentityEvent`]s, and dropping the receiver is the unsubscribe. The
//! session manager consumes events strictly in order, so observers never
//! see identity changes interleaved out of sequence.
//!
//! # Example
//!
//! ```ignore
//! let provider: Arc<dyn IdentityProvider> = Arc::new(
//!     FirebaseIdentityProvider::new(FirebaseConfig::new(api_key)),
//! );
//!
//! let identity = provider.sign_in("alice@example.com", "hunter22").await?;
//! assert_eq!(identity.uid.as_str(), "firebase-uid");
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::foundation::AuthError;
use crate::domain::session::{IdentityEvent, OAuthCredential, ProviderIdentity};

/// Remote identity provider owning credentials and session tokens.
///
/// # Contract
///
/// Implementations must:
/// - Map provider-specific failure codes into the [`AuthError`] taxonomy
///   (unrecognized codes go to `AuthError::Unknown` with the raw message)
/// - Emit a [`IdentityEvent`] on every session transition they cause
/// - Seed each new subscription with the current session state, so a late
///   subscriber still observes exactly one initial event
/// - Return `AuthError::ProviderUnreachable` for transport-level failures
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verifies an email/password credential and opens a session.
    async fn sign_in(&self, email: &str, password: &str)
        -> Result<ProviderIdentity, AuthError>;

    /// Exchanges a federated OAuth token for a session.
    ///
    /// The interactive consent flow that produced the token is out of
    /// scope; implementations only perform the exchange.
    async fn sign_in_with_oauth(
        &self,
        credential: OAuthCredential,
    ) -> Result<ProviderIdentity, AuthError>;

    /// Creates a new account and opens a session for it.
    async fn sign_up(&self, email: &str, password: &str)
        -> Result<ProviderIdentity, AuthError>;

    /// Closes the current session.
    ///
    /// A failure here means the remote call failed; callers decide whether
    /// local state still clears (the session manager always clears).
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Opens a push event subscription seeded with the current state.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<IdentityEvent>;

    /// Dispatches a password reset email. Does not touch the session.
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Dispatches a verification email for the given identity.
    ///
    /// Fails with `AuthError::NoActiveSession` when the identity does not
    /// belong to a live provider session.
    async fn send_verification(&self, identity: &ProviderIdentity) -> Result<(), AuthError>;

    /// Sets the display name on the provider account.
    ///
    /// Returns the refreshed identity carrying the new name.
    async fn update_display_name(
        &self,
        identity: &ProviderIdentity,
        name: &str,
    ) -> Result<ProviderIdentity, AuthError>;
}
