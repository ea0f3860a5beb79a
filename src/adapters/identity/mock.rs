//! Mock identity provider for testing.
//!
//! Implements the `IdentityProvider` port against an in-memory account
//! table, avoiding the need for a real Firebase project. Supports forced
//! errors and manual event injection so tests can exercise both the
//! imperative operations and the passive reconciliation path.
//!
//! # Example
//!
//! ```ignore
//! let provider = MockIdentityProvider::new()
//!     .with_account("alice@example.com", "hunter22");
//!
//! let identity = provider.sign_in("alice@example.com", "hunter22").await?;
//! assert!(!identity.email_verified);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::foundation::{AuthError, UserId};
use crate::domain::session::{IdentityEvent, OAuthCredential, ProviderIdentity};
use crate::ports::IdentityProvider;

/// Account record held by the mock provider.
#[derive(Debug, Clone)]
struct MockAccount {
    uid: UserId,
    email: String,
    password: String,
    display_name: Option<String>,
    email_verified: bool,
}

impl MockAccount {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            uid: self.uid.clone(),
            email: Some(self.email.clone()),
            email_verified: self.email_verified,
            display_name: self.display_name.clone(),
            photo_url: None,
        }
    }
}

/// In-memory identity provider for testing.
///
/// Accounts are keyed by email. Sign-up applies the same validation rules
/// Firebase does (syntactic email check, six character password minimum)
/// so error-path tests exercise the real taxonomy.
#[derive(Default)]
pub struct MockIdentityProvider {
    accounts: RwLock<HashMap<String, MockAccount>>,
    oauth_tokens: RwLock<HashMap<String, ProviderIdentity>>,
    current: RwLock<Option<ProviderIdentity>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<IdentityEvent>>>,
    force_error: RwLock<Option<AuthError>>,
    fail_sign_out: AtomicBool,
    fail_verification: AtomicBool,
    reset_requests: Mutex<Vec<String>>,
    verification_requests: Mutex<Vec<UserId>>,
}

impl MockIdentityProvider {
    /// Creates an empty mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unverified account with a generated uid.
    pub fn with_account(self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.add_account(email, password, false);
        self
    }

    /// Adds an account whose email is already verified.
    pub fn with_verified_account(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.add_account(email, password, true);
        self
    }

    /// Registers an identity redeemable through an OAuth token.
    pub fn with_oauth_identity(self, token: impl Into<String>, identity: ProviderIdentity) -> Self {
        self.oauth_tokens
            .write()
            .expect("MockIdentityProvider: oauth lock poisoned")
            .insert(token.into(), identity);
        self
    }

    /// Forces all operations to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *self
            .force_error
            .write()
            .expect("MockIdentityProvider: error lock poisoned") = Some(error);
        self
    }

    /// Makes `sign_out` fail while leaving other operations intact.
    pub fn with_failing_sign_out(self) -> Self {
        self.fail_sign_out.store(true, Ordering::SeqCst);
        self
    }

    /// Makes `send_verification` fail while leaving other operations intact.
    pub fn with_failing_verification(self) -> Self {
        self.fail_verification.store(true, Ordering::SeqCst);
        self
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *self
            .force_error
            .write()
            .expect("MockIdentityProvider: error lock poisoned") = None;
    }

    /// Adds an account at runtime, returning its uid.
    pub fn add_account(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
        email_verified: bool,
    ) -> UserId {
        let email = email.into();
        let uid = UserId::new(format!("mock-{}", Uuid::new_v4().simple()))
            .expect("generated uid is never empty");
        let account = MockAccount {
            uid: uid.clone(),
            email: email.clone(),
            password: password.into(),
            display_name: None,
            email_verified,
        };
        self.accounts
            .write()
            .expect("MockIdentityProvider: account lock poisoned")
            .insert(email, account);
        uid
    }

    /// Flips the verified flag, simulating the user clicking the email link.
    pub fn mark_email_verified(&self, email: &str) {
        let mut accounts = self
            .accounts
            .write()
            .expect("MockIdentityProvider: account lock poisoned");
        if let Some(account) = accounts.get_mut(email) {
            account.email_verified = true;
        }
    }

    /// Injects a push event, simulating a provider-side session change.
    pub fn push_event(&self, event: IdentityEvent) {
        if let IdentityEvent::SignedIn(identity) = &event {
            *self
                .current
                .write()
                .expect("MockIdentityProvider: current lock poisoned") = Some(identity.clone());
        } else {
            *self
                .current
                .write()
                .expect("MockIdentityProvider: current lock poisoned") = None;
        }
        self.emit(event);
    }

    /// Emails that received a password reset request.
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests
            .lock()
            .expect("MockIdentityProvider: reset lock poisoned")
            .clone()
    }

    /// Uids that received a verification email.
    pub fn verification_requests(&self) -> Vec<UserId> {
        self.verification_requests
            .lock()
            .expect("MockIdentityProvider: verification lock poisoned")
            .clone()
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.accounts
            .read()
            .expect("MockIdentityProvider: account lock poisoned")
            .len()
    }

    fn forced_error(&self) -> Option<AuthError> {
        self.force_error
            .read()
            .expect("MockIdentityProvider: error lock poisoned")
            .clone()
    }

    fn emit(&self, event: IdentityEvent) {
        let mut listeners = self
            .listeners
            .lock()
            .expect("MockIdentityProvider: listener lock poisoned");
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn adopt(&self, identity: ProviderIdentity) {
        *self
            .current
            .write()
            .expect("MockIdentityProvider: current lock poisoned") = Some(identity.clone());
        self.emit(IdentityEvent::SignedIn(identity));
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderIdentity, AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }

        let account = {
            let accounts = self
                .accounts
                .read()
                .expect("MockIdentityProvider: account lock poisoned");
            accounts.get(email).cloned()
        };
        let account = account.ok_or(AuthError::AccountNotFound)?;
        if account.password != password {
            return Err(AuthError::WrongPassword);
        }

        let identity = account.identity();
        self.adopt(identity.clone());
        Ok(identity)
    }

    async fn sign_in_with_oauth(
        &self,
        credential: OAuthCredential,
    ) -> Result<ProviderIdentity, AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }

        let identity = {
            let tokens = self
                .oauth_tokens
                .read()
                .expect("MockIdentityProvider: oauth lock poisoned");
            tokens.get(credential.token.expose_secret()).cloned()
        };
        let identity = identity.ok_or(AuthError::InvalidCredential)?;
        self.adopt(identity.clone());
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<ProviderIdentity, AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail);
        }
        if password.len() < 6 {
            return Err(AuthError::WeakPassword);
        }
        {
            let accounts = self
                .accounts
                .read()
                .expect("MockIdentityProvider: account lock poisoned");
            if accounts.contains_key(email) {
                return Err(AuthError::EmailAlreadyInUse);
            }
        }

        self.add_account(email, password, false);
        let identity = {
            let accounts = self
                .accounts
                .read()
                .expect("MockIdentityProvider: account lock poisoned");
            accounts
                .get(email)
                .expect("account inserted above")
                .identity()
        };
        self.adopt(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::ProviderUnreachable(
                "simulated sign-out failure".to_string(),
            ));
        }
        *self
            .current
            .write()
            .expect("MockIdentityProvider: current lock poisoned") = None;
        self.emit(IdentityEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<IdentityEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let seed = {
            let current = self
                .current
                .read()
                .expect("MockIdentityProvider: current lock poisoned");
            match current.as_ref() {
                Some(identity) => IdentityEvent::SignedIn(identity.clone()),
                None => IdentityEvent::SignedOut,
            }
        };
        let _ = tx.send(seed);
        self.listeners
            .lock()
            .expect("MockIdentityProvider: listener lock poisoned")
            .push(tx);
        rx
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }
        let known = {
            let accounts = self
                .accounts
                .read()
                .expect("MockIdentityProvider: account lock poisoned");
            accounts.contains_key(email)
        };
        if !known {
            return Err(AuthError::AccountNotFound);
        }
        self.reset_requests
            .lock()
            .expect("MockIdentityProvider: reset lock poisoned")
            .push(email.to_string());
        Ok(())
    }

    async fn send_verification(&self, identity: &ProviderIdentity) -> Result<(), AuthError> {
        if self.fail_verification.load(Ordering::SeqCst) {
            return Err(AuthError::ProviderUnreachable(
                "simulated verification dispatch failure".to_string(),
            ));
        }
        if let Some(error) = self.forced_error() {
            return Err(error);
        }
        let live = {
            let current = self
                .current
                .read()
                .expect("MockIdentityProvider: current lock poisoned");
            current.as_ref().map(|i| i.uid.clone())
        };
        if live.as_ref() != Some(&identity.uid) {
            return Err(AuthError::NoActiveSession);
        }
        self.verification_requests
            .lock()
            .expect("MockIdentityProvider: verification lock poisoned")
            .push(identity.uid.clone());
        Ok(())
    }

    async fn update_display_name(
        &self,
        identity: &ProviderIdentity,
        name: &str,
    ) -> Result<ProviderIdentity, AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }

        let mut accounts = self
            .accounts
            .write()
            .expect("MockIdentityProvider: account lock poisoned");
        for account in accounts.values_mut() {
            if account.uid == identity.uid {
                account.display_name = Some(name.to_string());
            }
        }
        drop(accounts);

        let updated = ProviderIdentity {
            display_name: Some(name.to_string()),
            ..identity.clone()
        };
        let mut current = self
            .current
            .write()
            .expect("MockIdentityProvider: current lock poisoned");
        if current.as_ref().map(|i| &i.uid) == Some(&updated.uid) {
            *current = Some(updated.clone());
        }
        Ok(updated)
    }
}
