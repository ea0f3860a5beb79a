//! SessionManager - the authentication/session state machine.
//!
//! Owns the process-wide session state and is its only mutator. Two paths
//! feed it:
//!
//! 1. **Passive**: the provider's push events, consumed strictly in order
//!    by a dedicated reconciliation task started with [`SessionManager::attach`]
//! 2. **Imperative**: login/register/logout/reset operations, serialized
//!    through a single in-flight operation lock
//!
//! Settled snapshots publish over a `tokio::sync::watch` channel; guards
//! and UI consume them read-only, and [`SessionManager::wait_settled`]
//! gives guards a one-shot completion signal instead of polling.
//!
//! State machine: `Uninitialized -> Loading -> {Authenticated, Anonymous}`.
//! The settled states re-enter `Loading` only through an imperative
//! operation, never through passive observation.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::domain::foundation::{AuthError, Role, StoreError, UserId};
use crate::domain::session::{
    IdentityEvent, OAuthCredential, ProviderIdentity, SessionSnapshot, SessionState,
};
use crate::domain::user::{ProfilePatch, UserProfile};
use crate::ports::{IdentityProvider, ProfileStore};

/// Failure to observe a settled session within a bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("session did not settle within {0:?}")]
    Timeout(Duration),

    #[error("session state channel closed")]
    Closed,
}

/// Handle on the running reconciliation task.
struct Reconciler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The session state manager.
///
/// An explicit, dependency-injected context object: construct one per
/// application, `attach` it at startup, `detach` (or drop) it at
/// shutdown. All other components consume it read-only.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    state: Arc<watch::Sender<SessionSnapshot>>,
    settled_once: Arc<AtomicBool>,
    /// Serializes imperative operations: a second call queues behind the
    /// first instead of racing it.
    op_gate: Mutex<()>,
    reconciler: StdMutex<Option<Reconciler>>,
}

impl SessionManager {
    /// Creates a manager in the `Uninitialized` state.
    ///
    /// No provider events are consumed until [`attach`](Self::attach).
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ProfileStore>) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::initial());
        Self {
            provider,
            store,
            state: Arc::new(tx),
            settled_once: Arc::new(AtomicBool::new(false)),
            op_gate: Mutex::new(()),
            reconciler: StdMutex::new(None),
        }
    }

    /// Starts consuming provider push events.
    ///
    /// Events are reconciled strictly in order; within one event the
    /// profile is fully fetched or created before the snapshot is
    /// advertised, so observers never see a torn profile. Calling
    /// `attach` on an already-attached manager is a no-op.
    pub fn attach(&self) {
        let mut guard = self
            .reconciler
            .lock()
            .expect("SessionManager: reconciler lock poisoned");
        if guard.is_some() {
            return;
        }

        let mut events = self.provider.subscribe();
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let settled_once = Arc::clone(&self.settled_once);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                // The shutdown check sits between events only: an event
                // whose reconciliation has started always completes.
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    event = events.recv() => match event {
                        Some(event) => {
                            reconcile_event(store.as_ref(), &state, &settled_once, event).await;
                        }
                        None => break,
                    },
                }
            }
            tracing::debug!("identity event stream ended; reconciliation stopped");
        });
        *guard = Some(Reconciler { shutdown, task });
    }

    /// Stops consuming provider events. Idempotent.
    ///
    /// An in-flight reconciliation (or imperative operation) is not
    /// cancelled; only future events stop being consumed.
    pub fn detach(&self) {
        let reconciler = self
            .reconciler
            .lock()
            .expect("SessionManager: reconciler lock poisoned")
            .take();
        if let Some(reconciler) = reconciler {
            let _ = reconciler.shutdown.send(true);
            drop(reconciler.task);
        }
    }

    // === Imperative operations ===

    /// Signs in with an email/password credential.
    ///
    /// `loading` is set at entry and cleared at settle on both the success
    /// and the failure path. On failure the session resolves to
    /// `Anonymous` with `last_error` holding the classified failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let _op = self.op_gate.lock().await;
        self.begin_operation();

        match self.provider.sign_in(email, password).await {
            Ok(identity) => self.finish_authentication(identity).await,
            Err(err) => {
                tracing::debug!(%err, "credential sign-in failed");
                self.fail_operation(err.clone());
                Err(err)
            }
        }
    }

    /// Signs in by exchanging a federated OAuth token.
    ///
    /// Same contract as [`login`](Self::login).
    pub async fn login_with_oauth(
        &self,
        credential: OAuthCredential,
    ) -> Result<UserProfile, AuthError> {
        let _op = self.op_gate.lock().await;
        self.begin_operation();

        match self.provider.sign_in_with_oauth(credential).await {
            Ok(identity) => self.finish_authentication(identity).await,
            Err(err) => {
                tracing::debug!(%err, "oauth sign-in failed");
                self.fail_operation(err.clone());
                Err(err)
            }
        }
    }

    /// Creates an account, sets its display name, dispatches a
    /// verification email, and creates the profile record with default
    /// access sets.
    ///
    /// The verification email is best-effort: a dispatch failure is
    /// logged and never rolls back account creation.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserProfile, AuthError> {
        let _op = self.op_gate.lock().await;
        self.begin_operation();

        let identity = match self.provider.sign_up(email, password).await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::debug!(%err, "account creation failed");
                self.fail_operation(err.clone());
                return Err(err);
            }
        };

        let identity = match self
            .provider
            .update_display_name(&identity, display_name)
            .await
        {
            Ok(identity) => identity,
            Err(err) => {
                self.fail_operation(err.clone());
                return Err(err);
            }
        };

        if let Err(err) = self.provider.send_verification(&identity).await {
            tracing::warn!(uid = %identity.uid, %err, "verification email dispatch failed");
        }

        self.finish_authentication(identity).await
    }

    /// Signs out.
    ///
    /// The remote call is best-effort: the local session always clears to
    /// `Anonymous`, so the UI can never be stuck in a zombie
    /// authenticated state.
    pub async fn logout(&self) {
        let _op = self.op_gate.lock().await;

        if let Err(err) = self.provider.sign_out().await {
            tracing::warn!(%err, "provider sign-out failed; clearing local session anyway");
        }

        self.settled_once.store(true, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.identity = None;
            s.profile = None;
            s.loading = false;
            s.last_error = None;
        });
    }

    /// Dispatches a password reset email. Session state is untouched.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let _op = self.op_gate.lock().await;
        self.state.send_modify(|s| s.last_error = None);

        if let Err(err) = self.provider.send_password_reset(email).await {
            self.state.send_modify(|s| s.last_error = Some(err.clone()));
            return Err(err);
        }
        Ok(())
    }

    /// Re-sends the verification email for the current session.
    ///
    /// Fails with `AuthError::NoActiveSession` when no provider identity
    /// is attached.
    pub async fn resend_verification_email(&self) -> Result<(), AuthError> {
        let _op = self.op_gate.lock().await;
        self.state.send_modify(|s| s.last_error = None);

        // Clone out of the borrow before touching the sender again; the
        // watch read guard must not be held across send_modify.
        let identity = self.state.borrow().identity.clone();
        let identity = match identity {
            Some(identity) => identity,
            None => {
                let err = AuthError::NoActiveSession;
                self.state.send_modify(|s| s.last_error = Some(err.clone()));
                return Err(err);
            }
        };

        if let Err(err) = self.provider.send_verification(&identity).await {
            self.state.send_modify(|s| s.last_error = Some(err.clone()));
            return Err(err);
        }
        Ok(())
    }

    // === Administrative updates ===

    /// Replaces a user's role set in storage.
    ///
    /// Errors propagate uncaught; no retry. When the target is the live
    /// session's user the in-memory profile is patched to stay consistent
    /// with storage, without a forced re-fetch.
    pub async fn update_user_roles(
        &self,
        uid: &UserId,
        roles: BTreeSet<Role>,
    ) -> Result<(), StoreError> {
        self.store
            .update(uid, ProfilePatch::new().with_roles(roles.clone()))
            .await?;

        self.state.send_if_modified(|s| match &mut s.profile {
            Some(profile) if &profile.uid == uid && profile.roles != roles => {
                profile.roles = roles.clone();
                true
            }
            _ => false,
        });
        Ok(())
    }

    /// Replaces a user's permission set in storage.
    ///
    /// Same contract as [`update_user_roles`](Self::update_user_roles).
    pub async fn update_user_permissions(
        &self,
        uid: &UserId,
        permissions: BTreeSet<String>,
    ) -> Result<(), StoreError> {
        self.store
            .update(
                uid,
                ProfilePatch::new().with_permissions(permissions.clone()),
            )
            .await?;

        self.state.send_if_modified(|s| match &mut s.profile {
            Some(profile) if &profile.uid == uid && profile.permissions != permissions => {
                profile.permissions = permissions.clone();
                true
            }
            _ => false,
        });
        Ok(())
    }

    // === Observation ===

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Watch subscription for guards and UI.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Resolves with the first settled snapshot, bounded by `timeout`.
    ///
    /// Returns immediately when the session is already settled.
    pub async fn wait_settled(&self, timeout: Duration) -> Result<SessionSnapshot, SettleError> {
        let mut rx = self.state.subscribe();
        let result = match tokio::time::timeout(timeout, rx.wait_for(|s| !s.loading)).await {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(SettleError::Closed),
            Err(_) => Err(SettleError::Timeout(timeout)),
        };
        result
    }

    // === Derived queries (pure, synchronous) ===

    /// Coarse lifecycle state of the current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().state()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn email_verified(&self) -> bool {
        self.state.borrow().email_verified()
    }

    pub fn roles(&self) -> BTreeSet<Role> {
        self.state.borrow().roles()
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        self.state.borrow().permissions()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.state.borrow().has_role(role)
    }

    pub fn has_any_role(&self, roles: impl IntoIterator<Item = Role>) -> bool {
        self.state.borrow().has_any_role(roles)
    }

    pub fn has_all_roles(&self, roles: impl IntoIterator<Item = Role>) -> bool {
        self.state.borrow().has_all_roles(roles)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.state.borrow().has_permission(permission)
    }

    pub fn has_any_permission<'a>(&self, permissions: impl IntoIterator<Item = &'a str>) -> bool {
        self.state.borrow().has_any_permission(permissions)
    }

    /// Last classified operation failure, cleared at the start of each
    /// new operation.
    pub fn last_error(&self) -> Option<AuthError> {
        self.state.borrow().last_error.clone()
    }

    /// Uid of the current provider identity, if any.
    pub fn current_uid(&self) -> Option<UserId> {
        self.state.borrow().identity.as_ref().map(|i| i.uid.clone())
    }

    // === Internals ===

    fn begin_operation(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.last_error = None;
        });
    }

    fn fail_operation(&self, err: AuthError) {
        self.settled_once.store(true, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.identity = None;
            s.profile = None;
            s.loading = false;
            s.last_error = Some(err);
        });
    }

    /// Reconciles a fresh identity and publishes the authenticated
    /// snapshot, failing closed on storage errors.
    async fn finish_authentication(
        &self,
        identity: ProviderIdentity,
    ) -> Result<UserProfile, AuthError> {
        let profile = match fetch_or_create(self.store.as_ref(), &identity).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(uid = %identity.uid, %err, "profile reconciliation failed");
                let err = AuthError::Unknown(err.to_string());
                self.fail_operation(err.clone());
                return Err(err);
            }
        };

        // Refresh the login stamp in storage; the stamp is advisory, so a
        // failure here does not fail the sign-in.
        let profile = match self
            .store
            .update(&identity.uid, ProfilePatch::login_refresh())
            .await
        {
            Ok(()) => match self.store.get(&identity.uid).await {
                Ok(Some(refreshed)) => refreshed,
                Ok(None) | Err(_) => profile,
            },
            Err(err) => {
                tracing::warn!(uid = %identity.uid, %err, "login stamp refresh failed");
                profile
            }
        };

        tracing::info!(uid = %identity.uid, "session authenticated");
        self.settled_once.store(true, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.identity = Some(identity);
            s.profile = Some(profile.clone());
            s.loading = false;
            s.last_error = None;
        });
        Ok(profile)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Fetches the profile for an identity, creating it with defaults on
/// first login. The stored record's timestamps are authoritative, so a
/// freshly created profile is read back after the write.
async fn fetch_or_create(
    store: &dyn ProfileStore,
    identity: &ProviderIdentity,
) -> Result<UserProfile, StoreError> {
    if let Some(profile) = store.get(&identity.uid).await? {
        return Ok(profile);
    }

    tracing::debug!(uid = %identity.uid, "first login; creating profile record");
    let profile = UserProfile::from_identity(identity);
    store.set(&profile, true).await?;
    Ok(store.get(&identity.uid).await?.unwrap_or(profile))
}

/// Reconciles one provider push event into the session snapshot.
///
/// Failures are swallowed here (logged, recorded on the snapshot) and the
/// session resolves to `Anonymous` - a user is never left in an
/// authenticated UI state backed by a failed profile fetch.
async fn reconcile_event(
    store: &dyn ProfileStore,
    state: &watch::Sender<SessionSnapshot>,
    settled_once: &AtomicBool,
    event: IdentityEvent,
) {
    let first_settle = !settled_once.swap(true, Ordering::SeqCst);

    match event {
        IdentityEvent::SignedOut => {
            state.send_modify(|s| {
                s.identity = None;
                s.profile = None;
                if first_settle {
                    s.loading = false;
                }
            });
        }
        IdentityEvent::SignedIn(identity) => match fetch_or_create(store, &identity).await {
            Ok(profile) => {
                state.send_modify(|s| {
                    s.identity = Some(identity);
                    s.profile = Some(profile);
                    if first_settle {
                        s.loading = false;
                    }
                });
            }
            Err(err) => {
                tracing::warn!(
                    uid = %identity.uid,
                    %err,
                    "reconciliation failed; resolving session to anonymous"
                );
                state.send_modify(|s| {
                    s.identity = None;
                    s.profile = None;
                    s.last_error = Some(AuthError::Unknown(err.to_string()));
                    if first_settle {
                        s.loading = false;
                    }
                });
            }
        },
    }
}
