//! Authentication state guards.
//!
//! `AuthGuard` admits only authenticated sessions; `AnonymousGuard` is
//! its mirror for login/registration pages. Both wait for the session to
//! settle before deciding, so a navigation issued during startup is held
//! until the first provider event reconciles rather than bounced to the
//! wrong place.

use std::sync::Arc;

use crate::application::SessionManager;
use crate::domain::session::SessionSnapshot;

use super::route::{GuardDecision, Redirect, RouteRequest};
use super::GuardPolicy;

/// Admits authenticated sessions; others are redirected to the login
/// page carrying the requested path as `returnUrl`.
pub struct AuthGuard {
    session: Arc<SessionManager>,
    policy: GuardPolicy,
}

impl AuthGuard {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_policy(session, GuardPolicy::default())
    }

    pub fn with_policy(session: Arc<SessionManager>, policy: GuardPolicy) -> Self {
        Self { session, policy }
    }

    /// Pure decision over a settled snapshot.
    pub fn evaluate(
        snapshot: &SessionSnapshot,
        route: &RouteRequest,
        policy: &GuardPolicy,
    ) -> GuardDecision {
        if snapshot.is_authenticated() {
            GuardDecision::Allow
        } else {
            GuardDecision::Deny(policy.login_redirect_with_return(&route.requested_path))
        }
    }

    /// Router entry point: waits for settle, then decides.
    pub async fn check(&self, route: &RouteRequest) -> GuardDecision {
        match self.session.wait_settled(self.policy.settle_timeout).await {
            Ok(snapshot) => Self::evaluate(&snapshot, route, &self.policy),
            Err(err) => {
                tracing::warn!(path = %route.requested_path, %err, "denying navigation");
                GuardDecision::Deny(self.policy.login_redirect_with_return(&route.requested_path))
            }
        }
    }

    /// Same decision, evaluated before a lazy route's resources are
    /// fetched, so denied navigations never trigger the load.
    pub async fn check_can_load(&self, route: &RouteRequest) -> GuardDecision {
        self.check(route).await
    }
}

/// Admits anonymous sessions; authenticated users are redirected to the
/// post-login landing page.
pub struct AnonymousGuard {
    session: Arc<SessionManager>,
    policy: GuardPolicy,
}

impl AnonymousGuard {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self::with_policy(session, GuardPolicy::default())
    }

    pub fn with_policy(session: Arc<SessionManager>, policy: GuardPolicy) -> Self {
        Self { session, policy }
    }

    /// Pure decision over a settled snapshot.
    pub fn evaluate(snapshot: &SessionSnapshot, policy: &GuardPolicy) -> GuardDecision {
        if snapshot.is_authenticated() {
            GuardDecision::Deny(Redirect::to(&policy.post_login_path))
        } else {
            GuardDecision::Allow
        }
    }

    /// Router entry point: waits for settle, then decides.
    pub async fn check(&self, route: &RouteRequest) -> GuardDecision {
        match self.session.wait_settled(self.policy.settle_timeout).await {
            Ok(snapshot) => Self::evaluate(&snapshot, &self.policy),
            Err(err) => {
                // An unsettled session is not authenticated; the
                // anonymous-only page is the safe destination.
                tracing::warn!(path = %route.requested_path, %err, "allowing anonymous navigation");
                GuardDecision::Allow
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::identity::MockIdentityProvider;
    use crate::adapters::store::InMemoryProfileStore;
    use crate::ports::IdentityProvider;
    use std::time::Duration;

    async fn authenticated_manager() -> Arc<SessionManager> {
        let provider =
            Arc::new(MockIdentityProvider::new().with_account("alice@example.com", "hunter22"));
        let store = Arc::new(InMemoryProfileStore::new());
        let manager = Arc::new(SessionManager::new(provider, store));
        manager.login("alice@example.com", "hunter22").await.unwrap();
        manager
    }

    async fn anonymous_manager() -> Arc<SessionManager> {
        let provider = Arc::new(MockIdentityProvider::new());
        let store = Arc::new(InMemoryProfileStore::new());
        let manager = Arc::new(SessionManager::new(provider, store));
        manager.attach();
        manager.wait_settled(Duration::from_millis(500)).await.unwrap();
        manager
    }

    #[tokio::test]
    async fn auth_guard_allows_authenticated_session() {
        let guard = AuthGuard::new(authenticated_manager().await);

        let decision = guard.check(&RouteRequest::to("/dashboard")).await;

        assert!(decision.is_allow());
    }

    #[tokio::test]
    async fn auth_guard_denies_anonymous_with_return_url() {
        let guard = AuthGuard::new(anonymous_manager().await);

        let decision = guard.check(&RouteRequest::to("/settings")).await;

        let redirect = decision.redirect().expect("deny");
        assert_eq!(redirect.path, "/login");
        assert_eq!(
            redirect.query,
            vec![("returnUrl".to_string(), "/settings".to_string())]
        );
    }

    #[tokio::test]
    async fn auth_guard_denies_when_session_never_settles() {
        let provider = Arc::new(MockIdentityProvider::new());
        let store = Arc::new(InMemoryProfileStore::new());
        // Never attached: the session stays Loading forever.
        let manager = Arc::new(SessionManager::new(provider, store));
        let policy = GuardPolicy {
            settle_timeout: Duration::from_millis(50),
            ..GuardPolicy::default()
        };
        let guard = AuthGuard::with_policy(manager, policy);

        let decision = guard.check(&RouteRequest::to("/reports")).await;

        assert!(decision.is_deny());
        assert_eq!(decision.redirect().unwrap().path, "/login");
    }

    #[tokio::test]
    async fn auth_guard_can_load_matches_check() {
        let manager = authenticated_manager().await;
        let guard = AuthGuard::new(manager);

        let route = RouteRequest::to("/admin");
        let check = guard.check(&route).await;
        let can_load = guard.check_can_load(&route).await;

        assert_eq!(check, can_load);
    }

    #[tokio::test]
    async fn auth_guard_waits_for_settle_before_deciding() {
        let provider =
            Arc::new(MockIdentityProvider::new().with_account("alice@example.com", "hunter22"));
        let store = Arc::new(InMemoryProfileStore::new());
        let manager = Arc::new(SessionManager::new(provider.clone(), store));
        let guard = AuthGuard::new(Arc::clone(&manager));

        // Sign in first so the seed event carries an identity, then
        // attach: the guard must hold its decision until reconciliation
        // of that seed completes.
        provider.sign_in("alice@example.com", "hunter22").await.unwrap();
        manager.attach();

        let decision = guard.check(&RouteRequest::to("/dashboard")).await;

        assert!(decision.is_allow());
    }

    #[tokio::test]
    async fn anonymous_guard_allows_signed_out_session() {
        let guard = AnonymousGuard::new(anonymous_manager().await);

        let decision = guard.check(&RouteRequest::to("/login")).await;

        assert!(decision.is_allow());
    }

    #[tokio::test]
    async fn anonymous_guard_redirects_authenticated_session() {
        let guard = AnonymousGuard::new(authenticated_manager().await);

        let decision = guard.check(&RouteRequest::to("/login")).await;

        assert_eq!(decision.redirect().unwrap().path, "/dashboard");
    }
}
