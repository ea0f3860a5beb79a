//! Role and permission guards.
//!
//! `RoleGuard` and `PermissionGuard` evaluate the requirement carried in
//! route data; `AccessGuard` is the factory-built variant closed over a
//! fixed list. All three require authentication first: an anonymous
//! session is sent to login without any role/permission check, an
//! authenticated-but-insufficient one to the unauthorized page.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::application::SessionManager;
use crate::domain::foundation::Role;
use crate::domain::session::SessionSnapshot;

use super::route::{GuardDecision, Redirect, RouteRequest};
use super::GuardPolicy;

/// Membership test shared by the role and permission guards.
///
/// An absent or empty requirement allows: no requirement means no
/// constraint, and an all-of check over the empty set is vacuously true.
fn satisfies<T: Ord>(held: &BTreeSet<T>, required: Option<&BTreeSet<T>>, require_all: bool) -> bool {
    let Some(required) = required else {
        return true;
    };
    if required.is_empty() {
        return true;
    }
    if require_all {
        required.iter().all(|r| held.contains(r))
    } else {
        required.iter().any(|r| held.contains(r))
    }
}

fn decide(
    snapshot: &SessionSnapshot,
    policy: &GuardPolicy,
    satisfied: bool,
) -> GuardDecision {
    if !snapshot.is_authenticated() {
        return GuardDecision::Deny(Redirect::to(&policy.login_path));
    }
    if satisfied {
        GuardDecision::Allow
    } else {
        GuardDecision::Deny(Redirect::to(&policy.unauthorized_path))
    }
}

/// Evaluates the role requirement carried in route data.
pub struct RoleGuard {
    session: Arc<SessionManager>,
    policy: GuardPolicy,
}

impl RoleGuard {
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
        let satisfied = satisfies(
            &snapshot.roles(),
            route.data.roles.as_ref(),
            route.data.require_all,
        );
        decide(snapshot, policy, satisfied)
    }

    /// Router entry point: waits for settle, then decides.
    pub async fn check(&self, route: &RouteRequest) -> GuardDecision {
        match self.session.wait_settled(self.policy.settle_timeout).await {
            Ok(snapshot) => Self::evaluate(&snapshot, route, &self.policy),
            Err(err) => {
                tracing::warn!(path = %route.requested_path, %err, "denying navigation");
                GuardDecision::Deny(Redirect::to(&self.policy.login_path))
            }
        }
    }
}

/// Evaluates the permission requirement carried in route data.
pub struct PermissionGuard {
    session: Arc<SessionManager>,
    policy: GuardPolicy,
}

impl PermissionGuard {
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
        let satisfied = satisfies(
            &snapshot.permissions(),
            route.data.permissions.as_ref(),
            route.data.require_all,
        );
        decide(snapshot, policy, satisfied)
    }

    /// Router entry point: waits for settle, then decides.
    pub async fn check(&self, route: &RouteRequest) -> GuardDecision {
        match self.session.wait_settled(self.policy.settle_timeout).await {
            Ok(snapshot) => Self::evaluate(&snapshot, route, &self.policy),
            Err(err) => {
                tracing::warn!(path = %route.requested_path, %err, "denying navigation");
                GuardDecision::Deny(Redirect::to(&self.policy.login_path))
            }
        }
    }
}

/// Fixed requirement an [`AccessGuard`] was built over.
#[derive(Debug, Clone)]
enum FixedRequirement {
    Roles(BTreeSet<Role>),
    Permissions(BTreeSet<String>),
}

/// Guard closed over a fixed role or permission list.
///
/// Built for routes whose requirements are known at registration time;
/// route data is ignored. Matching is any-of, with the same
/// authentication precondition as the data-driven guards.
pub struct AccessGuard {
    session: Arc<SessionManager>,
    policy: GuardPolicy,
    required: FixedRequirement,
}

impl AccessGuard {
    /// Guard admitting sessions holding any of the given roles.
    pub fn any_role(
        session: Arc<SessionManager>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            session,
            policy: GuardPolicy::default(),
            required: FixedRequirement::Roles(roles.into_iter().collect()),
        }
    }

    /// Guard admitting sessions holding any of the given permissions.
    pub fn any_permission(
        session: Arc<SessionManager>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            session,
            policy: GuardPolicy::default(),
            required: FixedRequirement::Permissions(
                permissions.into_iter().map(Into::into).collect(),
            ),
        }
    }

    /// Overrides the redirect/timeout policy.
    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn evaluate(&self, snapshot: &SessionSnapshot) -> GuardDecision {
        let satisfied = match &self.required {
            FixedRequirement::Roles(roles) => satisfies(&snapshot.roles(), Some(roles), false),
            FixedRequirement::Permissions(permissions) => {
                satisfies(&snapshot.permissions(), Some(permissions), false)
            }
        };
        decide(snapshot, &self.policy, satisfied)
    }

    /// Router entry point: waits for settle, then decides. Route data is
    /// ignored; only the requested path is used for logging.
    pub async fn check(&self, route: &RouteRequest) -> GuardDecision {
        match self.session.wait_settled(self.policy.settle_timeout).await {
            Ok(snapshot) => self.evaluate(&snapshot),
            Err(err) => {
                tracing::warn!(path = %route.requested_path, %err, "denying navigation");
                GuardDecision::Deny(Redirect::to(&self.policy.login_path))
            }
        }
    }
}
