//! Route access guards evaluated before a navigation is permitted.
//!
//! Each guard is a pure predicate over the pending route and the current
//! session snapshot, returning [`GuardDecision::Allow`] or a redirect
//! descriptor. Guards never mutate session state; the only async part is
//! waiting for the session to settle, bounded by
//! [`GuardPolicy::settle_timeout`] (an expired bound denies).
//!
//! - `AuthGuard` / `AnonymousGuard` - authentication state gates
//! - `RoleGuard` / `PermissionGuard` - evaluate the requirement carried
//!   in route data
//! - `AccessGuard` - factory-built guard closed over a fixed
//!   role/permission list

mod access;
mod auth;
mod route;

pub use access::{AccessGuard, PermissionGuard, RoleGuard};
pub use auth::{AnonymousGuard, AuthGuard};
pub use route::{GuardDecision, Redirect, RouteAccessRequirement, RouteRequest};

use std::time::Duration;

/// Redirect targets and settle bound shared by all guards.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    /// Where unauthenticated navigations are sent.
    pub login_path: String,

    /// Where authenticated users land when hitting an anonymous-only route.
    pub post_login_path: String,

    /// Where authenticated-but-insufficient navigations are sent.
    pub unauthorized_path: String,

    /// Upper bound on waiting for the session to settle. Expiry denies
    /// rather than hanging a navigation on a stuck reconciliation.
    pub settle_timeout: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            post_login_path: "/dashboard".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
            settle_timeout: Duration::from_secs(5),
        }
    }
}

impl GuardPolicy {
    /// Login redirect carrying the originally requested path, so the UI
    /// can return there after sign-in.
    pub(crate) fn login_redirect_with_return(&self, requested_path: &str) -> Redirect {
        Redirect::to(&self.login_path).with_param("returnUrl", requested_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_uses_conventional_paths() {
        let policy = GuardPolicy::default();
        assert_eq!(policy.login_path, "/login");
        assert_eq!(policy.post_login_path, "/dashboard");
        assert_eq!(policy.unauthorized_path, "/unauthorized");
    }

    #[test]
    fn login_redirect_carries_return_url() {
        let policy = GuardPolicy::default();
        let redirect = policy.login_redirect_with_return("/admin/settings");
        assert_eq!(redirect.path, "/login");
        assert_eq!(
            redirect.query,
            vec![("returnUrl".to_string(), "/admin/settings".to_string())]
        );
    }
}
