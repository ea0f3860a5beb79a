//! Route descriptors exchanged with the router.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Role;

/// Access requirement attached to a navigation target by the route table.
///
/// Absence of both fields means the route is unconditionally allowed once
/// authenticated. An explicitly empty set behaves the same: a
/// `require_all` check over an empty set is vacuously true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteAccessRequirement {
    #[serde(default)]
    pub roles: Option<BTreeSet<Role>>,

    #[serde(default)]
    pub permissions: Option<BTreeSet<String>>,

    /// When set, every listed role/permission must be held; otherwise any
    /// single match suffices.
    #[serde(default)]
    pub require_all: bool,
}

impl RouteAccessRequirement {
    /// Requirement that any of the given roles is held.
    pub fn any_role(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: Some(roles.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Requirement that any of the given permissions is held.
    pub fn any_permission(permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            permissions: Some(permissions.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Switches the requirement to all-of semantics.
    pub fn all_required(mut self) -> Self {
        self.require_all = true;
        self
    }
}

/// Pending navigation presented to a guard.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub requested_path: String,
    pub data: RouteAccessRequirement,
}

impl RouteRequest {
    /// Navigation to a path with no access requirement.
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            requested_path: path.into(),
            data: RouteAccessRequirement::default(),
        }
    }

    /// Attaches route data.
    pub fn with_data(mut self, data: RouteAccessRequirement) -> Self {
        self.data = data;
        self
    }
}

/// Redirect descriptor produced on denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Redirect {
    /// Redirect to a path with no query parameters.
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Outcome of a guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The navigation may proceed.
    Allow,
    /// The navigation is denied and the router should redirect.
    Deny(Redirect),
}

impl GuardDecision {
    /// Returns true if the navigation is allowed.
    pub fn is_allow(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    /// Returns true if the navigation is denied.
    pub fn is_deny(&self) -> bool {
        !self.is_allow()
    }

    /// The redirect descriptor, when denied.
    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::Deny(redirect) => Some(redirect),
        }
    }
}
