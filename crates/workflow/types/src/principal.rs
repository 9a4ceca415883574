//! Principals and authorization rules
//!
//! Who may decide an approval is described by an [`Authorization`]:
//! a set of individual principals, a set of groups and a set of
//! permissions. Membership and permission lookups belong to the
//! identity provider; this module only carries the rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity of a user (or service) acting on a workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named group of principals
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A permission code, conventionally `app.codename`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission(pub String);

impl Permission {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The principals allowed to decide an approval.
///
/// A principal qualifies if it is listed individually, belongs to a
/// listed group, or holds a listed permission. An empty rule admits
/// everyone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub principals: BTreeSet<PrincipalId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<GroupId>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub permissions: BTreeSet<Permission>,
}

impl Authorization {
    /// A rule that admits everyone
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principals.insert(PrincipalId::new(principal));
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(GroupId::new(group));
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(Permission::new(permission));
        self
    }

    /// True when no restriction of any kind is set
    pub fn is_unrestricted(&self) -> bool {
        self.principals.is_empty() && self.groups.is_empty() && self.permissions.is_empty()
    }

    /// Evaluate the rule against an already-resolved principal profile.
    pub fn admits(
        &self,
        principal: &PrincipalId,
        groups: &BTreeSet<GroupId>,
        permissions: &BTreeSet<Permission>,
    ) -> bool {
        if self.is_unrestricted() || self.principals.contains(principal) {
            return true;
        }
        !self.groups.is_disjoint(groups) || !self.permissions.is_disjoint(permissions)
    }
}
