//! Authorization strategy
//!
//! The engine asks one injected [`Authorizer`] whether a principal may
//! decide an approval. Group membership and permissions are the
//! authorizer's business; the rule itself lives on the approval.

use approval_workflow_types::{Authorization, GroupId, Permission, PrincipalId};
use std::collections::{BTreeSet, HashMap};

/// Decides whether a principal satisfies an approval's rule
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, principal: &PrincipalId, rule: &Authorization) -> bool;
}

/// Admits every principal for every rule
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _principal: &PrincipalId, _rule: &Authorization) -> bool {
        true
    }
}

#[derive(Clone, Debug, Default)]
struct Profile {
    groups: BTreeSet<GroupId>,
    permissions: BTreeSet<Permission>,
}

/// In-memory directory of group memberships and held permissions.
///
/// Unknown principals have no groups and no permissions, so they only
/// pass unrestricted rules and rules naming them individually.
#[derive(Clone, Debug, Default)]
pub struct DirectoryAuthorizer {
    profiles: HashMap<PrincipalId, Profile>,
}

impl DirectoryAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(mut self, principal: impl Into<String>, group: impl Into<String>) -> Self {
        self.add_member(principal, group);
        self
    }

    pub fn with_permission(
        mut self,
        principal: impl Into<String>,
        permission: impl Into<String>,
    ) -> Self {
        self.grant(principal, permission);
        self
    }

    pub fn add_member(&mut self, principal: impl Into<String>, group: impl Into<String>) {
        self.profiles
            .entry(PrincipalId::new(principal))
            .or_default()
            .groups
            .insert(GroupId::new(group));
    }

    pub fn grant(&mut self, principal: impl Into<String>, permission: impl Into<String>) {
        self.profiles
            .entry(PrincipalId::new(principal))
            .or_default()
            .permissions
            .insert(Permission::new(permission));
    }

    pub fn groups_of(&self, principal: &PrincipalId) -> BTreeSet<GroupId> {
        self.profiles
            .get(principal)
            .map(|p| p.groups.clone())
            .unwrap_or_default()
    }
}

impl Authorizer for DirectoryAuthorizer {
    fn is_authorized(&self, principal: &PrincipalId, rule: &Authorization) -> bool {
        match self.profiles.get(principal) {
            Some(profile) => rule.admits(principal, &profile.groups, &profile.permissions),
            None => rule.admits(principal, &BTreeSet::new(), &BTreeSet::new()),
        }
    }
}
