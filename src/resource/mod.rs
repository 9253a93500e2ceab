//! # Protected Resources
//!
//! Definitions of the external systems whose access control accepts
//! address-range allow rules, and the native rule shapes each one takes.
//!
//! A resource's [`ResourceKind`] is resolved from configuration once, at
//! load time, and fixes how it is reconciled ([`Strategy`]).

mod kind;
mod rules;

use std::fmt;

use ipnet::IpNet;

use crate::identity::GroupSet;

pub use kind::{ResourceKind, Strategy};
pub use rules::{
    FullRuleSet, ManagedRuleSet, NamedRule, RuleAction, WafMode, WafPolicy, WafRule,
};

/// Provider coordinates of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    /// Subscription (account) the resource lives in.
    pub subscription_id: String,
    /// Resource group.
    pub resource_group: String,
    /// Resource or policy name.
    pub name: String,
}

impl ResourceIdentity {
    /// Create resource coordinates.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subscription_id, self.resource_group, self.name
        )
    }
}

/// A resource whose access rules are kept in sync with the grant store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedResource {
    /// Resource type.
    pub kind: ResourceKind,
    /// Provider coordinates.
    pub identity: ResourceIdentity,
    /// Ranges that are always allowed and never expire.
    pub static_allow_list: Vec<IpNet>,
    /// Groups whose members' grants apply here; empty means every grant.
    pub required_groups: GroupSet,
}

impl ProtectedResource {
    /// Create a resource with no static entries and no group restriction.
    #[must_use]
    pub fn new(kind: ResourceKind, identity: ResourceIdentity) -> Self {
        Self {
            kind,
            identity,
            static_allow_list: Vec::new(),
            required_groups: GroupSet::new(),
        }
    }

    /// Add always-allowed ranges.
    #[must_use]
    pub fn with_static_allow_list(mut self, entries: impl IntoIterator<Item = IpNet>) -> Self {
        self.static_allow_list.extend(entries);
        self
    }

    /// Restrict dynamic grants to members of these groups.
    #[must_use]
    pub fn with_required_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_groups
            .extend(groups.into_iter().map(Into::into));
        self
    }

    /// Whether the resource admits a grant held by members of `groups`.
    #[must_use]
    pub fn admits(&self, groups: Option<&GroupSet>) -> bool {
        if self.required_groups.is_empty() {
            return true;
        }
        groups.is_some_and(|groups| !self.required_groups.is_disjoint(groups))
    }

    /// How the resource is reconciled.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.kind.strategy()
    }
}

impl fmt::Display for ProtectedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.kind, self.identity.resource_group, self.identity.name
        )
    }
}
