//! Native rule shapes submitted to resource adapters.

use std::fmt;
use std::net::IpAddr;

/// Action taken by a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Let matching traffic through.
    Allow,
    /// Reject matching traffic.
    Block,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "Allow"),
            Self::Block => write!(f, "Block"),
        }
    }
}

/// A remote-address match rule of an edge firewall policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WafRule {
    /// Rule name, unique within the policy.
    pub name: String,
    /// Evaluation order; lower runs first.
    pub priority: u32,
    /// Action on match.
    pub action: RuleAction,
    /// Addresses or ranges matched against the remote address.
    pub match_values: Vec<String>,
}

/// Enforcement mode of an edge firewall policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WafMode {
    /// Matching block rules reject traffic.
    Prevention,
    /// Matches are logged only.
    Detection,
}

impl fmt::Display for WafMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prevention => write!(f, "Prevention"),
            Self::Detection => write!(f, "Detection"),
        }
    }
}

/// A provider-managed rule set enabled on a firewall policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRuleSet {
    /// Rule set type, e.g. `Microsoft_BotManagerRuleSet`.
    pub rule_set_type: String,
    /// Rule set version.
    pub version: String,
}

/// A complete edge firewall policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WafPolicy {
    /// Enforcement mode.
    pub mode: WafMode,
    /// Status code returned for blocked requests.
    pub block_status: u16,
    /// Rules in priority order.
    pub rules: Vec<WafRule>,
    /// Managed rule sets kept enabled alongside the custom rules.
    pub managed_rule_sets: Vec<ManagedRuleSet>,
}

/// A complete rule list for a full-replace resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullRuleSet {
    /// Firewall policy whose rules end in a block-all rule.
    Waf(WafPolicy),
    /// Flat list of allowed addresses or ranges; anything else is denied.
    AddressList(Vec<String>),
}

impl FullRuleSet {
    /// Number of address entries across all rules.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Waf(policy) => policy.rules.iter().map(|r| r.match_values.len()).sum(),
            Self::AddressList(entries) => entries.len(),
        }
    }
}

/// A named start/end address rule of a diff-apply resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedRule {
    /// Rule name derived from the bounds.
    pub name: String,
    /// First allowed address.
    pub start: IpAddr,
    /// Last allowed address.
    pub end: IpAddr,
}

impl NamedRule {
    /// Whether two rules cover the same addresses.
    #[must_use]
    pub fn same_bounds(&self, other: &NamedRule) -> bool {
        self.start == other.start && self.end == other.end
    }
}
