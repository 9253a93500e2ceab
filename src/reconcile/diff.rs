//! Named rule diffing for diff-apply resources.

use std::collections::HashMap;

use crate::resource::NamedRule;

/// Changes that bring a resource's named rules in line with the desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDiff {
    /// Names present on the resource but not desired.
    pub to_delete: Vec<String>,
    /// Desired rules missing from the resource.
    pub to_add: Vec<NamedRule>,
    /// Desired rules whose name exists with different bounds.
    pub to_update: Vec<NamedRule>,
}

impl RuleDiff {
    /// Compare current and desired rules by name.
    ///
    /// Output order follows the input order, so the same inputs always give
    /// the same sequence of calls.
    #[must_use]
    pub fn compute(current: &[NamedRule], desired: &[NamedRule]) -> Self {
        let current_by_name: HashMap<&str, &NamedRule> =
            current.iter().map(|r| (r.name.as_str(), r)).collect();
        let desired_by_name: HashMap<&str, &NamedRule> =
            desired.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut diff = Self::default();
        for rule in current {
            if !desired_by_name.contains_key(rule.name.as_str()) && !diff.to_delete.contains(&rule.name) {
                diff.to_delete.push(rule.name.clone());
            }
        }
        for rule in desired {
            match current_by_name.get(rule.name.as_str()) {
                None => diff.to_add.push(rule.clone()),
                Some(existing) if !existing.same_bounds(rule) => diff.to_update.push(rule.clone()),
                Some(_) => {},
            }
        }
        diff
    }

    /// Whether nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty() && self.to_update.is_empty()
    }

    /// Number of adapter calls the diff takes to apply.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.to_delete.len() + self.to_add.len() + self.to_update.len()
    }

    /// Rules to write, additions first.
    pub fn writes(&self) -> impl Iterator<Item = &NamedRule> {
        self.to_add.iter().chain(&self.to_update)
    }
}
