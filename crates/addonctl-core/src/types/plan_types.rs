//! Execution plan types

use crate::types::Action;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One ordered step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanStep {
    pub addon: String,
    pub action: Action,
}

impl PlanStep {
    pub fn new(addon: impl Into<String>, action: Action) -> Self {
        Self {
            addon: addon.into(),
            action,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.addon)
    }
}

/// Ordered execution plan
///
/// Removes come first in reverse dependency order, then installs and
/// upgrades in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,

    /// Addons added to the remove side because they depend on a requested removal
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implied_removals: Vec<String>,

    /// Addons added to the install side by auto-install rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_installed: Vec<String>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            steps,
            implied_removals: Vec::new(),
            auto_installed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlanStep> {
        self.steps.iter()
    }

    /// Position of the step touching an addon
    pub fn position(&self, addon: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.addon == addon)
    }

    /// Action planned for an addon
    pub fn action_for(&self, addon: &str) -> Option<Action> {
        self.steps.iter().find(|s| s.addon == addon).map(|s| s.action)
    }

    /// Addon names with the given action, in plan order
    pub fn addons_with(&self, action: Action) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.action == action)
            .map(|s| s.addon.as_str())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a PlanStep;
    type IntoIter = std::slice::Iter<'a, PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
