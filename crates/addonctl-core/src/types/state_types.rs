//! Addon lifecycle states, actions and audit entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonState {
    #[default]
    Uninstalled,
    ToInstall,
    Installed,
    ToUpgrade,
    ToRemove,
    Broken,
}

impl AddonState {
    /// Terminal states of a planning round
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AddonState::Installed | AddonState::Uninstalled | AddonState::Broken
        )
    }

    /// Pending states set by a request and cleared by a commit
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            AddonState::ToInstall | AddonState::ToUpgrade | AddonState::ToRemove
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AddonState::Uninstalled => "uninstalled",
            AddonState::ToInstall => "to_install",
            AddonState::Installed => "installed",
            AddonState::ToUpgrade => "to_upgrade",
            AddonState::ToRemove => "to_remove",
            AddonState::Broken => "broken",
        }
    }
}

impl fmt::Display for AddonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action a plan step performs on an addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Install,
    Upgrade,
    Remove,
}

impl Action {
    /// State an addon must be in for the action to be requested
    pub fn origin_state(self) -> AddonState {
        match self {
            Action::Install => AddonState::Uninstalled,
            Action::Upgrade | Action::Remove => AddonState::Installed,
        }
    }

    /// State the addon holds while the action is in flight
    pub fn pending_state(self) -> AddonState {
        match self {
            Action::Install => AddonState::ToInstall,
            Action::Upgrade => AddonState::ToUpgrade,
            Action::Remove => AddonState::ToRemove,
        }
    }

    /// State the addon reaches when the action commits
    pub fn committed_state(self) -> AddonState {
        match self {
            Action::Install | Action::Upgrade => AddonState::Installed,
            Action::Remove => AddonState::Uninstalled,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Upgrade => "upgrade",
            Action::Remove => "remove",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one addon
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddonRecord {
    pub state: AddonState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
}

impl AddonRecord {
    pub fn new(state: AddonState, installed_version: Option<String>) -> Self {
        Self {
            state,
            installed_version,
        }
    }

    pub fn installed(version: impl Into<String>) -> Self {
        Self::new(AddonState::Installed, Some(version.into()))
    }
}

/// One recorded state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID (UUID v4)
    pub entry_id: String,

    /// Transition timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Identifier of the request that caused the transition
    pub request_id: String,

    pub addon: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    pub from: AddonState,

    pub to: AddonState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,

    /// Failure reason for transitions into `broken`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn new(
        request_id: impl Into<String>,
        addon: impl Into<String>,
        action: Option<Action>,
        from: AddonState,
        to: AddonState,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request_id: request_id.into(),
            addon: addon.into(),
            action,
            from,
            to,
            installed_version: None,
            reason: None,
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.installed_version = version;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
