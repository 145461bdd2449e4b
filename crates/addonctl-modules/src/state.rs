//! Addon lifecycle state machine
//!
//! Legal transitions:
//!
//! ```text
//! uninstalled --request(install)--> to_install --commit--> installed
//! installed   --request(upgrade)--> to_upgrade --commit--> installed
//! installed   --request(remove)---> to_remove  --commit--> uninstalled
//! any         --fail--------------> broken
//! ```
//!
//! Requests are in-memory only. The store is written on commit and on
//! failure, never in between.

use crate::store::StateStore;
use addonctl_core::types::{
    Action, AddonRecord, AddonState, AuditEntry, Diagnostic, DiagnosticCode, Diagnostics,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Read access to current addon states
pub trait StateView {
    /// Current state of an addon; unknown addons are uninstalled
    fn state(&self, name: &str) -> AddonState;
}

impl StateView for BTreeMap<String, AddonState> {
    fn state(&self, name: &str) -> AddonState {
        self.get(name).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    action: Action,
    prior: AddonState,
}

/// Tracks every addon's state and persists transitions through a [`StateStore`]
#[derive(Debug)]
pub struct StateMachine<S: StateStore> {
    store: S,
    records: BTreeMap<String, AddonRecord>,
    pending: BTreeMap<String, Pending>,
    request_id: String,
    audit: Vec<AuditEntry>,
    load_diagnostics: Diagnostics,
}

impl<S: StateStore> StateMachine<S> {
    /// Load records from the store with a fresh request identifier
    ///
    /// Transient states left by an interrupted run are reset to the state
    /// they came from (`to_install` to `uninstalled`, `to_upgrade` and
    /// `to_remove` to `installed`), each with a `StaleTransientState`
    /// warning. The reset is not written back until a later commit.
    pub fn load(store: S) -> Result<Self, Diagnostic> {
        Self::load_with_request_id(store, uuid::Uuid::new_v4().to_string())
    }

    pub fn load_with_request_id(
        store: S,
        request_id: impl Into<String>,
    ) -> Result<Self, Diagnostic> {
        let mut records = store.load_all().map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::StateStoreFailed,
                format!("failed to load addon state: {:#}", e),
            )
        })?;

        let mut load_diagnostics = Diagnostics::new();
        for (name, record) in records.iter_mut() {
            let reset = match record.state {
                AddonState::ToInstall => AddonState::Uninstalled,
                AddonState::ToUpgrade | AddonState::ToRemove => AddonState::Installed,
                _ => continue,
            };
            warn!(
                "Addon '{}' was left in {} by an interrupted run; treating it as {}",
                name, record.state, reset
            );
            load_diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::StaleTransientState,
                    format!(
                        "stored state {} was left by an interrupted run, reset to {}",
                        record.state, reset
                    ),
                )
                .for_addon(name)
                .with_context("stored", record.state)
                .with_context("reset", reset),
            );
            record.state = reset;
        }

        Ok(Self {
            store,
            records,
            pending: BTreeMap::new(),
            request_id: request_id.into(),
            audit: Vec::new(),
            load_diagnostics,
        })
    }

    /// Diagnostics produced while loading
    pub fn load_diagnostics(&self) -> &Diagnostics {
        &self.load_diagnostics
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Current state, including pending requests
    pub fn current(&self, name: &str) -> AddonState {
        if let Some(pending) = self.pending.get(name) {
            return pending.action.pending_state();
        }
        self.records
            .get(name)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    /// Installed version recorded for an addon
    pub fn installed_version(&self, name: &str) -> Option<&str> {
        self.records
            .get(name)
            .and_then(|r| r.installed_version.as_deref())
    }

    /// Committed records, ordered by name
    pub fn records(&self) -> &BTreeMap<String, AddonRecord> {
        &self.records
    }

    /// Current state of every addon the machine knows about
    pub fn snapshot(&self) -> BTreeMap<String, AddonState> {
        self.records
            .keys()
            .chain(self.pending.keys())
            .map(|name| (name.clone(), self.current(name)))
            .collect()
    }

    /// Transitions made through this machine, persisted or not
    pub fn audit(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Move an addon into the pending state for `action`
    ///
    /// Legal only from `action.origin_state()`. Nothing is persisted.
    pub fn request(&mut self, name: &str, action: Action) -> Result<(), Diagnostic> {
        let from = self.current(name);
        if from != action.origin_state() {
            return Err(Diagnostic::new(
                DiagnosticCode::IllegalTransition,
                format!("cannot {} '{}' while it is {}", action, name, from),
            )
            .for_addon(name)
            .with_context("action", action)
            .with_context("from", from));
        }

        let to = action.pending_state();
        debug!("{}: {} -> {}", name, from, to);
        self.pending.insert(
            name.to_string(),
            Pending {
                action,
                prior: from,
            },
        );
        self.audit
            .push(AuditEntry::new(&self.request_id, name, Some(action), from, to));
        Ok(())
    }

    /// Commit the pending action, keeping any recorded installed version
    pub fn commit(&mut self, name: &str) -> Result<AddonState, Diagnostic> {
        let version = self.installed_version(name).map(str::to_string);
        self.commit_version(name, version)
    }

    /// Commit the pending action and persist the new record
    ///
    /// Install and upgrade record `version` as installed; remove clears it.
    /// If the store write fails the addon stays pending and
    /// `StateStoreFailed` is returned.
    pub fn commit_version(
        &mut self,
        name: &str,
        version: Option<String>,
    ) -> Result<AddonState, Diagnostic> {
        let Some(pending) = self.pending.get(name).copied() else {
            let from = self.current(name);
            return Err(Diagnostic::new(
                DiagnosticCode::IllegalTransition,
                format!("cannot commit '{}': no action was requested (state {})", name, from),
            )
            .for_addon(name)
            .with_context("from", from));
        };

        let from = pending.action.pending_state();
        let to = pending.action.committed_state();
        let installed_version = match pending.action {
            Action::Install | Action::Upgrade => version,
            Action::Remove => None,
        };
        let record = AddonRecord::new(to, installed_version.clone());
        let entry = AuditEntry::new(&self.request_id, name, Some(pending.action), from, to)
            .with_version(installed_version);

        self.persist(name, &record, &entry)?;

        debug!("{}: {} -> {}", name, from, to);
        self.pending.remove(name);
        self.records.insert(name.to_string(), record);
        self.audit.push(entry);
        Ok(to)
    }

    /// Mark an addon broken and persist it
    ///
    /// The audit entry keeps the state the addon was in when it failed.
    pub fn fail(&mut self, name: &str, reason: impl Into<String>) -> Result<(), Diagnostic> {
        let from = self.current(name);
        let action = self.pending.get(name).map(|p| p.action);
        let prior = self.pending.get(name).map(|p| p.prior).unwrap_or(from);
        let installed_version = self.installed_version(name).map(str::to_string);

        let record = AddonRecord::new(AddonState::Broken, installed_version.clone());
        let entry = AuditEntry::new(&self.request_id, name, action, from, AddonState::Broken)
            .with_version(installed_version)
            .with_reason(reason);

        self.persist(name, &record, &entry)?;

        warn!("{}: {} -> broken (was {})", name, from, prior);
        self.pending.remove(name);
        self.records.insert(name.to_string(), record);
        self.audit.push(entry);
        Ok(())
    }

    fn persist(
        &mut self,
        name: &str,
        record: &AddonRecord,
        entry: &AuditEntry,
    ) -> Result<(), Diagnostic> {
        self.store.save(name, record, entry).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::StateStoreFailed,
                format!("failed to persist state of '{}': {:#}", name, e),
            )
            .for_addon(name)
        })
    }
}

impl<S: StateStore> StateView for StateMachine<S> {
    fn state(&self, name: &str) -> AddonState {
        self.current(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;

    fn machine(store: MemoryStateStore) -> StateMachine<MemoryStateStore> {
        StateMachine::load_with_request_id(store, "req-test").unwrap()
    }

    #[test]
    fn test_install_lifecycle() {
        let mut sm = machine(MemoryStateStore::new());
        assert_eq!(sm.current("sale"), AddonState::Uninstalled);

        sm.request("sale", Action::Install).unwrap();
        assert_eq!(sm.current("sale"), AddonState::ToInstall);
        assert!(sm.store().entries().is_empty(), "request must not persist");

        let state = sm.commit_version("sale", Some("16.0.1.0".to_string())).unwrap();
        assert_eq!(state, AddonState::Installed);
        assert_eq!(sm.installed_version("sale"), Some("16.0.1.0"));

        let saved = sm.store().entries();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].from, AddonState::ToInstall);
        assert_eq!(saved[0].to, AddonState::Installed);
        assert_eq!(saved[0].request_id, "req-test");
        assert_eq!(sm.audit().len(), 2);
    }

    #[test]
    fn test_remove_clears_version() {
        let mut sm = machine(MemoryStateStore::new().with_installed("sale", "1.0"));
        sm.request("sale", Action::Remove).unwrap();
        assert_eq!(sm.commit("sale").unwrap(), AddonState::Uninstalled);
        assert_eq!(sm.installed_version("sale"), None);
    }

    #[test]
    fn test_commit_keeps_version_on_upgrade_without_new_one() {
        let mut sm = machine(MemoryStateStore::new().with_installed("sale", "1.0"));
        sm.request("sale", Action::Upgrade).unwrap();
        sm.commit("sale").unwrap();
        assert_eq!(sm.installed_version("sale"), Some("1.0"));
    }

    #[test]
    fn test_illegal_transitions() {
        let mut sm = machine(MemoryStateStore::new().with_installed("sale", "1.0"));

        let err = sm.request("sale", Action::Install).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::IllegalTransition);

        let err = sm.request("crm", Action::Remove).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::IllegalTransition);

        let err = sm.commit("sale").unwrap_err();
        assert_eq!(err.code, DiagnosticCode::IllegalTransition);

        sm.request("sale", Action::Upgrade).unwrap();
        let err = sm.request("sale", Action::Upgrade).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::IllegalTransition);
    }

    #[test]
    fn test_broken_is_absorbing() {
        let mut sm = machine(MemoryStateStore::new());
        sm.request("sale", Action::Install).unwrap();
        sm.fail("sale", "post_init_hook raised").unwrap();
        assert_eq!(sm.current("sale"), AddonState::Broken);

        let saved = sm.store().entries();
        assert_eq!(saved[0].from, AddonState::ToInstall);
        assert_eq!(saved[0].reason.as_deref(), Some("post_init_hook raised"));

        for action in [Action::Install, Action::Upgrade, Action::Remove] {
            assert!(sm.request("sale", action).is_err());
        }
    }

    #[test]
    fn test_stale_transient_states_reset() {
        let store = MemoryStateStore::new()
            .with_record("a", AddonRecord::new(AddonState::ToInstall, None))
            .with_record("b", AddonRecord::new(AddonState::ToUpgrade, Some("1.0".into())))
            .with_record("c", AddonRecord::new(AddonState::ToRemove, Some("1.0".into())))
            .with_installed("d", "1.0");
        let sm = machine(store);

        assert_eq!(sm.current("a"), AddonState::Uninstalled);
        assert_eq!(sm.current("b"), AddonState::Installed);
        assert_eq!(sm.current("c"), AddonState::Installed);
        assert_eq!(sm.load_diagnostics().len(), 3);
        assert!(sm.store().entries().is_empty());
    }

    #[test]
    fn test_snapshot_includes_pending() {
        let mut sm = machine(MemoryStateStore::new().with_installed("base", "1.0"));
        sm.request("sale", Action::Install).unwrap();
        let snapshot = sm.snapshot();
        assert_eq!(snapshot["base"], AddonState::Installed);
        assert_eq!(snapshot["sale"], AddonState::ToInstall);
    }
}
