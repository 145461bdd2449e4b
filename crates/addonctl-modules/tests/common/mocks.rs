//! Mock collaborators for executor tests
//!
//! Every mock records into a shared call log so tests can assert on the
//! exact order hooks, data loads and store writes happened in.

#![allow(dead_code)]

use addonctl_core::types::{Action, AddonRecord, AuditEntry};
use addonctl_modules::{Addon, DataApplier, Hook, HookContext, HookResolver, Resources, StateStore};
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

/// Shared, ordered record of collaborator calls
#[derive(Clone, Default, Debug)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Resolves every entrypoint to a hook that records `"<kind> <addon>"`
///
/// Entrypoints listed in `failing` raise; those in `missing` do not resolve.
#[derive(Clone, Default)]
pub struct RecordingHooks {
    pub log: CallLog,
    failing: BTreeSet<String>,
    missing: BTreeSet<String>,
}

impl RecordingHooks {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failing: BTreeSet::new(),
            missing: BTreeSet::new(),
        }
    }

    pub fn failing(mut self, entrypoint: &str) -> Self {
        self.failing.insert(entrypoint.to_string());
        self
    }

    pub fn missing(mut self, entrypoint: &str) -> Self {
        self.missing.insert(entrypoint.to_string());
        self
    }
}

impl HookResolver for RecordingHooks {
    fn resolve(&self, _addon: &str, entrypoint: &str) -> Option<Hook> {
        if self.missing.contains(entrypoint) {
            return None;
        }
        let log = self.log.clone();
        let fail = self.failing.contains(entrypoint);
        Some(Box::new(move |ctx: &HookContext<'_>| {
            log.push(format!("{} {}", ctx.kind, ctx.addon.name));
            if fail {
                Err(anyhow!("{} raised", ctx.entrypoint))
            } else {
                Ok(())
            }
        }))
    }
}

/// Records `"data <action> <addon> <n files>"`; fails for addons in `failing`
#[derive(Clone, Default)]
pub struct RecordingApplier {
    pub log: CallLog,
    failing: BTreeSet<String>,
}

impl RecordingApplier {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failing: BTreeSet::new(),
        }
    }

    pub fn failing(mut self, addon: &str) -> Self {
        self.failing.insert(addon.to_string());
        self
    }
}

impl DataApplier for RecordingApplier {
    fn apply(&mut self, addon: &Addon, action: Action, resources: Resources<'_>) -> Result<()> {
        self.log.push(format!(
            "data {} {} {}",
            action,
            addon.name,
            resources.data.len() + resources.demo.len()
        ));
        if self.failing.contains(&addon.name) {
            return Err(anyhow!("error loading data of {}", addon.name));
        }
        Ok(())
    }
}

/// In-memory store that logs saves and can refuse writes for named addons
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub log: CallLog,
    records: BTreeMap<String, AddonRecord>,
    refuse: BTreeSet<String>,
    pub saved: Vec<AuditEntry>,
}

impl FlakyStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn with_installed(mut self, name: &str, version: &str) -> Self {
        self.records
            .insert(name.to_string(), AddonRecord::installed(version));
        self
    }

    pub fn refusing(mut self, name: &str) -> Self {
        self.refuse.insert(name.to_string());
        self
    }
}

impl StateStore for FlakyStore {
    fn load_all(&self) -> Result<BTreeMap<String, AddonRecord>> {
        Ok(self.records.clone())
    }

    fn save(&mut self, name: &str, record: &AddonRecord, entry: &AuditEntry) -> Result<()> {
        if self.refuse.contains(name) {
            return Err(anyhow!("disk full"));
        }
        self.log.push(format!("save {} {}", name, record.state));
        self.records.insert(name.to_string(), record.clone());
        self.saved.push(entry.clone());
        Ok(())
    }
}
