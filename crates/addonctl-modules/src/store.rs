//! Persistence seam for addon lifecycle state

use addonctl_core::types::{AddonRecord, AuditEntry};
use anyhow::Result;
use std::collections::BTreeMap;

/// Durable storage of per-addon state
///
/// `save` is called once per committed or failed transition, with the new
/// record of the addon and the audit entry describing the transition.
pub trait StateStore {
    /// Load the latest record of every addon the store knows about
    fn load_all(&self) -> Result<BTreeMap<String, AddonRecord>>;

    /// Persist a record along with its audit entry
    fn save(&mut self, name: &str, record: &AddonRecord, entry: &AuditEntry) -> Result<()>;
}

/// Volatile store for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: BTreeMap<String, AddonRecord>,
    entries: Vec<AuditEntry>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record
    pub fn with_record(mut self, name: impl Into<String>, record: AddonRecord) -> Self {
        self.records.insert(name.into(), record);
        self
    }

    /// Seed an installed addon
    pub fn with_installed(self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.with_record(name, AddonRecord::installed(version))
    }

    pub fn records(&self) -> &BTreeMap<String, AddonRecord> {
        &self.records
    }

    /// Audit entries saved so far, in save order
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }
}

impl StateStore for MemoryStateStore {
    fn load_all(&self) -> Result<BTreeMap<String, AddonRecord>> {
        Ok(self.records.clone())
    }

    fn save(&mut self, name: &str, record: &AddonRecord, entry: &AuditEntry) -> Result<()> {
        self.records.insert(name.to_string(), record.clone());
        self.entries.push(entry.clone());
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for Box<S> {
    fn load_all(&self) -> Result<BTreeMap<String, AddonRecord>> {
        (**self).load_all()
    }

    fn save(&mut self, name: &str, record: &AddonRecord, entry: &AuditEntry) -> Result<()> {
        (**self).save(name, record, entry)
    }
}
