//! Append-only JSONL state ledger
//!
//! Every persisted transition is one [`AuditEntry`] line. The current state
//! of an addon is the last entry for it in file order.

use crate::store::StateStore;
use addonctl_core::types::{AddonRecord, AddonState, AuditEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Default number of entries shown in tail mode
pub const DEFAULT_LOG_TAIL_LINES: usize = 25;

/// Filter criteria for querying the ledger
#[derive(Debug, Default, Clone)]
pub struct EntryFilter {
    /// Only entries for this addon
    pub addon: Option<String>,
    /// Only entries written by this request
    pub request_id: Option<String>,
    /// Only entries transitioning into one of these states
    pub to_states: Option<Vec<AddonState>>,
    /// Only entries after this timestamp
    pub since: Option<DateTime<Utc>>,
    /// Only entries before this timestamp
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of entries to return
    pub limit: Option<usize>,
    /// If true, return the most recent N entries (tail mode)
    pub reverse: bool,
}

/// Ledger statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_entries: usize,
    pub addons: usize,
    pub file_size_bytes: u64,
    pub oldest_timestamp: Option<DateTime<Utc>>,
    pub newest_timestamp: Option<DateTime<Utc>>,
}

/// File-backed [`StateStore`]
#[derive(Debug, Clone)]
pub struct LedgerStateStore {
    ledger_path: PathBuf,
}

impl LedgerStateStore {
    pub fn new(ledger_path: impl Into<PathBuf>) -> Self {
        Self {
            ledger_path: ledger_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.ledger_path
    }

    /// Append an entry (file-locked, synced to disk)
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.ledger_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create ledger parent directory")?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.ledger_path)
            .with_context(|| format!("Failed to open ledger {}", self.ledger_path.display()))?;

        // Released on drop
        file.lock_exclusive()
            .context("Failed to acquire exclusive lock on ledger")?;

        let line = serde_json::to_string(entry).context("Failed to serialize audit entry")?;
        writeln!(file, "{}", line).context("Failed to write audit entry to ledger")?;
        file.sync_all().context("Failed to sync ledger file")?;

        Ok(())
    }

    /// Read every entry in file order
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        if !self.ledger_path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.ledger_path)
            .with_context(|| format!("Failed to open ledger {}", self.ledger_path.display()))?;
        file.lock_shared()
            .context("Failed to acquire shared lock on ledger")?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line from ledger")?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse ledger line {}", number + 1)
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Entries for one addon, chronological; `limit` keeps the most recent
    pub fn history(&self, addon: &str, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        self.query(EntryFilter {
            addon: Some(addon.to_string()),
            limit,
            reverse: true,
            ..Default::default()
        })
    }

    /// Query entries with filtering
    pub fn query(&self, filter: EntryFilter) -> Result<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self
            .entries()?
            .into_iter()
            .filter(|e| filter.addon.as_ref().map_or(true, |a| &e.addon == a))
            .filter(|e| {
                filter
                    .request_id
                    .as_ref()
                    .map_or(true, |r| &e.request_id == r)
            })
            .filter(|e| {
                filter
                    .to_states
                    .as_ref()
                    .map_or(true, |states| states.contains(&e.to))
            })
            .filter(|e| filter.since.map_or(true, |since| e.timestamp >= since))
            .filter(|e| filter.until.map_or(true, |until| e.timestamp <= until))
            .collect();

        // Tail mode: last N entries, still chronological
        if let Some(limit) = filter.limit {
            if filter.reverse {
                if entries.len() > limit {
                    entries = entries.split_off(entries.len() - limit);
                }
            } else {
                entries.truncate(limit);
            }
        }

        Ok(entries)
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let entries = self.entries()?;
        if entries.is_empty() {
            return Ok(LedgerStats::default());
        }

        let file_size_bytes = fs::metadata(&self.ledger_path)
            .context("Failed to get ledger file metadata")?
            .len();
        let addons = entries
            .iter()
            .map(|e| e.addon.as_str())
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        Ok(LedgerStats {
            total_entries: entries.len(),
            addons,
            file_size_bytes,
            oldest_timestamp: entries.iter().map(|e| e.timestamp).min(),
            newest_timestamp: entries.iter().map(|e| e.timestamp).max(),
        })
    }
}

impl StateStore for LedgerStateStore {
    fn load_all(&self) -> Result<BTreeMap<String, AddonRecord>> {
        let mut records = BTreeMap::new();
        for entry in self.entries()? {
            records.insert(
                entry.addon,
                AddonRecord::new(entry.to, entry.installed_version),
            );
        }
        Ok(records)
    }

    fn save(&mut self, name: &str, record: &AddonRecord, entry: &AuditEntry) -> Result<()> {
        let mut entry = entry.clone();
        entry.addon = name.to_string();
        entry.to = record.state;
        entry.installed_version = record.installed_version.clone();
        self.append(&entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use addonctl_core::types::Action;
    use tempfile::TempDir;

    fn create_test_ledger() -> (LedgerStateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ledger = LedgerStateStore::new(temp_dir.path().join("state.jsonl"));
        (ledger, temp_dir)
    }

    fn entry(request: &str, addon: &str, from: AddonState, to: AddonState) -> AuditEntry {
        AuditEntry::new(request, addon, Some(Action::Install), from, to)
    }

    #[test]
    fn test_empty_ledger() {
        let (ledger, _temp) = create_test_ledger();
        assert!(ledger.load_all().unwrap().is_empty());
        assert!(ledger.entries().unwrap().is_empty());
        assert_eq!(ledger.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn test_load_all_folds_to_latest() {
        let (mut ledger, _temp) = create_test_ledger();
        let installed = AddonRecord::installed("1.0");
        ledger
            .save("sale", &installed, &entry("r1", "sale", AddonState::ToInstall, AddonState::Installed))
            .unwrap();
        ledger
            .save("crm", &installed, &entry("r1", "crm", AddonState::ToInstall, AddonState::Installed))
            .unwrap();
        ledger
            .save(
                "sale",
                &AddonRecord::new(AddonState::Uninstalled, None),
                &entry("r2", "sale", AddonState::ToRemove, AddonState::Uninstalled),
            )
            .unwrap();

        let records = ledger.load_all().unwrap();
        assert_eq!(records["sale"].state, AddonState::Uninstalled);
        assert_eq!(records["sale"].installed_version, None);
        assert_eq!(records["crm"].installed_version.as_deref(), Some("1.0"));
    }

    #[test]
    fn test_history_and_query() {
        let (ledger, _temp) = create_test_ledger();
        for i in 0..5 {
            ledger
                .append(&entry(&format!("r{}", i), "sale", AddonState::ToInstall, AddonState::Installed))
                .unwrap();
        }
        ledger
            .append(&entry("r9", "crm", AddonState::ToInstall, AddonState::Broken))
            .unwrap();

        let history = ledger.history("sale", Some(2)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].request_id, "r3");
        assert_eq!(history[1].request_id, "r4");

        let broken = ledger
            .query(EntryFilter {
                to_states: Some(vec![AddonState::Broken]),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].addon, "crm");

        let by_request = ledger
            .query(EntryFilter {
                request_id: Some("r0".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_request.len(), 1);
    }

    #[test]
    fn test_corrupt_line_is_an_error() {
        let (ledger, _temp) = create_test_ledger();
        ledger
            .append(&entry("r1", "sale", AddonState::ToInstall, AddonState::Installed))
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(ledger.path()).unwrap();
        writeln!(file, "{{not json").unwrap();

        let err = ledger.load_all().unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
