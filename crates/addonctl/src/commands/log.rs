//! Log command: view the state audit ledger

use addonctl_core::types::{AddonState, AuditEntry};
use addonctl_modules::{EntryFilter, LedgerStateStore};
use anyhow::{Context, Result};
use console::style;

use super::common::{self, Outcome};
use crate::cli::{GlobalArgs, LogArgs};
use crate::output;

/// Maximum addon name display width in log output
const LOG_ADDON_NAME_WIDTH: usize = 20;

pub fn run(args: LogArgs, global: &GlobalArgs) -> Result<Outcome> {
    let config = common::load_config(global)?;
    let ledger = LedgerStateStore::new(config.state_file.as_std_path());

    if args.stats {
        return stats(&ledger);
    }

    let filter = EntryFilter {
        addon: args.name.clone(),
        request_id: args.request.clone(),
        limit: if args.all { None } else { Some(args.limit) },
        reverse: !args.all,
        ..Default::default()
    };
    let entries = ledger.query(filter).context("Failed to read state ledger")?;

    if entries.is_empty() && !args.json {
        output::info("No entries found");
        return Ok(Outcome::Clean);
    }

    for entry in &entries {
        if args.json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            print_log_line(entry);
        }
    }
    Ok(Outcome::Clean)
}

/// Print a single log line with color coding
fn print_log_line(entry: &AuditEntry) {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S");
    let action = entry
        .action
        .map(|a| a.to_string())
        .unwrap_or_else(|| "-".to_string());
    let transition = format!("{} -> {}", entry.from, entry.to);
    let transition = match entry.to {
        AddonState::Installed => style(transition).green(),
        AddonState::Broken => style(transition).red(),
        AddonState::Uninstalled => style(transition).yellow(),
        _ => style(transition).blue(),
    };

    let mut details = Vec::new();
    if let Some(version) = &entry.installed_version {
        details.push(format!("version={}", version));
    }
    if let Some(reason) = &entry.reason {
        details.push(format!("reason={}", reason));
    }

    println!(
        "{} {:<width$} {:<8} {} {}",
        style(timestamp).dim(),
        truncate(&entry.addon, LOG_ADDON_NAME_WIDTH),
        action,
        transition,
        style(details.join(" ")).dim(),
        width = LOG_ADDON_NAME_WIDTH,
    );
}

fn stats(ledger: &LedgerStateStore) -> Result<Outcome> {
    let stats = ledger.stats().context("Failed to get ledger stats")?;

    output::header("Ledger Statistics");
    output::kv("Path", &ledger.path().display().to_string());
    output::kv("Total Entries", &stats.total_entries.to_string());
    output::kv("Addons", &stats.addons.to_string());
    output::kv("File Size", &format_bytes(stats.file_size_bytes));

    if let Some(oldest) = stats.oldest_timestamp {
        output::kv(
            "Oldest Entry",
            &oldest.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
    }
    if let Some(newest) = stats.newest_timestamp {
        output::kv(
            "Newest Entry",
            &newest.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
    }
    Ok(Outcome::Clean)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
