//! Shared helpers for addonctl commands

use addonctl_core::types::{Diagnostics, Severity};
use addonctl_core::utils::expand_path;
use addonctl_core::{AddonctlConfig, ConfigLoader, HookMode};
use addonctl_modules::{
    AddonRegistry, HookResolver, LedgerStateStore, LoggingHooks, ManifestReader, NoHooks,
    StateMachine,
};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::process::ExitCode;

use crate::cli::GlobalArgs;
use crate::output;

/// How a command run ended, mapped onto the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No warnings
    Clean,
    /// Warnings or non-fatal errors
    Warnings,
    Fatal,
    Cancelled,
}

impl Outcome {
    pub fn from_diagnostics(diagnostics: &Diagnostics) -> Self {
        match diagnostics.max_severity() {
            None | Some(Severity::Info) => Outcome::Clean,
            Some(Severity::Warning) | Some(Severity::Error) => Outcome::Warnings,
            Some(Severity::Fatal) => Outcome::Fatal,
        }
    }

    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(match self {
            Outcome::Clean => 0,
            Outcome::Warnings => 1,
            Outcome::Fatal => 2,
            Outcome::Cancelled => 3,
        })
    }
}

/// Resolve configuration, with CLI flags taking precedence
pub fn load_config(global: &GlobalArgs) -> Result<AddonctlConfig> {
    let mut config = ConfigLoader::new()?
        .with_file(global.config.clone())
        .load()
        .context("Failed to load configuration")?;

    if !global.addons_paths.is_empty() {
        config.addons_paths = global
            .addons_paths
            .iter()
            .map(|p| Utf8PathBuf::from(expand_path(p.as_str())))
            .collect();
    }
    if let Some(state_file) = &global.state_file {
        config.state_file = Utf8PathBuf::from(expand_path(state_file.as_str()));
    }

    tracing::debug!(
        "Using {} addons paths, state file {}",
        config.addons_paths.len(),
        config.state_file
    );
    Ok(config)
}

/// Scan the configured search paths
pub fn discover(config: &AddonctlConfig) -> (AddonRegistry, Diagnostics) {
    let reader = ManifestReader::new().with_name_check(config.name_check);
    AddonRegistry::discover_with(&reader, &config.addons_paths)
}

/// Load addon states from the configured ledger
pub fn open_state(config: &AddonctlConfig) -> Result<StateMachine<LedgerStateStore>> {
    let store = LedgerStateStore::new(config.state_file.as_std_path());
    StateMachine::load(store)
        .with_context(|| format!("Failed to load state from {}", config.state_file))
}

/// Hook resolver for a hook mode
pub fn hook_resolver(mode: HookMode) -> Box<dyn HookResolver + Send> {
    match mode {
        HookMode::Strict => Box::new(NoHooks),
        HookMode::Noop => Box::new(LoggingHooks),
    }
}

/// Print every diagnostic unless quiet; fatal ones are always shown
pub fn report(diagnostics: &Diagnostics, quiet: bool) {
    for d in diagnostics {
        if !quiet || d.is_fatal() {
            output::diagnostic(d);
        }
    }
}
