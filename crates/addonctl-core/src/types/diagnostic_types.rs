//! Structured diagnostics shared by every loader component
//!
//! A diagnostic carries a stable code from a closed taxonomy, a severity, the
//! addon it concerns (if any), a human message and a key/value context
//! payload. Components accumulate them in [`Diagnostics`]; a `fatal`
//! diagnostic short-circuits the operation that produced it.
//!
//! Discovery failures are fatal for their addon only: the addon is broken
//! and excluded, but the surrounding run goes on. [`Diagnostic::blocks_run`]
//! tells the two kinds apart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Stable diagnostic codes
///
/// Serialized verbatim (`MissingManifest`, `DependencyCycle`, ...) so that
/// tooling can match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Manifest Reader
    MissingManifest,
    MalformedManifest,
    ManifestNameMismatch,
    IneffectiveAutoInstall,
    AutoInstallDependsMismatch,

    // Registry
    ShadowedAddon,

    // Dependency Graph
    UnresolvedDependency,
    DependencyCycle,

    // Planner
    UnknownAddon,
    BrokenAddon,
    NotInstallable,
    ConflictingRequest,
    UnsatisfiableAutoInstall,
    ImpliedRemoval,

    // State Machine
    IllegalTransition,
    StaleTransientState,
    StateStoreFailed,

    // Executor
    HookFailed,
    DataApplyFailed,
    Cancelled,
}

impl DiagnosticCode {
    /// Severity a diagnostic with this code carries unless overridden
    pub fn default_severity(self) -> Severity {
        use DiagnosticCode::*;
        match self {
            Cancelled | ImpliedRemoval => Severity::Info,
            ShadowedAddon
            | IneffectiveAutoInstall
            | AutoInstallDependsMismatch
            | StaleTransientState => Severity::Warning,
            MissingManifest
            | MalformedManifest
            | ManifestNameMismatch
            | UnresolvedDependency
            | DependencyCycle
            | UnknownAddon
            | BrokenAddon
            | NotInstallable
            | ConflictingRequest
            | UnsatisfiableAutoInstall
            | IllegalTransition
            | StateStoreFailed
            | HookFailed
            | DataApplyFailed => Severity::Fatal,
        }
    }

    /// Codes that break a single addon rather than the run
    pub fn is_addon_scoped(self) -> bool {
        use DiagnosticCode::*;
        matches!(
            self,
            MissingManifest | MalformedManifest | ManifestNameMismatch | UnresolvedDependency
        )
    }

    /// Stable identifier of the code
    pub fn as_str(self) -> &'static str {
        use DiagnosticCode::*;
        match self {
            MissingManifest => "MissingManifest",
            MalformedManifest => "MalformedManifest",
            ManifestNameMismatch => "ManifestNameMismatch",
            IneffectiveAutoInstall => "IneffectiveAutoInstall",
            AutoInstallDependsMismatch => "AutoInstallDependsMismatch",
            ShadowedAddon => "ShadowedAddon",
            UnresolvedDependency => "UnresolvedDependency",
            DependencyCycle => "DependencyCycle",
            UnknownAddon => "UnknownAddon",
            BrokenAddon => "BrokenAddon",
            NotInstallable => "NotInstallable",
            ConflictingRequest => "ConflictingRequest",
            UnsatisfiableAutoInstall => "UnsatisfiableAutoInstall",
            ImpliedRemoval => "ImpliedRemoval",
            IllegalTransition => "IllegalTransition",
            StaleTransientState => "StaleTransientState",
            StateStoreFailed => "StateStoreFailed",
            HookFailed => "HookFailed",
            DataApplyFailed => "DataApplyFailed",
            Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            addon: None,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Attach the addon this diagnostic concerns
    pub fn for_addon(mut self, addon: impl Into<String>) -> Self {
        self.addon = Some(addon.into());
        self
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Add a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Fatal for the whole operation, not just for the addon it names
    pub fn blocks_run(&self) -> bool {
        self.is_fatal() && !(self.code.is_addon_scoped() && self.addon.is_some())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(addon) = &self.addon {
            write!(f, " (addon: {})", addon)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Accumulated diagnostics, in emission order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    /// True if any diagnostic is fatal
    pub fn has_fatal(&self) -> bool {
        self.0.iter().any(Diagnostic::is_fatal)
    }

    /// True if any diagnostic stops the operation as a whole
    pub fn has_blocking(&self) -> bool {
        self.0.iter().any(Diagnostic::blocks_run)
    }

    /// Highest severity present, if any
    pub fn max_severity(&self) -> Option<Severity> {
        self.0.iter().map(|d| d.severity).max()
    }

    /// True if a diagnostic with the given code is present
    pub fn contains(&self, code: DiagnosticCode) -> bool {
        self.0.iter().any(|d| d.code == code)
    }

    /// All diagnostics with the given code
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<&Diagnostic> {
        self.0.iter().filter(|d| d.code == code).collect()
    }

    /// All diagnostics concerning an addon
    pub fn for_addon(&self, addon: &str) -> Vec<&Diagnostic> {
        self.0
            .iter()
            .filter(|d| d.addon.as_deref() == Some(addon))
            .collect()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<T: IntoIterator<Item = Diagnostic>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
