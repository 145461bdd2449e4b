//! Addon registry
//!
//! Discovers addons across an ordered list of search paths. The first path
//! that provides an addon name wins; later copies are reported as shadowed.
//! Addons whose manifest cannot be read stay in the registry as broken so
//! dependents can report why they are unresolved.

use crate::reader::ManifestReader;
use addonctl_core::types::{Diagnostic, DiagnosticCode, Diagnostics, Manifest, ManifestFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A discovered addon with a valid manifest
#[derive(Debug, Clone, PartialEq)]
pub struct Addon {
    /// Directory name, the addon's identity
    pub name: String,
    pub path: PathBuf,
    pub manifest: Manifest,
}

/// A discovered addon whose manifest is missing or invalid
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenAddon {
    pub name: String,
    pub path: PathBuf,
    pub diagnostic: Diagnostic,
}

/// An addon directory hidden by an earlier search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowedAddon {
    pub name: String,
    pub path: PathBuf,
    pub winner: PathBuf,
}

/// Registry of all discovered addons, keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddonRegistry {
    addons: BTreeMap<String, Addon>,
    broken: BTreeMap<String, BrokenAddon>,
    shadowed: Vec<ShadowedAddon>,
}

/// One directory entry that may become an addon
struct Candidate {
    path: PathBuf,
    has_manifest: bool,
}

impl AddonRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover addons with the default manifest reader
    pub fn discover<P: AsRef<Path>>(search_paths: &[P]) -> (Self, Diagnostics) {
        Self::discover_with(&ManifestReader::new(), search_paths)
    }

    /// Discover addons in `search_paths`, earliest path first
    ///
    /// Never fails as a whole: per-addon problems become diagnostics and
    /// broken entries.
    pub fn discover_with<P: AsRef<Path>>(
        reader: &ManifestReader,
        search_paths: &[P],
    ) -> (Self, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut candidates: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

        for search_path in search_paths {
            let search_path = search_path.as_ref();
            if !search_path.is_dir() {
                warn!(
                    "Addons path {} does not exist or is not a directory, skipping",
                    search_path.display()
                );
                continue;
            }
            debug!("Scanning addons path {}", search_path.display());

            let entries = WalkDir::new(search_path)
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
                .sort_by_file_name();

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry in {}: {}", search_path.display(), e);
                        continue;
                    }
                };
                if !entry.file_type().is_dir() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str() else {
                    continue;
                };
                if !is_addon_name(name) {
                    continue;
                }

                let path = entry.path().to_path_buf();
                let has_manifest = ManifestReader::locate(&path).is_some();
                candidates
                    .entry(name.to_string())
                    .or_default()
                    .push(Candidate { path, has_manifest });
            }
        }

        let mut registry = Self::new();
        for (name, found) in candidates {
            // A directory without any manifest file only claims the name
            // when no search path provides a real one
            let winner_index = found.iter().position(|c| c.has_manifest).unwrap_or(0);
            let winner = &found[winner_index].path;

            for (i, candidate) in found.iter().enumerate() {
                if i == winner_index || !candidate.has_manifest {
                    continue;
                }
                let diagnostic = Diagnostic::new(
                    DiagnosticCode::ShadowedAddon,
                    format!(
                        "addon '{}' at {} is shadowed by {}",
                        name,
                        candidate.path.display(),
                        winner.display()
                    ),
                )
                .for_addon(&name)
                .with_context("winner", winner.display())
                .with_context("shadowed", candidate.path.display());
                warn!("{}", diagnostic.message);
                diagnostics.push(diagnostic);
                registry.shadowed.push(ShadowedAddon {
                    name: name.clone(),
                    path: candidate.path.clone(),
                    winner: winner.clone(),
                });
            }

            match reader.read(winner) {
                Ok(read) => {
                    diagnostics.extend(read.warnings);
                    registry.insert(Addon {
                        name: name.clone(),
                        path: winner.clone(),
                        manifest: read.manifest,
                    });
                }
                Err(diagnostic) => {
                    warn!("Addon '{}' is broken: {}", name, diagnostic.message);
                    diagnostics.push(diagnostic.clone());
                    registry.mark_broken(BrokenAddon {
                        name: name.clone(),
                        path: winner.clone(),
                        diagnostic,
                    });
                }
            }
        }

        info!(
            "Discovered {} addons ({} broken) in {} search paths",
            registry.addons.len(),
            registry.broken.len(),
            search_paths.len()
        );

        (registry, diagnostics)
    }

    /// Build a registry from already-normalized manifests
    pub fn from_manifests(manifests: impl IntoIterator<Item = Manifest>) -> Self {
        let mut registry = Self::new();
        for manifest in manifests {
            let name = manifest.name.clone();
            registry.insert(Addon {
                path: PathBuf::from(&name),
                name,
                manifest,
            });
        }
        registry
    }

    /// Insert a healthy addon, replacing any entry of the same name
    pub fn insert(&mut self, addon: Addon) -> Option<Addon> {
        self.broken.remove(&addon.name);
        self.addons.insert(addon.name.clone(), addon)
    }

    /// Record an addon as broken, removing any healthy entry of the same name
    pub fn mark_broken(&mut self, broken: BrokenAddon) {
        self.addons.remove(&broken.name);
        self.broken.insert(broken.name.clone(), broken);
    }

    /// Look up a healthy addon by name
    pub fn get(&self, name: &str) -> Option<&Addon> {
        self.addons.get(name)
    }

    /// All healthy addons, ordered by name
    pub fn all(&self) -> impl Iterator<Item = &Addon> {
        self.addons.values()
    }

    /// Look up a broken addon by name
    pub fn broken(&self, name: &str) -> Option<&BrokenAddon> {
        self.broken.get(name)
    }

    /// All broken addons, ordered by name
    pub fn broken_addons(&self) -> impl Iterator<Item = &BrokenAddon> {
        self.broken.values()
    }

    pub fn shadowed(&self) -> &[ShadowedAddon] {
        &self.shadowed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.addons.contains_key(name)
    }

    pub fn is_broken(&self, name: &str) -> bool {
        self.broken.contains_key(name)
    }

    /// Whether the name is known at all, healthy or broken
    pub fn is_known(&self, name: &str) -> bool {
        self.contains(name) || self.is_broken(name)
    }

    /// Number of healthy addons
    pub fn len(&self) -> usize {
        self.addons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }

    /// Manifest file kind of a healthy addon
    pub fn source_of(&self, name: &str) -> Option<ManifestFile> {
        self.addons.get(name).map(|a| a.manifest.source)
    }
}

/// Addon directory names are identifiers: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_addon_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name != "__pycache__" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
