//! Manifest reading and normalization
//!
//! Locates the manifest file of an addon directory, parses it with the
//! restricted literal evaluator and normalizes it into a [`Manifest`].

use crate::literal::parse_literal;
use addonctl_core::config::NameCheck;
use addonctl_core::types::{
    AutoInstall, Diagnostic, DiagnosticCode, Manifest, ManifestFile, ManifestValue, Severity,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A successfully read manifest plus the non-fatal findings about it
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRead {
    pub manifest: Manifest,
    pub warnings: Vec<Diagnostic>,
}

/// Reads addon manifests from disk
#[derive(Debug, Clone, Default)]
pub struct ManifestReader {
    name_check: NameCheck,
}

impl ManifestReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how a declared name differing from the directory name is treated
    pub fn with_name_check(mut self, name_check: NameCheck) -> Self {
        self.name_check = name_check;
        self
    }

    /// Find the highest priority manifest file present in `dir`
    pub fn locate(dir: &Path) -> Option<(ManifestFile, PathBuf)> {
        ManifestFile::ALL
            .iter()
            .map(|kind| (*kind, dir.join(kind.file_name())))
            .find(|(_, path)| path.is_file())
    }

    /// Read the manifest of the addon directory `dir`
    ///
    /// The addon name is the directory's final path component.
    pub fn read(&self, dir: &Path) -> Result<ManifestRead, Diagnostic> {
        let addon = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Diagnostic::new(
                    DiagnosticCode::MalformedManifest,
                    format!("addon directory name is not valid UTF-8: {}", dir.display()),
                )
                .with_context("path", dir.display())
            })?;

        let (kind, path) = Self::locate(dir).ok_or_else(|| {
            Diagnostic::new(
                DiagnosticCode::MissingManifest,
                format!(
                    "no {}, {} or {} found in {}",
                    ManifestFile::Manifest,
                    ManifestFile::Openerp,
                    ManifestFile::Terp,
                    dir.display()
                ),
            )
            .for_addon(addon)
            .with_context("path", dir.display())
        })?;

        debug!("Reading manifest for '{}' from {}", addon, path.display());

        let bytes = fs::read(&path).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::MalformedManifest,
                format!("failed to read {}: {}", path.display(), e),
            )
            .for_addon(addon)
            .with_context("path", path.display())
        })?;

        let source = String::from_utf8(bytes).map_err(|_| {
            Diagnostic::new(
                DiagnosticCode::MalformedManifest,
                format!("{} is not valid UTF-8", path.display()),
            )
            .for_addon(addon)
            .with_context("path", path.display())
        })?;

        self.parse(addon, kind, &source)
            .map_err(|d| d.with_context("path", path.display()))
            .map(|mut read| {
                for warning in &mut read.warnings {
                    warning
                        .context
                        .insert("path".to_string(), path.display().to_string());
                }
                read
            })
    }

    /// Parse and normalize manifest source for `addon`
    pub fn parse(
        &self,
        addon: &str,
        source_file: ManifestFile,
        source: &str,
    ) -> Result<ManifestRead, Diagnostic> {
        let value = parse_literal(source).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::MalformedManifest,
                format!("invalid {}: {}", source_file, e),
            )
            .for_addon(addon)
            .with_context("line", e.line)
            .with_context("column", e.column)
        })?;

        let entries = match value {
            ManifestValue::Dict(entries) => entries,
            other => {
                return Err(malformed(
                    addon,
                    format!("{} must be a mapping, found {}", source_file, other.type_name()),
                ))
            }
        };

        // Later duplicate keys override earlier ones, as in a dict literal
        let mut fields: BTreeMap<String, ManifestValue> = BTreeMap::new();
        for (key, value) in entries {
            match key {
                ManifestValue::Str(key) => {
                    fields.insert(key, value);
                }
                other => {
                    return Err(malformed(
                        addon,
                        format!("manifest keys must be strings, found {}", other.type_name()),
                    ))
                }
            }
        }

        let mut warnings = Vec::new();
        let manifest = self.normalize(addon, source_file, fields, &mut warnings)?;
        lint(addon, &manifest, &mut warnings);

        Ok(ManifestRead { manifest, warnings })
    }

    fn normalize(
        &self,
        addon: &str,
        source_file: ManifestFile,
        mut fields: BTreeMap<String, ManifestValue>,
        warnings: &mut Vec<Diagnostic>,
    ) -> Result<Manifest, Diagnostic> {
        let fr = FieldReader { addon };

        let name = match fields.remove("name") {
            Some(value) => fr.string("name", &value)?,
            None => return Err(malformed(addon, "missing required field 'name'")),
        };
        if name.trim().is_empty() {
            return Err(malformed(addon, "field 'name' must not be empty"));
        }

        if name != addon {
            let diagnostic = Diagnostic::new(
                DiagnosticCode::ManifestNameMismatch,
                format!(
                    "manifest declares name '{}' but the addon directory is '{}'",
                    name, addon
                ),
            )
            .for_addon(addon)
            .with_context("declared", &name);

            match self.name_check {
                NameCheck::Strict => return Err(diagnostic),
                NameCheck::Warn => {
                    warn!("{}", diagnostic);
                    warnings.push(diagnostic.with_severity(Severity::Warning));
                }
            }
        }

        let mut manifest = Manifest::new(name);
        manifest.source = source_file;

        if let Some(value) = fields.remove("version") {
            manifest.version = fr.string("version", &value)?;
        }

        if let Some(value) = fields.remove("depends") {
            manifest.depends = fr.string_list("depends", &value)?.into_iter().collect();
        }
        if manifest.depends.contains(addon) {
            return Err(malformed(addon, format!("addon '{}' depends on itself", addon)));
        }

        if let Some(value) = fields.remove("auto_install") {
            manifest.auto_install = match &value {
                ManifestValue::Bool(false) => AutoInstall::Never,
                ManifestValue::Bool(true) => AutoInstall::WithDependencies,
                _ => {
                    let trigger: BTreeSet<String> =
                        fr.string_list("auto_install", &value)?.into_iter().collect();
                    if trigger.is_empty() {
                        return Err(malformed(
                            addon,
                            "field 'auto_install' must be a boolean or a non-empty collection of addon names",
                        ));
                    }
                    AutoInstall::When(trigger)
                }
            };
        }

        if let Some(value) = fields.remove("installable") {
            manifest.installable = fr.boolean("installable", &value)?;
        }
        if let Some(value) = fields.remove("application") {
            manifest.application = fr.boolean("application", &value)?;
        }

        manifest.category = fr.optional_string(&mut fields, "category")?;
        manifest.summary = fr.optional_string(&mut fields, "summary")?;
        manifest.description = fr.optional_string(&mut fields, "description")?;
        manifest.author = fr.optional_string(&mut fields, "author")?;
        manifest.website = fr.optional_string(&mut fields, "website")?;
        manifest.license = fr.optional_string(&mut fields, "license")?;

        manifest.data = fr.optional_list(&mut fields, "data")?;
        manifest.data.extend(fr.optional_list(&mut fields, "init_xml")?);
        manifest.data.extend(fr.optional_list(&mut fields, "update_xml")?);
        manifest.demo = fr.optional_list(&mut fields, "demo")?;
        manifest.demo.extend(fr.optional_list(&mut fields, "demo_xml")?);
        manifest.test = fr.optional_list(&mut fields, "test")?;
        manifest.qweb = fr.optional_list(&mut fields, "qweb")?;
        manifest.js = fr.optional_list(&mut fields, "js")?;
        manifest.css = fr.optional_list(&mut fields, "css")?;
        manifest.assets = fields.remove("assets");

        if let Some(value) = fields.remove("external_dependencies") {
            manifest.external_dependencies = fr.external_dependencies(&value)?;
        }

        manifest.pre_init_hook = fr.optional_string(&mut fields, "pre_init_hook")?;
        manifest.post_init_hook = fr.optional_string(&mut fields, "post_init_hook")?;
        manifest.uninstall_hook = fr.optional_string(&mut fields, "uninstall_hook")?;
        manifest.post_load = fr.optional_string(&mut fields, "post_load")?;

        manifest.extra = fields;
        Ok(manifest)
    }
}

/// Advisory checks on an otherwise valid manifest
fn lint(addon: &str, manifest: &Manifest, warnings: &mut Vec<Diagnostic>) {
    match &manifest.auto_install {
        AutoInstall::WithDependencies if manifest.depends.is_empty() => {
            warnings.push(
                Diagnostic::new(
                    DiagnosticCode::IneffectiveAutoInstall,
                    "auto_install is enabled but the addon declares no dependencies, so it never triggers",
                )
                .for_addon(addon),
            );
        }
        AutoInstall::When(trigger) => {
            let outside: Vec<&str> = manifest
                .depends
                .iter()
                .filter(|d| !trigger.contains(*d))
                .map(String::as_str)
                .collect();
            if !outside.is_empty() {
                warnings.push(
                    Diagnostic::new(
                        DiagnosticCode::AutoInstallDependsMismatch,
                        format!(
                            "dependencies outside the auto_install trigger set: {}",
                            outside.join(", ")
                        ),
                    )
                    .for_addon(addon)
                    .with_context("outside", outside.join(",")),
                );
            }
        }
        _ => {}
    }
}

fn malformed(addon: &str, message: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticCode::MalformedManifest, message).for_addon(addon)
}

/// Typed access to manifest fields with uniform error reporting
struct FieldReader<'a> {
    addon: &'a str,
}

impl FieldReader<'_> {
    fn type_error(&self, key: &str, expected: &str, found: &ManifestValue) -> Diagnostic {
        malformed(
            self.addon,
            format!(
                "field '{}' must be {}, found {}",
                key,
                expected,
                found.type_name()
            ),
        )
        .with_context("field", key)
    }

    fn string(&self, key: &str, value: &ManifestValue) -> Result<String, Diagnostic> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.type_error(key, "a string", value))
    }

    fn boolean(&self, key: &str, value: &ManifestValue) -> Result<bool, Diagnostic> {
        value
            .as_bool()
            .ok_or_else(|| self.type_error(key, "a boolean", value))
    }

    fn string_list(&self, key: &str, value: &ManifestValue) -> Result<Vec<String>, Diagnostic> {
        let items = value
            .as_sequence()
            .ok_or_else(|| self.type_error(key, "a list of strings", value))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.type_error(key, "a list of strings", item))
            })
            .collect()
    }

    fn optional_string(
        &self,
        fields: &mut BTreeMap<String, ManifestValue>,
        key: &str,
    ) -> Result<Option<String>, Diagnostic> {
        match fields.remove(key) {
            None | Some(ManifestValue::None) => Ok(None),
            Some(value) => self.string(key, &value).map(Some),
        }
    }

    fn optional_list(
        &self,
        fields: &mut BTreeMap<String, ManifestValue>,
        key: &str,
    ) -> Result<Vec<String>, Diagnostic> {
        match fields.remove(key) {
            None => Ok(Vec::new()),
            Some(value) => self.string_list(key, &value),
        }
    }

    fn external_dependencies(
        &self,
        value: &ManifestValue,
    ) -> Result<BTreeMap<String, Vec<String>>, Diagnostic> {
        let key = "external_dependencies";
        let entries = match value {
            ManifestValue::Dict(entries) => entries,
            other => return Err(self.type_error(key, "a mapping", other)),
        };
        let mut out = BTreeMap::new();
        for (kind, names) in entries {
            let kind = kind
                .as_str()
                .ok_or_else(|| self.type_error(key, "a mapping with string keys", kind))?;
            out.insert(kind.to_string(), self.string_list(key, names)?);
        }
        Ok(out)
    }
}
