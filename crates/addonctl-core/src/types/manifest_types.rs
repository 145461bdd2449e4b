//! Normalized manifest types
//!
//! Every legacy manifest flavour (`__manifest__.py`, `__openerp__.py`,
//! `__terp__.py`) is read into the single [`Manifest`] shape below.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Name of the root addon every other addon implicitly depends on
pub const BASE_ADDON: &str = "base";

/// Version assumed when a manifest does not declare one
pub const DEFAULT_VERSION: &str = "1.0";

/// Manifest file names, in lookup priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestFile {
    Manifest,
    Openerp,
    Terp,
}

impl ManifestFile {
    /// All manifest file kinds, highest priority first
    pub const ALL: [ManifestFile; 3] = [
        ManifestFile::Manifest,
        ManifestFile::Openerp,
        ManifestFile::Terp,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ManifestFile::Manifest => "__manifest__.py",
            ManifestFile::Openerp => "__openerp__.py",
            ManifestFile::Terp => "__terp__.py",
        }
    }
}

impl fmt::Display for ManifestFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A literal value as it appears in a manifest
///
/// Only side-effect-free literal atoms and container constructors exist here.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ManifestValue>),
    Tuple(Vec<ManifestValue>),
    Set(Vec<ManifestValue>),
    Dict(Vec<(ManifestValue, ManifestValue)>),
}

impl ManifestValue {
    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            ManifestValue::None => "None",
            ManifestValue::Bool(_) => "bool",
            ManifestValue::Int(_) => "int",
            ManifestValue::Float(_) => "float",
            ManifestValue::Str(_) => "str",
            ManifestValue::List(_) => "list",
            ManifestValue::Tuple(_) => "tuple",
            ManifestValue::Set(_) => "set",
            ManifestValue::Dict(_) => "dict",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManifestValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ManifestValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Items of a list, tuple or set
    pub fn as_sequence(&self) -> Option<&[ManifestValue]> {
        match self {
            ManifestValue::List(items) | ManifestValue::Tuple(items) | ManifestValue::Set(items) => {
                Some(items)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ManifestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[ManifestValue]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match self {
            ManifestValue::None => f.write_str("None"),
            ManifestValue::Bool(true) => f.write_str("True"),
            ManifestValue::Bool(false) => f.write_str("False"),
            ManifestValue::Int(i) => write!(f, "{}", i),
            ManifestValue::Float(x) => write!(f, "{:?}", x),
            ManifestValue::Str(s) => write!(f, "{:?}", s),
            ManifestValue::List(items) => {
                f.write_str("[")?;
                join(f, items)?;
                f.write_str("]")
            }
            ManifestValue::Tuple(items) => {
                f.write_str("(")?;
                join(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            ManifestValue::Set(items) => {
                f.write_str("{")?;
                join(f, items)?;
                f.write_str("}")
            }
            ManifestValue::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for ManifestValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ManifestValue::None => serializer.serialize_none(),
            ManifestValue::Bool(b) => serializer.serialize_bool(*b),
            ManifestValue::Int(i) => serializer.serialize_i64(*i),
            ManifestValue::Float(x) => serializer.serialize_f64(*x),
            ManifestValue::Str(s) => serializer.serialize_str(s),
            ManifestValue::List(items) | ManifestValue::Tuple(items) | ManifestValue::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ManifestValue::Dict(entries) => {
                // JSON-like formats need string keys
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    match k.as_str() {
                        Some(key) => map.serialize_entry(key, v)?,
                        None => map.serialize_entry(&k.to_string(), v)?,
                    }
                }
                map.end()
            }
        }
    }
}

/// Auto-install rule
///
/// The boolean manifest form maps to `Never` / `WithDependencies`; the set
/// form maps to `When`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", content = "addons", rename_all = "snake_case")]
pub enum AutoInstall {
    #[default]
    Never,
    /// Install when every addon in `depends` is installed or planned
    WithDependencies,
    /// Install when every listed addon is installed or planned
    When(BTreeSet<String>),
}

impl AutoInstall {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AutoInstall::Never)
    }
}

/// Named lifecycle entrypoints an addon may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    PreInit,
    PostInit,
    Uninstall,
    PostLoad,
}

impl HookKind {
    /// Manifest key declaring this hook
    pub fn manifest_key(self) -> &'static str {
        match self {
            HookKind::PreInit => "pre_init_hook",
            HookKind::PostInit => "post_init_hook",
            HookKind::Uninstall => "uninstall_hook",
            HookKind::PostLoad => "post_load",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_key())
    }
}

/// Validated, normalized manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    /// Declared `name`
    pub name: String,
    pub version: String,
    /// Explicit dependencies; the implicit `base` edge is not stored here
    pub depends: BTreeSet<String>,
    pub auto_install: AutoInstall,
    pub installable: bool,
    pub application: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Data files; legacy `init_xml` then `update_xml` are appended here
    pub data: Vec<String>,
    /// Demo files; legacy `demo_xml` is appended here
    pub demo: Vec<String>,
    pub test: Vec<String>,
    pub qweb: Vec<String>,
    pub js: Vec<String>,
    pub css: Vec<String>,
    /// Asset declarations, opaque (a list in old manifests, a bundle mapping in new ones)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<ManifestValue>,

    pub external_dependencies: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_init_hook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_init_hook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uninstall_hook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_load: Option<String>,

    /// Keys not modeled above, preserved verbatim
    pub extra: BTreeMap<String, ManifestValue>,

    /// File the manifest was read from
    pub source: ManifestFile,
}

impl Manifest {
    /// A manifest with every optional field at its default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_VERSION.to_string(),
            depends: BTreeSet::new(),
            auto_install: AutoInstall::Never,
            installable: true,
            application: false,
            category: None,
            summary: None,
            description: None,
            author: None,
            website: None,
            license: None,
            data: Vec::new(),
            demo: Vec::new(),
            test: Vec::new(),
            qweb: Vec::new(),
            js: Vec::new(),
            css: Vec::new(),
            assets: None,
            external_dependencies: BTreeMap::new(),
            pre_init_hook: None,
            post_init_hook: None,
            uninstall_hook: None,
            post_load: None,
            extra: BTreeMap::new(),
            source: ManifestFile::Manifest,
        }
    }

    /// Dependencies including the implicit edge to `base`
    pub fn effective_depends(&self, addon: &str) -> BTreeSet<String> {
        let mut deps = self.depends.clone();
        if addon != BASE_ADDON {
            deps.insert(BASE_ADDON.to_string());
        }
        deps
    }

    /// Entrypoint name declared for a hook
    pub fn hook(&self, kind: HookKind) -> Option<&str> {
        match kind {
            HookKind::PreInit => self.pre_init_hook.as_deref(),
            HookKind::PostInit => self.post_init_hook.as_deref(),
            HookKind::Uninstall => self.uninstall_hook.as_deref(),
            HookKind::PostLoad => self.post_load.as_deref(),
        }
    }
}
