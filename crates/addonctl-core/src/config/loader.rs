//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Global config (~/.addonctl/config.yaml)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables (ADDONCTL_* prefix)
//! 5. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::utils::{expand_path, get_home_dir};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::str::FromStr;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "defaults.yaml";
const GLOBAL_CONFIG_FILE: &str = "config.yaml";

/// How a manifest `name` disagreeing with its directory is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCheck {
    /// Mismatch breaks the addon
    #[default]
    Strict,
    /// Mismatch is reported as a warning; the directory name is authoritative
    Warn,
}

impl FromStr for NameCheck {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(NameCheck::Strict),
            "warn" => Ok(NameCheck::Warn),
            _ => Err(Error::invalid_setting("name_check", s, "'strict' or 'warn'")),
        }
    }
}

impl fmt::Display for NameCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameCheck::Strict => "strict",
            NameCheck::Warn => "warn",
        })
    }
}

/// How the CLI resolves declared hook entrypoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    /// No entrypoint resolves; any declared hook fails its step
    #[default]
    Strict,
    /// Every declared entrypoint resolves to a logging no-op
    Noop,
}

impl FromStr for HookMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(HookMode::Strict),
            "noop" => Ok(HookMode::Noop),
            _ => Err(Error::invalid_setting("hooks", s, "'strict' or 'noop'")),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonctlConfig {
    /// Ordered addon search paths; earlier paths shadow later ones
    pub addons_paths: Vec<Utf8PathBuf>,

    /// JSONL audit ledger holding addon states
    pub state_file: Utf8PathBuf,

    pub name_check: NameCheck,

    pub hooks: HookMode,
}

impl Default for AddonctlConfig {
    fn default() -> Self {
        Self {
            addons_paths: Vec::new(),
            state_file: Utf8PathBuf::from("~/.addonctl/state.jsonl"),
            name_check: NameCheck::Strict,
            hooks: HookMode::Strict,
        }
    }
}

impl AddonctlConfig {
    /// Apply an overlay; fields present in the overlay win
    pub fn merge(mut self, overlay: ConfigOverlay) -> Self {
        if let Some(paths) = overlay.addons_paths {
            self.addons_paths = paths;
        }
        if let Some(state_file) = overlay.state_file {
            self.state_file = state_file;
        }
        if let Some(name_check) = overlay.name_check {
            self.name_check = name_check;
        }
        if let Some(hooks) = overlay.hooks {
            self.hooks = hooks;
        }
        self
    }

    /// Expand `~` and environment references in every path
    fn expand_paths(mut self) -> Self {
        self.addons_paths = self
            .addons_paths
            .iter()
            .map(|p| Utf8PathBuf::from(expand_path(p.as_str())))
            .collect();
        self.state_file = Utf8PathBuf::from(expand_path(self.state_file.as_str()));
        self
    }
}

/// Partial configuration as found in one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub addons_paths: Option<Vec<Utf8PathBuf>>,
    #[serde(default)]
    pub state_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub name_check: Option<NameCheck>,
    #[serde(default)]
    pub hooks: Option<HookMode>,
}

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Directory holding the global config file
    config_dir: Utf8PathBuf,

    /// File passed with `--config`
    explicit_file: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader rooted at ~/.addonctl
    pub fn new() -> Result<Self> {
        let home = get_home_dir().map_err(|e| Error::invalid_config(e.to_string()))?;
        let home = Utf8PathBuf::from_path_buf(home).map_err(|p| {
            Error::invalid_config(format!("Home directory is not valid UTF-8: {}", p.display()))
        })?;

        Ok(Self::with_dir(home.join(".addonctl")))
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            explicit_file: None,
        }
    }

    /// Use an explicit config file on top of the global one
    pub fn with_file(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }

    /// Load configuration with hierarchical precedence
    pub fn load(&self) -> Result<AddonctlConfig> {
        let mut config = AddonctlConfig::default().merge(Self::load_embedded_defaults()?);

        let global = self.config_dir.join(GLOBAL_CONFIG_FILE);
        if global.exists() {
            debug!("Loading global config from {}", global);
            config = config.merge(Self::load_yaml_file(&global)?);
        }

        if let Some(explicit) = &self.explicit_file {
            if !explicit.exists() {
                return Err(Error::config_not_found(explicit.as_str()));
            }
            debug!("Loading config from {}", explicit);
            config = config.merge(Self::load_yaml_file(explicit)?);
        }

        config = config.merge(Self::env_overlay()?);

        Ok(config.expand_paths())
    }

    fn load_embedded_defaults() -> Result<ConfigOverlay> {
        let embedded_file = EmbeddedConfigs::get(DEFAULTS_FILE).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", DEFAULTS_FILE))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", DEFAULTS_FILE))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| Error::config_parse(DEFAULTS_FILE, e))
    }

    fn load_yaml_file(path: &Utf8Path) -> Result<ConfigOverlay> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(ConfigOverlay::default());
        }
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::config_parse(path.as_str(), e))
    }

    /// Environment variable overrides
    fn env_overlay() -> Result<ConfigOverlay> {
        let mut overlay = ConfigOverlay::default();

        if let Some(raw) = env::var_os("ADDONCTL_ADDONS_PATH") {
            let mut paths = Vec::new();
            for path in env::split_paths(&raw) {
                if path.as_os_str().is_empty() {
                    continue;
                }
                let path = Utf8PathBuf::from_path_buf(path).map_err(|p| {
                    Error::invalid_config(format!(
                        "ADDONCTL_ADDONS_PATH entry is not valid UTF-8: {}",
                        p.display()
                    ))
                })?;
                paths.push(path);
            }
            overlay.addons_paths = Some(paths);
        }

        if let Ok(val) = env::var("ADDONCTL_STATE_FILE") {
            overlay.state_file = Some(Utf8PathBuf::from(val));
        }

        if let Ok(val) = env::var("ADDONCTL_NAME_CHECK") {
            overlay.name_check = Some(val.parse()?);
        }

        if let Ok(val) = env::var("ADDONCTL_HOOKS") {
            overlay.hooks = Some(val.parse()?);
        }

        Ok(overlay)
    }
}
