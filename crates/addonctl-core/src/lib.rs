//! # addonctl-core
//!
//! Core library for addonctl providing:
//! - Normalized manifest types (the canonical shape of `__manifest__.py` and its legacy aliases)
//! - Addon lifecycle states, actions, plans and audit entries
//! - The structured diagnostics surface shared by every loader component
//! - Hierarchical configuration loading (embedded defaults, files, environment)

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::{AddonctlConfig, ConfigLoader, HookMode, NameCheck};
pub use error::{Error, Result};
pub use utils::get_home_dir;
