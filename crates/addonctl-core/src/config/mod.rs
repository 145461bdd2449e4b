//! Configuration handling for addonctl

mod loader;

pub use loader::{AddonctlConfig, ConfigLoader, ConfigOverlay, HookMode, NameCheck};
