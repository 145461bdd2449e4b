//! Collaborators the executor calls out to
//!
//! Hook entrypoints and data loading live outside the core. The executor
//! only sees these traits.

use crate::registry::Addon;
use addonctl_core::types::{Action, HookKind};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// What a hook is invoked with
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub addon: &'a Addon,
    pub kind: HookKind,
    /// Entrypoint name declared in the manifest
    pub entrypoint: &'a str,
    /// Action being executed; `None` for `post_load`
    pub action: Option<Action>,
    pub request_id: &'a str,
}

/// A resolved hook, called at most once
pub type Hook = Box<dyn FnOnce(&HookContext<'_>) -> Result<()>>;

/// Resolves declared hook entrypoints to callables
pub trait HookResolver {
    /// Resolve `entrypoint` declared by `addon`; `None` if it cannot be found
    fn resolve(&self, addon: &str, entrypoint: &str) -> Option<Hook>;
}

/// Resolves nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HookResolver for NoHooks {
    fn resolve(&self, _addon: &str, _entrypoint: &str) -> Option<Hook> {
        None
    }
}

/// Resolves every entrypoint to a hook that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

impl HookResolver for LoggingHooks {
    fn resolve(&self, _addon: &str, _entrypoint: &str) -> Option<Hook> {
        Some(Box::new(|ctx: &HookContext<'_>| {
            info!(
                "Hook {} of '{}' resolved to no-op ({})",
                ctx.kind, ctx.addon.name, ctx.entrypoint
            );
            Ok(())
        }))
    }
}

type SharedHook = Arc<dyn Fn(&HookContext<'_>) -> Result<()> + Send + Sync>;

/// Table of entrypoints registered by name
#[derive(Clone, Default)]
pub struct HookTable {
    hooks: BTreeMap<(String, String), SharedHook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` as `entrypoint` of `addon`
    pub fn register<F>(&mut self, addon: impl Into<String>, entrypoint: impl Into<String>, hook: F)
    where
        F: Fn(&HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks
            .insert((addon.into(), entrypoint.into()), Arc::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("entrypoints", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HookResolver for HookTable {
    fn resolve(&self, addon: &str, entrypoint: &str) -> Option<Hook> {
        let hook = self
            .hooks
            .get(&(addon.to_string(), entrypoint.to_string()))?
            .clone();
        Some(Box::new(move |ctx: &HookContext<'_>| hook(ctx)))
    }
}

/// Resource lists handed to the data applier
#[derive(Debug, Clone, Copy)]
pub struct Resources<'a> {
    pub data: &'a [String],
    pub demo: &'a [String],
}

impl<'a> Resources<'a> {
    pub fn of(addon: &'a Addon) -> Self {
        Self {
            data: &addon.manifest.data,
            demo: &addon.manifest.demo,
        }
    }
}

/// Loads or unloads an addon's declared resources
pub trait DataApplier {
    fn apply(&mut self, addon: &Addon, action: Action, resources: Resources<'_>) -> Result<()>;
}

/// Accepts every step without doing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopApplier;

impl DataApplier for NoopApplier {
    fn apply(&mut self, _addon: &Addon, _action: Action, _resources: Resources<'_>) -> Result<()> {
        Ok(())
    }
}
