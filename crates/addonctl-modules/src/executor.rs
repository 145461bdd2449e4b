//! Plan execution
//!
//! Walks a plan step by step. Each step is requested, run through its hooks
//! and data loading, then committed. The first failure marks the addon
//! broken and stops the run; steps already committed stay committed.

use crate::events::{CancelToken, EventSink, ExecutorEvent, NoopSink};
use crate::graph::DependencyGraph;
use crate::hooks::{DataApplier, HookContext, HookResolver, Resources};
use crate::registry::{Addon, AddonRegistry};
use crate::state::StateMachine;
use crate::store::StateStore;
use addonctl_core::types::{
    Action, AddonState, Diagnostic, DiagnosticCode, Diagnostics, HookKind, Plan, PlanStep,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Outcome of executing a plan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub diagnostics: Diagnostics,
    /// State of every addon the plan touches, after the run
    pub final_states: BTreeMap<String, AddonState>,
    /// Steps that committed, in order
    pub committed: Vec<PlanStep>,
    pub cancelled: bool,
}

impl ExecutionReport {
    /// True when every step committed
    pub fn is_success(&self) -> bool {
        !self.cancelled && !self.diagnostics.has_fatal()
    }
}

/// Executes plans against a registry
pub struct Executor<'a> {
    registry: &'a AddonRegistry,
    hooks: &'a dyn HookResolver,
    sink: Box<dyn EventSink + 'a>,
    cancel: CancelToken,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a AddonRegistry, hooks: &'a dyn HookResolver) -> Self {
        Self {
            registry,
            hooks,
            sink: Box::new(NoopSink),
            cancel: CancelToken::new(),
        }
    }

    /// Receive progress events
    pub fn with_sink(mut self, sink: impl EventSink + 'a) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Observe `token` between steps
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Execute `plan` in order
    pub fn apply<S: StateStore>(
        &mut self,
        plan: &Plan,
        state: &mut StateMachine<S>,
        data: &mut dyn DataApplier,
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let total = plan.len();
        info!("Applying plan with {} steps (request {})", total, state.request_id());

        for (index, step) in plan.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = total - index;
                info!("Cancelled before step {} ({} remaining)", index + 1, remaining);
                report.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::Cancelled,
                        format!("cancelled with {} of {} steps remaining", remaining, total),
                    )
                    .with_context("next", &step.addon),
                );
                self.sink
                    .emit(&ExecutorEvent::Cancelled { index, remaining });
                report.cancelled = true;
                break;
            }

            self.sink.emit(&ExecutorEvent::StepStarted {
                index,
                total,
                addon: step.addon.clone(),
                action: step.action,
            });

            match self.run_step(step, state, data) {
                Ok(committed) => {
                    self.sink.emit(&ExecutorEvent::StepCommitted {
                        index,
                        addon: step.addon.clone(),
                        action: step.action,
                        state: committed,
                    });
                    report.committed.push(step.clone());
                }
                Err(failures) => {
                    if let Some(first) = failures.first() {
                        error!("Step {} ({}) failed: {}", index + 1, step, first.message);
                        self.sink.emit(&ExecutorEvent::StepFailed {
                            index,
                            addon: step.addon.clone(),
                            action: step.action,
                            code: first.code,
                            message: first.message.clone(),
                        });
                    }
                    report.diagnostics.extend(failures);
                    break;
                }
            }
        }

        for step in plan {
            report
                .final_states
                .insert(step.addon.clone(), state.current(&step.addon));
        }
        report
    }

    /// Run one step through to commit
    ///
    /// Returns every diagnostic of a failed step, the cause first.
    fn run_step<S: StateStore>(
        &self,
        step: &PlanStep,
        state: &mut StateMachine<S>,
        data: &mut dyn DataApplier,
    ) -> Result<AddonState, Vec<Diagnostic>> {
        let addon = self.registry.get(&step.addon).ok_or_else(|| {
            vec![Diagnostic::new(
                DiagnosticCode::UnknownAddon,
                format!("plan step '{}' names an addon that is not in the registry", step),
            )
            .for_addon(&step.addon)]
        })?;

        state.request(&addon.name, step.action).map_err(|d| vec![d])?;
        debug!("Running {}", step);

        if let Err(cause) = self.perform(addon, step.action, state.request_id(), data) {
            let mut failures = vec![cause.clone()];
            if let Err(store) = state.fail(&addon.name, &cause.message) {
                failures.push(store);
            }
            return Err(failures);
        }

        let version = match step.action {
            Action::Install | Action::Upgrade => Some(addon.manifest.version.clone()),
            Action::Remove => None,
        };
        state
            .commit_version(&addon.name, version)
            .map_err(|d| vec![d])
    }

    /// Hooks and data loading for one step, in lifecycle order
    fn perform(
        &self,
        addon: &Addon,
        action: Action,
        request_id: &str,
        data: &mut dyn DataApplier,
    ) -> Result<(), Diagnostic> {
        if action == Action::Install {
            self.run_hook(addon, HookKind::PreInit, Some(action), request_id)?;
        }

        data.apply(addon, action, Resources::of(addon)).map_err(|e| {
            Diagnostic::new(
                DiagnosticCode::DataApplyFailed,
                format!("failed to {} data of '{}': {:#}", action, addon.name, e),
            )
            .for_addon(&addon.name)
        })?;

        match action {
            Action::Install => self.run_hook(addon, HookKind::PostInit, Some(action), request_id),
            Action::Remove => self.run_hook(addon, HookKind::Uninstall, Some(action), request_id),
            Action::Upgrade => Ok(()),
        }
    }

    /// Resolve and call a declared hook; undeclared hooks are skipped
    fn run_hook(
        &self,
        addon: &Addon,
        kind: HookKind,
        action: Option<Action>,
        request_id: &str,
    ) -> Result<(), Diagnostic> {
        let Some(entrypoint) = addon.manifest.hook(kind) else {
            return Ok(());
        };

        let failed = |message: String| {
            Diagnostic::new(DiagnosticCode::HookFailed, message)
                .for_addon(&addon.name)
                .with_context("hook", kind)
                .with_context("entrypoint", entrypoint)
        };

        let hook = self.hooks.resolve(&addon.name, entrypoint).ok_or_else(|| {
            failed(format!(
                "{} '{}' of '{}' could not be resolved",
                kind, entrypoint, addon.name
            ))
        })?;

        debug!("Calling {} '{}' of '{}'", kind, entrypoint, addon.name);
        let ctx = HookContext {
            addon,
            kind,
            entrypoint,
            action,
            request_id,
        };
        hook(&ctx).map_err(|e| {
            failed(format!(
                "{} '{}' of '{}' failed: {:#}",
                kind, entrypoint, addon.name, e
            ))
        })
    }

    /// Call `post_load` of every installed addon in dependency order
    ///
    /// Stops at the first failing hook. No state changes.
    pub fn run_post_load<S: StateStore>(
        &self,
        graph: &DependencyGraph,
        state: &StateMachine<S>,
    ) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        let installed = graph
            .names()
            .filter(|n| state.current(n) == AddonState::Installed)
            .map(str::to_string)
            .collect::<Vec<_>>();

        for name in graph.topological_order(&installed) {
            let Some(addon) = self.registry.get(&name) else {
                continue;
            };
            if let Err(diagnostic) =
                self.run_hook(addon, HookKind::PostLoad, None, state.request_id())
            {
                error!("{}", diagnostic.message);
                diagnostics.push(diagnostic);
                break;
            }
        }
        diagnostics
    }
}

/// Execute `plan` with default options
pub fn apply<S: StateStore>(
    plan: &Plan,
    registry: &AddonRegistry,
    state: &mut StateMachine<S>,
    hooks: &dyn HookResolver,
    data: &mut dyn DataApplier,
) -> ExecutionReport {
    Executor::new(registry, hooks).apply(plan, state, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{HookTable, NoHooks, NoopApplier};
    use crate::store::MemoryStateStore;
    use addonctl_core::types::Manifest;

    fn registry() -> AddonRegistry {
        let mut sale = Manifest::new("sale");
        sale.post_init_hook = Some("_post_init".to_string());
        AddonRegistry::from_manifests([Manifest::new("base"), sale])
    }

    fn plan() -> Plan {
        Plan::new(vec![
            PlanStep::new("base", Action::Install),
            PlanStep::new("sale", Action::Install),
        ])
    }

    #[test]
    fn test_unresolvable_hook_fails_step() {
        let registry = registry();
        let mut state = StateMachine::load(MemoryStateStore::new()).unwrap();
        let report = apply(&plan(), &registry, &mut state, &NoHooks, &mut NoopApplier);

        assert!(!report.is_success());
        assert_eq!(report.committed, vec![PlanStep::new("base", Action::Install)]);
        assert_eq!(report.final_states["base"], AddonState::Installed);
        assert_eq!(report.final_states["sale"], AddonState::Broken);
        assert!(report.diagnostics.contains(DiagnosticCode::HookFailed));
    }

    #[test]
    fn test_registered_hook_runs() {
        let registry = registry();
        let mut hooks = HookTable::new();
        hooks.register("sale", "_post_init", |ctx| {
            assert_eq!(ctx.kind, HookKind::PostInit);
            Ok(())
        });
        let mut state = StateMachine::load(MemoryStateStore::new()).unwrap();
        let report = apply(&plan(), &registry, &mut state, &hooks, &mut NoopApplier);

        assert!(report.is_success(), "{:?}", report.diagnostics);
        assert_eq!(state.installed_version("sale"), Some("1.0"));
    }

    #[test]
    fn test_cancel_before_first_step() {
        let registry = registry();
        let token = CancelToken::new();
        token.cancel();
        let mut state = StateMachine::load(MemoryStateStore::new()).unwrap();
        let report = Executor::new(&registry, &NoHooks)
            .with_cancel(token)
            .apply(&plan(), &mut state, &mut NoopApplier);

        assert!(report.cancelled);
        assert!(report.committed.is_empty());
        assert!(report.diagnostics.contains(DiagnosticCode::Cancelled));
        assert_eq!(report.final_states["base"], AddonState::Uninstalled);
    }
}
