//! Install / upgrade / remove planning
//!
//! Turns a request into an ordered [`Plan`]. Planning is a pure function of
//! the registry, the dependency graph, the current states and the request:
//! the same inputs always give the same plan.

use crate::graph::{DependencyGraph, Direction};
use crate::registry::AddonRegistry;
use crate::state::StateView;
use addonctl_core::types::{
    Action, AddonState, AutoInstall, Diagnostic, DiagnosticCode, Diagnostics, Plan, PlanStep,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Addons to install, upgrade and remove
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanRequest {
    pub install: BTreeSet<String>,
    pub upgrade: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

impl PlanRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn upgrade<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upgrade.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn remove<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.upgrade.is_empty() && self.remove.is_empty()
    }

    fn sides(&self) -> impl Iterator<Item = (Action, &String)> {
        self.install
            .iter()
            .map(|n| (Action::Install, n))
            .chain(self.upgrade.iter().map(|n| (Action::Upgrade, n)))
            .chain(self.remove.iter().map(|n| (Action::Remove, n)))
    }
}

/// Computes plans against a fixed registry, graph and state
pub struct Planner<'a> {
    registry: &'a AddonRegistry,
    graph: &'a DependencyGraph,
    state: &'a dyn StateView,
}

impl<'a> Planner<'a> {
    pub fn new(
        registry: &'a AddonRegistry,
        graph: &'a DependencyGraph,
        state: &'a dyn StateView,
    ) -> Self {
        Self {
            registry,
            graph,
            state,
        }
    }

    fn is_installed(&self, name: &str) -> bool {
        self.state.state(name) == AddonState::Installed
    }

    /// Compute the plan for `request`
    ///
    /// If any fatal diagnostic is produced the returned plan is empty and
    /// every fatal finding is reported.
    pub fn plan(&self, request: &PlanRequest) -> (Plan, Diagnostics) {
        let mut diagnostics = Diagnostics::new();

        self.validate(request, &mut diagnostics);
        if diagnostics.has_fatal() {
            return (Plan::default(), diagnostics);
        }

        // Removals propagate to every dependent still present, including
        // installed addons whose dependencies no longer resolve
        let remove_roots = request
            .remove
            .iter()
            .filter(|n| self.is_present(n));
        let remove: BTreeSet<String> = self
            .graph
            .declared_closure(remove_roots, Direction::Reverse)
            .into_iter()
            .filter(|n| self.is_present(n))
            .collect();

        // Upgrades propagate to installed dependents not being removed
        let upgrade_roots = request.upgrade.iter().filter(|n| self.is_installed(n));
        let upgrade: BTreeSet<String> = self
            .graph
            .transitive_closure(upgrade_roots, Direction::Reverse)
            .into_iter()
            .filter(|n| self.is_installed(n) && !remove.contains(n))
            .collect();

        // Everything required by the install side; upgrading something not
        // installed means installing it
        let roots = request
            .install
            .iter()
            .chain(request.upgrade.iter())
            .chain(upgrade.iter());
        let mut install = BTreeSet::new();
        for name in self.graph.transitive_closure(roots, Direction::Forward) {
            match self.state.state(&name) {
                AddonState::Uninstalled => {
                    if self.installable(&name) {
                        install.insert(name);
                    } else {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticCode::NotInstallable,
                                format!("required addon '{}' is not installable", name),
                            )
                            .for_addon(&name),
                        );
                    }
                }
                AddonState::Broken => diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::BrokenAddon,
                        format!("required addon '{}' is broken", name),
                    )
                    .for_addon(&name),
                ),
                _ => {}
            }
        }

        let implied: Vec<String> = remove
            .iter()
            .filter(|n| !request.remove.contains(*n))
            .cloned()
            .collect();
        for name in &implied {
            let because: Vec<&str> = request
                .remove
                .iter()
                .filter(|r| {
                    self.graph
                        .declared_closure([name.as_str()], Direction::Forward)
                        .contains(*r)
                })
                .map(String::as_str)
                .collect();
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::ImpliedRemoval,
                    format!(
                        "'{}' will also be removed because it depends on {}",
                        name,
                        because.join(", ")
                    ),
                )
                .for_addon(name)
                .with_context("because", because.join(",")),
            );
        }

        let auto_installed = self.auto_install(&upgrade, &remove, &mut install, &mut diagnostics);

        self.check_conflicts(request, &install, &upgrade, &remove, &mut diagnostics);
        if diagnostics.has_fatal() {
            return (Plan::default(), diagnostics);
        }

        let mut steps = Vec::with_capacity(remove.len() + install.len() + upgrade.len());
        for name in self.graph.topological_order(&remove).into_iter().rev() {
            steps.push(PlanStep::new(name, Action::Remove));
        }
        for name in self.graph.topological_order(install.iter().chain(upgrade.iter())) {
            let action = if install.contains(&name) {
                Action::Install
            } else {
                Action::Upgrade
            };
            steps.push(PlanStep::new(name, action));
        }

        info!(
            "Planned {} steps ({} install, {} upgrade, {} remove)",
            steps.len(),
            install.len(),
            upgrade.len(),
            remove.len()
        );

        let plan = Plan {
            steps,
            implied_removals: implied,
            auto_installed,
        };
        (plan, diagnostics)
    }

    /// Reject requests naming unknown, broken or uninstallable addons
    fn validate(&self, request: &PlanRequest, diagnostics: &mut Diagnostics) {
        for (side, name) in request.sides() {
            if let Some(broken) = self.registry.broken(name) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::BrokenAddon,
                        format!("cannot {} '{}': {}", side, name, broken.diagnostic.message),
                    )
                    .for_addon(name)
                    .with_context("cause", broken.diagnostic.code),
                );
            } else if let Some(reason) = self.graph.unresolved_reason(name) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::BrokenAddon,
                        format!("cannot {} '{}': {}", side, name, reason.message),
                    )
                    .for_addon(name)
                    .with_context("cause", reason.code),
                );
            } else if !self.graph.contains(name) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::UnknownAddon,
                        format!("cannot {} '{}': no such addon", side, name),
                    )
                    .for_addon(name),
                );
            } else if self.state.state(name) == AddonState::Broken {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::BrokenAddon,
                        format!("cannot {} '{}': a previous run left it broken", side, name),
                    )
                    .for_addon(name),
                );
            } else if side == Action::Install && !self.is_installed(name) && !self.installable(name) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::NotInstallable,
                        format!("'{}' is not installable", name),
                    )
                    .for_addon(name),
                );
            }
        }
    }

    fn installable(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .is_some_and(|a| a.manifest.installable)
    }

    /// Whether `name` could be installed by some later request
    fn can_follow(&self, name: &str) -> bool {
        self.graph.contains(name)
            && match self.state.state(name) {
                AddonState::Broken => false,
                AddonState::Uninstalled => self.installable(name),
                _ => true,
            }
    }

    /// Installed, or in a transient state on its way in or out
    fn is_present(&self, name: &str) -> bool {
        matches!(
            self.state.state(name),
            AddonState::Installed | AddonState::ToInstall | AddonState::ToUpgrade
        )
    }

    /// Add auto-install candidates until nothing changes
    ///
    /// Returns the added addons in the order they were added.
    fn auto_install(
        &self,
        upgrade: &BTreeSet<String>,
        remove: &BTreeSet<String>,
        install: &mut BTreeSet<String>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<String> {
        let satisfied = |install: &BTreeSet<String>, name: &str| {
            (self.is_installed(name) && !remove.contains(name))
                || install.contains(name)
                || upgrade.contains(name)
        };

        let mut added = Vec::new();
        loop {
            let mut changed = false;
            for addon in self.registry.all() {
                let name = addon.name.as_str();
                if !self.graph.contains(name)
                    || install.contains(name)
                    || self.state.state(name) != AddonState::Uninstalled
                    || !addon.manifest.installable
                {
                    continue;
                }

                let depends = addon.manifest.effective_depends(name);
                let triggered = match &addon.manifest.auto_install {
                    AutoInstall::Never => false,
                    AutoInstall::WithDependencies => {
                        !addon.manifest.depends.is_empty()
                            && depends.iter().all(|d| satisfied(&*install, d.as_str()))
                    }
                    AutoInstall::When(trigger) => {
                        trigger.iter().all(|t| satisfied(&*install, t.as_str()))
                            && depends.iter().all(|d| satisfied(&*install, d.as_str()))
                    }
                };

                if triggered {
                    debug!("Auto-installing '{}'", name);
                    install.insert(name.to_string());
                    added.push(name.to_string());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        // A satisfied trigger set waits for dependencies that can still be
        // installed later; it is fatal only when one of them never can
        for addon in self.registry.all() {
            let name = addon.name.as_str();
            let AutoInstall::When(trigger) = &addon.manifest.auto_install else {
                continue;
            };
            if !self.graph.contains(name)
                || install.contains(name)
                || self.state.state(name) != AddonState::Uninstalled
                || !addon.manifest.installable
                || !trigger.iter().all(|t| satisfied(&*install, t.as_str()))
            {
                continue;
            }
            let pending: Vec<String> = addon
                .manifest
                .effective_depends(name)
                .into_iter()
                .filter(|d| !satisfied(&*install, d.as_str()))
                .collect();
            let missing: Vec<String> = pending
                .iter()
                .filter(|d| !self.can_follow(d))
                .cloned()
                .collect();
            if missing.is_empty() {
                debug!(
                    "'{}' waits for {} before auto-installing",
                    name,
                    pending.join(", ")
                );
                continue;
            }
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::UnsatisfiableAutoInstall,
                    format!(
                        "auto_install trigger of '{}' is satisfied but these dependencies can never be installed: {}",
                        name,
                        missing.join(", ")
                    ),
                )
                .for_addon(name)
                .with_context("missing", missing.join(",")),
            );
        }

        added
    }

    /// The remove side may not contain anything the install side needs
    fn check_conflicts(
        &self,
        request: &PlanRequest,
        install: &BTreeSet<String>,
        upgrade: &BTreeSet<String>,
        remove: &BTreeSet<String>,
        diagnostics: &mut Diagnostics,
    ) {
        let roots = request
            .install
            .iter()
            .chain(request.upgrade.iter())
            .chain(install.iter())
            .chain(upgrade.iter());
        let required = self.graph.transitive_closure(roots, Direction::Forward);

        let conflicting: BTreeSet<&String> = required
            .iter()
            .filter(|n| remove.contains(*n) || request.remove.contains(*n))
            .collect();
        if conflicting.is_empty() {
            return;
        }

        let names: Vec<&str> = conflicting.iter().map(|s| s.as_str()).collect();
        diagnostics.push(
            Diagnostic::new(
                DiagnosticCode::ConflictingRequest,
                format!(
                    "addons are both required and being removed: {}",
                    names.join(", ")
                ),
            )
            .with_context("addons", names.join(",")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use addonctl_core::types::Manifest;
    use std::collections::BTreeMap;

    fn registry(addons: &[(&str, &[&str])]) -> AddonRegistry {
        AddonRegistry::from_manifests(addons.iter().map(|(name, deps)| {
            let mut m = Manifest::new(*name);
            m.depends = deps.iter().map(|d| d.to_string()).collect();
            m
        }))
    }

    fn states(installed: &[&str]) -> BTreeMap<String, AddonState> {
        installed
            .iter()
            .map(|n| (n.to_string(), AddonState::Installed))
            .collect()
    }

    fn names(plan: &Plan) -> Vec<String> {
        plan.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_install_pulls_dependencies() {
        let reg = registry(&[("base", &[]), ("sale", &[]), ("crm", &[]), ("sale_crm", &["sale", "crm"])]);
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&[]);
        let (plan, diags) =
            Planner::new(&reg, &graph, &state).plan(&PlanRequest::new().install(["sale_crm"]));

        assert!(!diags.has_fatal(), "{:?}", diags);
        assert_eq!(
            names(&plan),
            vec!["install base", "install crm", "install sale", "install sale_crm"]
        );
    }

    #[test]
    fn test_installing_installed_addon_is_empty_plan() {
        let reg = registry(&[("base", &[])]);
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&["base"]);
        let (plan, diags) =
            Planner::new(&reg, &graph, &state).plan(&PlanRequest::new().install(["base"]));
        assert!(plan.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_upgrade_propagates_to_dependents() {
        let reg = registry(&[("base", &[]), ("sale", &[]), ("sale_crm", &["sale"])]);
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&["base", "sale", "sale_crm"]);
        let (plan, _) =
            Planner::new(&reg, &graph, &state).plan(&PlanRequest::new().upgrade(["sale"]));
        assert_eq!(names(&plan), vec!["upgrade sale", "upgrade sale_crm"]);
    }

    #[test]
    fn test_upgrade_of_uninstalled_installs() {
        let reg = registry(&[("base", &[]), ("sale", &[])]);
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&["base"]);
        let (plan, _) =
            Planner::new(&reg, &graph, &state).plan(&PlanRequest::new().upgrade(["sale"]));
        assert_eq!(names(&plan), vec!["install sale"]);
    }

    #[test]
    fn test_not_installable_dependency() {
        let mut reg = registry(&[("base", &[]), ("sale", &["legacy"])]);
        let mut legacy = Manifest::new("legacy");
        legacy.installable = false;
        reg.insert(crate::registry::Addon {
            name: "legacy".into(),
            path: "legacy".into(),
            manifest: legacy,
        });
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&["base"]);
        let (plan, diags) =
            Planner::new(&reg, &graph, &state).plan(&PlanRequest::new().install(["sale"]));
        assert!(plan.is_empty());
        assert!(diags.contains(DiagnosticCode::NotInstallable));
    }

    #[test]
    fn test_broken_request_and_unknown_request_reported_together() {
        let reg = registry(&[("base", &[]), ("sale", &["ghost"])]);
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&["base"]);
        let request = PlanRequest::new().install(["sale", "nope"]);
        let (plan, diags) = Planner::new(&reg, &graph, &state).plan(&request);

        assert!(plan.is_empty());
        assert!(diags.contains(DiagnosticCode::BrokenAddon));
        assert!(diags.contains(DiagnosticCode::UnknownAddon));
    }

    #[test]
    fn test_auto_install_skips_empty_depends() {
        let mut reg = registry(&[("base", &[])]);
        let mut lonely = Manifest::new("lonely");
        lonely.auto_install = AutoInstall::WithDependencies;
        reg.insert(crate::registry::Addon {
            name: "lonely".into(),
            path: "lonely".into(),
            manifest: lonely,
        });
        let graph = DependencyGraph::build(&reg).unwrap();
        let state = states(&[]);
        let (plan, _) =
            Planner::new(&reg, &graph, &state).plan(&PlanRequest::new().install(["base"]));
        assert_eq!(names(&plan), vec!["install base"]);
    }
}
