//! Addon loading for addonctl
//!
//! This crate handles:
//! - Safe manifest reading (restricted literal evaluation, legacy normalization)
//! - Addon discovery across ordered search paths
//! - Dependency graph construction, cycle detection and ordering
//! - The addon lifecycle state machine and its persistence
//! - Install / upgrade / remove planning
//! - Plan execution through hook and data collaborators

pub mod events;
pub mod executor;
pub mod graph;
pub mod hooks;
pub mod ledger;
pub mod literal;
pub mod planner;
pub mod reader;
pub mod registry;
pub mod state;
pub mod store;

pub use events::{CancelToken, EventSink, ExecutorEvent, NoopSink};
pub use executor::{apply, ExecutionReport, Executor};
pub use graph::{DependencyGraph, Direction};
pub use hooks::{
    DataApplier, Hook, HookContext, HookResolver, HookTable, LoggingHooks, NoHooks, NoopApplier,
    Resources,
};
pub use ledger::{EntryFilter, LedgerStateStore};
pub use planner::{PlanRequest, Planner};
pub use reader::{ManifestRead, ManifestReader};
pub use registry::{Addon, AddonRegistry, BrokenAddon};
pub use state::{StateMachine, StateView};
pub use store::{MemoryStateStore, StateStore};

use addonctl_core::types::{Diagnostics, Plan};
use std::path::Path;

/// Discover every addon in `search_paths`, earliest path first
pub fn discover<P: AsRef<Path>>(search_paths: &[P]) -> (AddonRegistry, Diagnostics) {
    AddonRegistry::discover(search_paths)
}

/// Build the dependency graph and plan `request`
///
/// Unresolved-dependency findings are included in the diagnostics. A cycle
/// yields an empty plan with the fatal `DependencyCycle` diagnostic.
pub fn plan(
    registry: &AddonRegistry,
    state: &dyn StateView,
    request: &PlanRequest,
) -> (Plan, Diagnostics) {
    let graph = match DependencyGraph::build(registry) {
        Ok(graph) => graph,
        Err(cycle) => return (Plan::default(), Diagnostics::from(vec![cycle])),
    };

    let mut diagnostics = graph.unresolved_diagnostics();
    let (plan, planned) = Planner::new(registry, &graph, state).plan(request);
    diagnostics.extend(planned);
    (plan, diagnostics)
}
