//! Load command: run post_load hooks of installed addons

use addonctl_modules::{DependencyGraph, Executor};
use anyhow::Result;

use super::common::{self, Outcome};
use crate::cli::{GlobalArgs, LoadArgs};
use crate::output;

pub fn run(args: LoadArgs, global: &GlobalArgs) -> Result<Outcome> {
    let config = common::load_config(global)?;
    let (registry, mut diagnostics) = common::discover(&config);
    let state = common::open_state(&config)?;
    diagnostics.extend(state.load_diagnostics().clone());

    let graph = match DependencyGraph::build(&registry) {
        Ok(graph) => graph,
        Err(cycle) => {
            diagnostics.push(cycle);
            common::report(&diagnostics, global.quiet);
            return Ok(Outcome::Fatal);
        }
    };

    diagnostics.extend(graph.unresolved_diagnostics());

    let hooks = common::hook_resolver(args.hooks.unwrap_or(config.hooks));
    diagnostics.extend(Executor::new(&registry, &*hooks).run_post_load(&graph, &state));

    common::report(&diagnostics, global.quiet);
    let outcome = Outcome::from_diagnostics(&diagnostics);
    if !diagnostics.has_blocking() && !global.quiet {
        output::success("post_load hooks completed");
    }
    Ok(outcome)
}
