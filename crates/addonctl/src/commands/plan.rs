//! Plan command

use addonctl_core::types::{Diagnostics, Plan};
use anyhow::Result;
use console::style;
use serde::Serialize;

use super::common::{self, Outcome};
use crate::cli::{GlobalArgs, PlanArgs};
use crate::output;

#[derive(Serialize)]
struct PlanReport<'a> {
    plan: &'a Plan,
    diagnostics: &'a Diagnostics,
}

pub fn run(args: PlanArgs, global: &GlobalArgs) -> Result<Outcome> {
    let config = common::load_config(global)?;
    let (registry, mut diagnostics) = common::discover(&config);
    let state = common::open_state(&config)?;
    diagnostics.extend(state.load_diagnostics().clone());

    let (plan, planned) = addonctl_modules::plan(&registry, &state, &args.request.to_request());
    diagnostics.extend(planned);

    if args.json {
        let report = PlanReport {
            plan: &plan,
            diagnostics: &diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        common::report(&diagnostics, global.quiet);
        if !diagnostics.has_blocking() {
            print_plan(&plan);
        }
    }

    Ok(Outcome::from_diagnostics(&diagnostics))
}

/// Numbered plan steps, with implied and automatic additions marked
pub fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        output::info("Nothing to do");
        return;
    }

    output::header(&format!("Plan ({} steps)", plan.len()));
    for (i, step) in plan.iter().enumerate() {
        let note = if plan.implied_removals.contains(&step.addon) {
            style(" (implied by dependency)").yellow().to_string()
        } else if plan.auto_installed.contains(&step.addon) {
            style(" (auto-install)").cyan().to_string()
        } else {
            String::new()
        };
        println!("  {:>3}. {}{}", i + 1, step, note);
    }
}
