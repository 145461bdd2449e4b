//! Apply command
//!
//! Plans the request, confirms implied removals, then executes the plan on a
//! blocking thread while Ctrl-C requests cancellation between steps.

use addonctl_core::types::{Action, Diagnostics};
use addonctl_modules::{
    Addon, CancelToken, DataApplier, ExecutionReport, Executor, ExecutorEvent, Resources,
};
use anyhow::{bail, Context, Result};
use dialoguer::Confirm;
use indicatif::ProgressBar;
use std::path::{Component, Path};

use super::common::{self, Outcome};
use super::plan::print_plan;
use crate::cli::{ApplyArgs, GlobalArgs};
use crate::output;

pub async fn run(args: ApplyArgs, global: &GlobalArgs) -> Result<Outcome> {
    let config = common::load_config(global)?;
    let (registry, mut diagnostics) = common::discover(&config);
    let mut state = common::open_state(&config)?;
    diagnostics.extend(state.load_diagnostics().clone());

    let (plan, planned) = addonctl_modules::plan(&registry, &state, &args.request.to_request());
    diagnostics.extend(planned);

    if diagnostics.has_blocking() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            common::report(&diagnostics, global.quiet);
        }
        return Ok(Outcome::Fatal);
    }
    if !args.json {
        common::report(&diagnostics, global.quiet);
        print_plan(&plan);
    }
    if plan.is_empty() {
        return Ok(Outcome::from_diagnostics(&diagnostics));
    }

    if !plan.implied_removals.is_empty() && !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "This also removes {}. Continue?",
                plan.implied_removals.join(", ")
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            output::info("Cancelled");
            return Ok(Outcome::Cancelled);
        }
    }

    let token = CancelToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let pb = if args.json || global.quiet {
        ProgressBar::hidden()
    } else {
        output::progress_bar(plan.len() as u64, "Applying")
    };
    let hooks_mode = args.hooks.unwrap_or(config.hooks);
    let sink_pb = pb.clone();

    let report = tokio::task::spawn_blocking(move || {
        let hooks = common::hook_resolver(hooks_mode);
        let report = Executor::new(&registry, &*hooks)
            .with_cancel(token)
            .with_sink(progress_sink(sink_pb))
            .apply(&plan, &mut state, &mut ResourceChecker);
        report
    })
    .await
    .context("Executor task failed")?;
    pb.finish_and_clear();

    let outcome = outcome(&report, &diagnostics);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(outcome);
    }

    common::report(&report.diagnostics, global.quiet);
    match outcome {
        Outcome::Cancelled => output::warning(&format!(
            "Cancelled after {} steps",
            report.committed.len()
        )),
        Outcome::Fatal => output::error(&format!(
            "Stopped after {} committed steps",
            report.committed.len()
        )),
        _ => output::success(&format!("Applied {} steps", report.committed.len())),
    }
    Ok(outcome)
}

fn outcome(report: &ExecutionReport, planned: &Diagnostics) -> Outcome {
    if report.cancelled {
        return Outcome::Cancelled;
    }
    let mut all = planned.clone();
    all.extend(report.diagnostics.clone());
    Outcome::from_diagnostics(&all)
}

fn progress_sink(pb: ProgressBar) -> impl FnMut(&ExecutorEvent) {
    move |event: &ExecutorEvent| match event {
        ExecutorEvent::StepStarted {
            index,
            addon,
            action,
            ..
        } => {
            pb.set_position(*index as u64);
            pb.set_message(format!("{} {}", action, addon));
        }
        ExecutorEvent::StepCommitted { index, .. } => pb.set_position(*index as u64 + 1),
        ExecutorEvent::StepFailed { addon, .. } => {
            pb.abandon_with_message(format!("failed at {}", addon))
        }
        ExecutorEvent::Cancelled { remaining, .. } => {
            pb.abandon_with_message(format!("cancelled, {} steps not run", remaining))
        }
    }
}

/// Checks that declared data and demo files exist inside the addon directory
struct ResourceChecker;

impl DataApplier for ResourceChecker {
    fn apply(&mut self, addon: &Addon, action: Action, resources: Resources<'_>) -> Result<()> {
        if action == Action::Remove {
            return Ok(());
        }
        for file in resources.data.iter().chain(resources.demo) {
            check_resource(&addon.path, file)?;
        }
        tracing::debug!(
            "Verified {} resources of '{}'",
            resources.data.len() + resources.demo.len(),
            addon.name
        );
        Ok(())
    }
}

fn check_resource(addon_dir: &Path, file: &str) -> Result<()> {
    let relative = Path::new(file);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        bail!("resource '{}' is not inside the addon directory", file);
    }
    if !addon_dir.join(relative).is_file() {
        bail!("resource '{}' not found in {}", file, addon_dir.display());
    }
    Ok(())
}
