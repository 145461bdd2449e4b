//! Discover command

use addonctl_core::types::{AddonState, Diagnostics};
use addonctl_modules::{AddonRegistry, StateView};
use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::common::{self, Outcome};
use crate::cli::{DiscoverArgs, GlobalArgs};
use crate::output;

#[derive(Tabled, Serialize)]
struct AddonRow {
    name: String,
    version: String,
    state: String,
    #[tabled(rename = "depends")]
    depends: String,
    path: String,
}

#[derive(Serialize)]
struct DiscoverReport<'a> {
    addons: Vec<AddonRow>,
    diagnostics: &'a Diagnostics,
}

pub fn run(args: DiscoverArgs, global: &GlobalArgs) -> Result<Outcome> {
    let config = common::load_config(global)?;
    let (registry, mut diagnostics) = common::discover(&config);
    let state = common::open_state(&config)?;
    diagnostics.extend(state.load_diagnostics().clone());

    let rows = rows(&registry, &state);

    if args.json {
        let report = DiscoverReport {
            addons: rows,
            diagnostics: &diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(Outcome::from_diagnostics(&diagnostics));
    }

    if rows.is_empty() {
        output::info("No addons found");
        if config.addons_paths.is_empty() {
            output::info("Configure addons_paths or pass --addons-path");
        }
    } else {
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{}", table);
    }

    common::report(&diagnostics, global.quiet);
    Ok(Outcome::from_diagnostics(&diagnostics))
}

fn rows(registry: &AddonRegistry, state: &dyn StateView) -> Vec<AddonRow> {
    let mut rows: Vec<AddonRow> = registry
        .all()
        .map(|addon| {
            let installable = if addon.manifest.installable {
                state.state(&addon.name).to_string()
            } else {
                format!("{} (not installable)", state.state(&addon.name))
            };
            AddonRow {
                name: addon.name.clone(),
                version: addon.manifest.version.clone(),
                state: installable,
                depends: join_or_dash(&addon.manifest.depends.iter().cloned().collect::<Vec<_>>()),
                path: addon.path.display().to_string(),
            }
        })
        .collect();

    rows.extend(registry.broken_addons().map(|broken| AddonRow {
        name: broken.name.clone(),
        version: "-".to_string(),
        state: format!("{} ({})", AddonState::Broken, broken.diagnostic.code),
        depends: "-".to_string(),
        path: broken.path.display().to_string(),
    }));

    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
