//! Status command

use addonctl_core::types::AddonState;
use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::common::{self, Outcome};
use crate::cli::{GlobalArgs, StatusArgs};
use crate::output;

#[derive(Tabled, Serialize)]
struct StatusRow {
    name: String,
    state: AddonState,
    #[tabled(rename = "installed version")]
    installed_version: String,
}

pub fn run(args: StatusArgs, global: &GlobalArgs) -> Result<Outcome> {
    let config = common::load_config(global)?;
    let state = common::open_state(&config)?;

    let names: Vec<String> = if args.names.is_empty() {
        state.records().keys().cloned().collect()
    } else {
        args.names.clone()
    };

    let rows: Vec<StatusRow> = names
        .into_iter()
        .map(|name| StatusRow {
            state: state.current(&name),
            installed_version: state
                .installed_version(&name)
                .unwrap_or("-")
                .to_string(),
            name,
        })
        .collect();

    let diagnostics = state.load_diagnostics();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(Outcome::from_diagnostics(diagnostics));
    }

    common::report(diagnostics, global.quiet);
    if rows.is_empty() {
        output::info(&format!("No addon state recorded in {}", config.state_file));
    } else {
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{}", table);
    }
    Ok(Outcome::from_diagnostics(diagnostics))
}
