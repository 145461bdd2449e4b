//! addonctl CLI - addon discovery, planning and lifecycle management
//!
//! This is the main entry point for the addonctl command-line interface.

mod cli;
mod commands;
mod output;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::common::Outcome;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let global = cli.global();
    let result = match cli.command {
        Commands::Discover(args) => commands::discover::run(args, &global),
        Commands::Plan(args) => commands::plan::run(args, &global),
        Commands::Apply(args) => commands::apply::run(args, &global).await,
        Commands::Load(args) => commands::load::run(args, &global),
        Commands::Status(args) => commands::status::run(args, &global),
        Commands::Log(args) => commands::log::run(args, &global),
    };

    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            output::error(&format!("{:#}", e));
            Outcome::Fatal.exit_code()
        }
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
