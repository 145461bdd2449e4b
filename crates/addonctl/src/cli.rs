//! CLI argument parsing with clap

use addonctl_core::HookMode;
use addonctl_modules::ledger::DEFAULT_LOG_TAIL_LINES;
use addonctl_modules::PlanRequest;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// addonctl - discover, plan and apply addon installs
#[derive(Parser, Debug)]
#[command(name = "addonctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Addon search path; repeat for several, earliest wins
    #[arg(long = "addons-path", global = true)]
    pub addons_paths: Vec<Utf8PathBuf>,

    /// State ledger file
    #[arg(long, global = true)]
    pub state_file: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn global(&self) -> GlobalArgs {
        GlobalArgs {
            config: self.config.clone(),
            addons_paths: self.addons_paths.clone(),
            state_file: self.state_file.clone(),
            quiet: self.quiet,
        }
    }
}

/// Flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<Utf8PathBuf>,
    pub addons_paths: Vec<Utf8PathBuf>,
    pub state_file: Option<Utf8PathBuf>,
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List discovered addons and discovery diagnostics
    Discover(DiscoverArgs),

    /// Compute the ordered plan for a request without changing state
    Plan(PlanArgs),

    /// Plan and execute a request
    Apply(ApplyArgs),

    /// Run post_load hooks of installed addons
    Load(LoadArgs),

    /// Show stored addon states
    Status(StatusArgs),

    /// Show the state audit log
    Log(LogArgs),
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Addons to install, upgrade and remove
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Addons to install (comma-separated or repeated)
    #[arg(short, long, value_delimiter = ',')]
    pub install: Vec<String>,

    /// Addons to upgrade
    #[arg(short, long, value_delimiter = ',')]
    pub upgrade: Vec<String>,

    /// Addons to remove
    #[arg(short, long, value_delimiter = ',')]
    pub remove: Vec<String>,
}

impl RequestArgs {
    pub fn to_request(&self) -> PlanRequest {
        PlanRequest::new()
            .install(self.install.iter().cloned())
            .upgrade(self.upgrade.iter().cloned())
            .remove(self.remove.iter().cloned())
    }
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Skip confirmation when the plan removes addons that were not requested
    #[arg(short, long)]
    pub yes: bool,

    /// How declared hooks resolve (strict or noop); overrides config
    #[arg(long)]
    pub hooks: Option<HookMode>,

    /// Output the execution report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// How declared hooks resolve (strict or noop); overrides config
    #[arg(long)]
    pub hooks: Option<HookMode>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Addons to show (default: every addon with stored state)
    pub names: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Only entries for this addon
    pub name: Option<String>,

    /// Only entries written by this request
    #[arg(long)]
    pub request: Option<String>,

    /// Number of most recent entries to show
    #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_TAIL_LINES)]
    pub limit: usize,

    /// Show every entry instead of the tail
    #[arg(long)]
    pub all: bool,

    /// Show ledger statistics instead of entries
    #[arg(long, conflicts_with_all = ["json", "all"])]
    pub stats: bool,

    /// Output as JSON lines
    #[arg(long)]
    pub json: bool,
}
