//! CLI subcommands
//!
//! - discover: list addons found on the search paths
//! - plan: compute an ordered plan without changing state
//! - apply: plan and execute against the state ledger
//! - load: run post_load hooks of installed addons
//! - status: show stored states
//! - log: view the state audit log

pub mod apply;
pub mod common;
pub mod discover;
pub mod load;
pub mod log;
pub mod plan;
pub mod status;
