//! Type definitions for addonctl

pub mod diagnostic_types;
pub mod manifest_types;
pub mod plan_types;
pub mod state_types;

pub use diagnostic_types::*;
pub use manifest_types::*;
pub use plan_types::*;
pub use state_types::*;
