//! Common test utilities for addonctl-modules
//!
//! This module provides shared test infrastructure including:
//! - Manifest and addon-tree builders writing fixtures to temp directories
//! - Recording hook resolvers, data appliers and state stores
//! - Assertion helpers for plan ordering

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod builders;
pub mod mocks;

pub use assertions::*;
pub use builders::*;
pub use mocks::*;
