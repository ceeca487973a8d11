//! Integration test infrastructure for the UPLL managed-object managers
//!
//! Provides:
//! - A recording, scriptable southbound driver
//! - Capability tables and record builders for the built-in key types
//! - A test bed bundling an engine, its store and its collaborators
//! - Store verification helpers
//! - Multi-key-type commit, audit and rename scenarios

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
