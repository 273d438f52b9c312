//! ci-prep library crate: re-exports for integration tests.
//!
//! The primary interface is the `ci-prep` binary. The selection engine
//! itself lives in `ci-prep-engine`; this crate adds the settings file,
//! error reporting, file handling, and telemetry around it.

pub mod config;
pub mod error;
pub mod files;
pub mod format;
pub mod telemetry;

pub use ci_prep_engine as engine;
