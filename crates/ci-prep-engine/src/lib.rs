//! Test-block selection and rewrite engine for regression-test CI files.
//!
//! The engine works on the master test file as text:
//!
//! 1. [`patch::PatchPipeline`] applies ordered global substitutions.
//! 2. [`block::extract_blocks`] carves the test blocks out of the document.
//! 3. [`profile`] composes calls to [`select::select`] into the CI profiles.
//! 4. [`block::reassemble`] appends the surviving blocks to the residue.
//!
//! [`prepare::prepare`] runs all four steps. Nothing here touches the
//! environment or the file system; callers capture [`flags::CiFlags`] once
//! and pass it in.

pub mod block;
pub mod flags;
pub mod patch;
pub mod prepare;
pub mod profile;
pub mod select;

pub use block::{Extraction, TestBlock, extract_blocks, reassemble};
pub use flags::{Arch, CiFlags, RawFlags};
pub use patch::PatchPipeline;
pub use prepare::{Prepared, prepare};
pub use profile::{CustomProfile, Profile, SelectOptions};
pub use select::{Pass, SelectError, SelectionReport, select};
