//! End-to-end transformation: patch, extract, select, reassemble.

use serde::Serialize;
use tracing::instrument;

use crate::block::{extract_blocks, reassemble};
use crate::flags::CiFlags;
use crate::patch::PatchPipeline;
use crate::profile::{Profile, SelectOptions, active_profiles, apply_profiles};
use crate::select::SelectionReport;

/// Output of [`prepare`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prepared {
    /// The derived document.
    #[serde(skip)]
    pub text: String,
    /// Patch stages that changed the document.
    pub patched_stages: Vec<&'static str>,
    /// Number of test blocks before selection.
    pub extracted: usize,
    /// Names of the selected blocks, in output order.
    pub selected: Vec<String>,
    pub report: SelectionReport,
}

/// Transform `text` with the built-in profiles for `flags` followed by `extra` profiles.
#[must_use]
#[instrument(skip_all, fields(arch = %flags.arch, bytes = text.len()))]
pub fn prepare(text: String, flags: &CiFlags, extra: &[Profile], options: &SelectOptions) -> Prepared {
    let (patched, patched_stages) = PatchPipeline::default().apply_traced(text, flags);

    let extraction = extract_blocks(&patched);
    let extracted = extraction.blocks.len();

    let mut profiles = active_profiles(flags);
    if profiles.len() > 1 {
        tracing::warn!(
            profiles = ?profiles.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "more than one CI profile flag is set; applying all in sequence"
        );
    }
    profiles.extend_from_slice(extra);

    let mut report = SelectionReport::default();
    let selected = apply_profiles(extraction.blocks, &profiles, options, &mut report);

    let text = reassemble(&extraction.residue, &selected);
    tracing::info!(extracted, selected = selected.len(), "test selection complete");

    Prepared {
        text,
        patched_stages,
        extracted,
        selected: selected.iter().map(|b| b.name().to_owned()).collect(),
        report,
    }
}
