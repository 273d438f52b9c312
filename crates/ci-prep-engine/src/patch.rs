//! Patch pipeline: ordered global substitutions over the whole document.
//!
//! Each [`Stage`] is a pure `(text, flags) -> text` function. The pipeline
//! folds the document through the stages in a fixed order; later stages see
//! text injected by earlier ones, so the order is part of the contract.
//!
//! Keyed substitutions (`addToCompileString =`, `runtime_params =`) rewrite
//! every occurrence because each test block carries its own copy of the key.
//! Stages are meant to run once: re-running the pipeline stacks another copy
//! of every injection.

use std::sync::LazyLock;

use regex::Regex;

use crate::flags::{Arch, CiFlags};

pub const COMPILE_KEY: &str = "addToCompileString =";
pub const RUNTIME_KEY: &str = "runtime_params =";

pub const GPU_COMPILE_FLAGS: &str = "USE_GPU=TRUE USE_OMP=FALSE ";
pub const OPENPMD_COMPILE_FLAG: &str = "USE_OPENPMD=TRUE ";
pub const PSATD_COMPILE_FLAG: &str = "USE_FFT=TRUE ";
pub const PSATD_DISABLE_FLAG: &str = "USE_FFT=FALSE";
pub const CCACHE_COMPILE_FLAG: &str = "USE_CCACHE=TRUE ";

/// Abort on unused inputs, trap invalid/zero/overflow FPEs, escalate warnings.
pub const STRICT_RUNTIME_PARAMS: &str = "amrex.abort_on_unused_inputs=1 \
     amrex.fpe_trap_invalid=1 amrex.fpe_trap_zero=1 amrex.fpe_trap_overflow=1 \
     warpx.always_warn_immediately=1 warpx.abort_on_warning_threshold=low";

/// No dynamic OpenMP scheduling, serialized initial conditions.
pub const CPU_RUNTIME_PARAMS: &str =
    "warpx.do_dynamic_scheduling=0 warpx.serialize_initial_conditions=1";

static WEB_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w\-/]*/web").expect("static regex"));

static HEADER_BEFORE_BUILD_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<name>.*)\]\nbuildDir = ").expect("static regex")
});

static NUM_MAKE_JOBS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"numMakeJobs = \d+").expect("static regex"));

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One named substitution step.
#[derive(Clone, Copy)]
pub struct Stage {
    pub name: &'static str,
    pub apply: fn(String, &CiFlags) -> String,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

/// The stages in their required order.
pub const STAGES: [Stage; 11] = [
    Stage { name: "reference-dir", apply: replace_reference_dir },
    Stage { name: "strip-web-dir", apply: strip_web_dir },
    Stage { name: "disable-comparison", apply: disable_comparison },
    Stage { name: "gpu-compile", apply: gpu_compile },
    Stage { name: "openpmd", apply: openpmd },
    Stage { name: "psatd", apply: psatd },
    Stage { name: "ccache", apply: ccache },
    Stage { name: "strict-runtime", apply: strict_runtime },
    Stage { name: "cpu-runtime", apply: cpu_runtime },
    Stage { name: "make-jobs", apply: make_jobs },
    Stage { name: "no-email", apply: no_email },
];

// ---------------------------------------------------------------------------
// PatchPipeline
// ---------------------------------------------------------------------------

/// Ordered list of stages applied by a fold.
#[derive(Clone, Debug)]
pub struct PatchPipeline {
    stages: Vec<Stage>,
}

impl Default for PatchPipeline {
    fn default() -> Self {
        Self {
            stages: STAGES.to_vec(),
        }
    }
}

impl PatchPipeline {
    #[must_use]
    pub const fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name).collect()
    }

    /// Run every stage over `text`.
    #[must_use]
    pub fn apply(&self, text: String, flags: &CiFlags) -> String {
        self.stages
            .iter()
            .fold(text, |acc, stage| (stage.apply)(acc, flags))
    }

    /// Like [`PatchPipeline::apply`], also returning the stages that changed the text.
    #[must_use]
    pub fn apply_traced(&self, text: String, flags: &CiFlags) -> (String, Vec<&'static str>) {
        let mut changed = Vec::new();
        let out = self.stages.iter().fold(text, |acc, stage| {
            let before = acc.clone();
            let next = (stage.apply)(acc, flags);
            if next != before {
                tracing::debug!(stage = stage.name, "patch stage rewrote document");
                changed.push(stage.name);
            }
            next
        });
        (out, changed)
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn replace_reference_dir(text: String, flags: &CiFlags) -> String {
    if flags.reference_dir.is_empty() || !text.contains(&flags.reference_dir) {
        return text;
    }
    text.replace(&flags.reference_dir, &flags.test_dir)
}

fn strip_web_dir(text: String, _flags: &CiFlags) -> String {
    WEB_DIR.replace_all(&text, "").into_owned()
}

fn disable_comparison(text: String, _flags: &CiFlags) -> String {
    HEADER_BEFORE_BUILD_DIR
        .replace_all(&text, "[${name}]\ndoComparison = 0\nbuildDir = ")
        .into_owned()
}

fn gpu_compile(text: String, flags: &CiFlags) -> String {
    if flags.arch == Arch::Gpu {
        inject_after(&text, COMPILE_KEY, GPU_COMPILE_FLAGS)
    } else {
        text
    }
}

fn openpmd(text: String, flags: &CiFlags) -> String {
    if flags.openpmd {
        inject_after(&text, COMPILE_KEY, OPENPMD_COMPILE_FLAG)
    } else {
        text
    }
}

/// The enable flag wins: any explicit `USE_FFT=FALSE` is removed.
fn psatd(text: String, flags: &CiFlags) -> String {
    if flags.psatd {
        inject_after(&text, COMPILE_KEY, PSATD_COMPILE_FLAG).replace(PSATD_DISABLE_FLAG, "")
    } else {
        text
    }
}

fn ccache(text: String, flags: &CiFlags) -> String {
    if flags.ccache {
        inject_after(&text, COMPILE_KEY, CCACHE_COMPILE_FLAG)
    } else {
        text
    }
}

fn strict_runtime(text: String, _flags: &CiFlags) -> String {
    inject_after(&text, RUNTIME_KEY, STRICT_RUNTIME_PARAMS)
}

fn cpu_runtime(text: String, flags: &CiFlags) -> String {
    if flags.arch == Arch::Cpu {
        inject_after(&text, RUNTIME_KEY, CPU_RUNTIME_PARAMS)
    } else {
        text
    }
}

fn make_jobs(text: String, flags: &CiFlags) -> String {
    match flags.num_make_jobs {
        Some(jobs) => NUM_MAKE_JOBS
            .replace_all(&text, format!("numMakeJobs = {jobs}").as_str())
            .into_owned(),
        None => text,
    }
}

fn no_email(text: String, _flags: &CiFlags) -> String {
    text.replace("sendEmailWhenFail = 1", "sendEmailWhenFail = 0")
}

/// Rewrite every `key` to `key <insert>`.
fn inject_after(text: &str, key: &str, insert: &str) -> String {
    text.replace(key, &format!("{key} {insert}"))
}
