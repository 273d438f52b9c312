//! Run configuration captured once from the environment.
//!
//! [`RawFlags`] holds the environment values exactly as they were read
//! (`None` for unset variables). [`CiFlags::resolve`] turns them into the
//! immutable configuration every pipeline stage receives. All fallbacks are
//! the named constants below; no stage reads the environment itself.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_ARCH: &str = "WARPX_TEST_ARCH";
pub const ENV_REGULAR_CARTESIAN_1D: &str = "WARPX_CI_REGULAR_CARTESIAN_1D";
pub const ENV_REGULAR_CARTESIAN_2D: &str = "WARPX_CI_REGULAR_CARTESIAN_2D";
pub const ENV_REGULAR_CARTESIAN_3D: &str = "WARPX_CI_REGULAR_CARTESIAN_3D";
pub const ENV_PSATD: &str = "WARPX_CI_PSATD";
pub const ENV_SINGLE_PRECISION: &str = "WARPX_CI_SINGLE_PRECISION";
pub const ENV_RZ_OR_NOMPI: &str = "WARPX_CI_RZ_OR_NOMPI";
pub const ENV_QED: &str = "WARPX_CI_QED";
pub const ENV_EB: &str = "WARPX_CI_EB";
pub const ENV_OPENPMD: &str = "WARPX_CI_OPENPMD";
pub const ENV_CCACHE: &str = "WARPX_CI_CCACHE";
pub const ENV_NUM_MAKE_JOBS: &str = "WARPX_CI_NUM_MAKE_JOBS";

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// The only value that turns a boolean flag on.
pub const TRUE_LITERAL: &str = "TRUE";

pub const DEFAULT_ARCH: Arch = Arch::Cpu;
pub const DEFAULT_REGULAR_CARTESIAN_1D: bool = false;
pub const DEFAULT_REGULAR_CARTESIAN_2D: bool = false;
pub const DEFAULT_REGULAR_CARTESIAN_3D: bool = false;
pub const DEFAULT_PSATD: bool = true;
pub const DEFAULT_SINGLE_PRECISION: bool = false;
pub const DEFAULT_RZ_OR_NOMPI: bool = false;
pub const DEFAULT_QED: bool = false;
pub const DEFAULT_EB: bool = false;
pub const DEFAULT_OPENPMD: bool = false;
pub const DEFAULT_CCACHE: bool = false;

/// Directory hard-coded in the master test file.
pub const DEFAULT_REFERENCE_DIR: &str = "/home/regtester/AMReX_RegTesting";

/// Suffix stripped from the working directory to find the test directory.
pub const DEFAULT_REGRESSION_SUFFIX: &str = "warpx/Regression";

// ---------------------------------------------------------------------------
// Arch
// ---------------------------------------------------------------------------

/// Target architecture of the CI run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Arch {
    Cpu,
    Gpu,
    /// Any other value. Carried verbatim; gets neither CPU nor GPU patches.
    Other(String),
}

impl Arch {
    /// Parse an architecture name. Matching is exact (`"gpu"` is `Other`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CPU" => Self::Cpu,
            "GPU" => Self::Gpu,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Gpu => write!(f, "GPU"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

impl From<Arch> for String {
    fn from(arch: Arch) -> Self {
        arch.to_string()
    }
}

// ---------------------------------------------------------------------------
// RawFlags
// ---------------------------------------------------------------------------

/// Flag values as read from the environment, before any defaulting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawFlags {
    pub arch: Option<String>,
    pub regular_cartesian_1d: Option<String>,
    pub regular_cartesian_2d: Option<String>,
    pub regular_cartesian_3d: Option<String>,
    pub psatd: Option<String>,
    pub single_precision: Option<String>,
    pub rz_or_nompi: Option<String>,
    pub qed: Option<String>,
    pub eb: Option<String>,
    pub openpmd: Option<String>,
    pub ccache: Option<String>,
    pub num_make_jobs: Option<String>,
}

impl RawFlags {
    /// Capture every flag through `lookup` (usually `std::env::var`).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            arch: lookup(ENV_ARCH),
            regular_cartesian_1d: lookup(ENV_REGULAR_CARTESIAN_1D),
            regular_cartesian_2d: lookup(ENV_REGULAR_CARTESIAN_2D),
            regular_cartesian_3d: lookup(ENV_REGULAR_CARTESIAN_3D),
            psatd: lookup(ENV_PSATD),
            single_precision: lookup(ENV_SINGLE_PRECISION),
            rz_or_nompi: lookup(ENV_RZ_OR_NOMPI),
            qed: lookup(ENV_QED),
            eb: lookup(ENV_EB),
            openpmd: lookup(ENV_OPENPMD),
            ccache: lookup(ENV_CCACHE),
            num_make_jobs: lookup(ENV_NUM_MAKE_JOBS),
        }
    }
}

// ---------------------------------------------------------------------------
// CiFlags
// ---------------------------------------------------------------------------

/// Immutable configuration for one run. Fully determines pipeline behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CiFlags {
    pub arch: Arch,
    /// Directory the tests run in; replaces [`CiFlags::reference_dir`].
    pub test_dir: String,
    pub reference_dir: String,
    pub regular_cartesian_1d: bool,
    pub regular_cartesian_2d: bool,
    pub regular_cartesian_3d: bool,
    pub psatd: bool,
    pub single_precision: bool,
    pub rz_or_nompi: bool,
    pub qed: bool,
    pub eb: bool,
    pub openpmd: bool,
    pub ccache: bool,
    pub num_make_jobs: Option<u32>,
}

impl Default for CiFlags {
    fn default() -> Self {
        Self {
            arch: DEFAULT_ARCH,
            test_dir: String::new(),
            reference_dir: DEFAULT_REFERENCE_DIR.to_owned(),
            regular_cartesian_1d: DEFAULT_REGULAR_CARTESIAN_1D,
            regular_cartesian_2d: DEFAULT_REGULAR_CARTESIAN_2D,
            regular_cartesian_3d: DEFAULT_REGULAR_CARTESIAN_3D,
            psatd: DEFAULT_PSATD,
            single_precision: DEFAULT_SINGLE_PRECISION,
            rz_or_nompi: DEFAULT_RZ_OR_NOMPI,
            qed: DEFAULT_QED,
            eb: DEFAULT_EB,
            openpmd: DEFAULT_OPENPMD,
            ccache: DEFAULT_CCACHE,
            num_make_jobs: None,
        }
    }
}

impl CiFlags {
    /// Apply the defaulting rules to raw environment values.
    ///
    /// A boolean flag is on only when its value is exactly `TRUE`; an unset
    /// flag takes its `DEFAULT_*` constant. A job count that is not an
    /// unsigned integer is dropped with a warning.
    #[must_use]
    pub fn resolve(raw: &RawFlags, test_dir: String, reference_dir: String) -> Self {
        let num_make_jobs = raw.num_make_jobs.as_deref().and_then(|value| {
            value.trim().parse::<u32>().map_or_else(
                |_| {
                    tracing::warn!(
                        variable = ENV_NUM_MAKE_JOBS,
                        value,
                        "ignoring non-integer job count"
                    );
                    None
                },
                Some,
            )
        });

        Self {
            arch: raw.arch.as_deref().map_or(DEFAULT_ARCH, Arch::parse),
            test_dir,
            reference_dir,
            regular_cartesian_1d: flag(
                raw.regular_cartesian_1d.as_deref(),
                DEFAULT_REGULAR_CARTESIAN_1D,
            ),
            regular_cartesian_2d: flag(
                raw.regular_cartesian_2d.as_deref(),
                DEFAULT_REGULAR_CARTESIAN_2D,
            ),
            regular_cartesian_3d: flag(
                raw.regular_cartesian_3d.as_deref(),
                DEFAULT_REGULAR_CARTESIAN_3D,
            ),
            psatd: flag(raw.psatd.as_deref(), DEFAULT_PSATD),
            single_precision: flag(raw.single_precision.as_deref(), DEFAULT_SINGLE_PRECISION),
            rz_or_nompi: flag(raw.rz_or_nompi.as_deref(), DEFAULT_RZ_OR_NOMPI),
            qed: flag(raw.qed.as_deref(), DEFAULT_QED),
            eb: flag(raw.eb.as_deref(), DEFAULT_EB),
            openpmd: flag(raw.openpmd.as_deref(), DEFAULT_OPENPMD),
            ccache: flag(raw.ccache.as_deref(), DEFAULT_CCACHE),
            num_make_jobs,
        }
    }
}

fn flag(value: Option<&str>, default: bool) -> bool {
    value.map_or(default, |v| v == TRUE_LITERAL)
}

/// Working test directory: `current_dir` with every `suffix` occurrence removed.
#[must_use]
pub fn derive_test_dir(current_dir: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return current_dir.to_owned();
    }
    current_dir.replace(suffix, "")
}
