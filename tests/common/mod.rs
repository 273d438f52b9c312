//! Shared test helpers for ci-prep integration tests.
//!
//! Every test runs the binary in its own temp directory with the WARPX_* and
//! CI_PREP_* variables scrubbed, so the host environment never leaks in.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Variables the binary reads; removed before every run.
const SCRUBBED: &[&str] = &[
    "WARPX_TEST_ARCH",
    "WARPX_CI_REGULAR_CARTESIAN_1D",
    "WARPX_CI_REGULAR_CARTESIAN_2D",
    "WARPX_CI_REGULAR_CARTESIAN_3D",
    "WARPX_CI_PSATD",
    "WARPX_CI_SINGLE_PRECISION",
    "WARPX_CI_RZ_OR_NOMPI",
    "WARPX_CI_QED",
    "WARPX_CI_EB",
    "WARPX_CI_OPENPMD",
    "WARPX_CI_CCACHE",
    "WARPX_CI_NUM_MAKE_JOBS",
    "CI_PREP_CONFIG",
    "CI_PREP_PROFILES",
    "CI_PREP_DEDUPE_UNION",
    "OTEL_EXPORTER_OTLP_ENDPOINT",
    "RUST_LOG",
];

/// A small master test file covering the CI matrix.
pub const MASTER: &str = "\
[main]
testTopDir = /home/regtester/AMReX_RegTesting/rt-WarpX/
webTopDir  = /home/regtester/AMReX_RegTesting/rt-WarpX/web
sourceTree = C_Src
numMakeJobs = 2
sendEmailWhenFail = 1

[AMReX]
dir = /home/regtester/AMReX_RegTesting/amrex/
branch = development

[plain_1d]
buildDir = .
inputFile = Examples/inputs_1d
dim = 1
addToCompileString =
runtime_params =

[rz_1d]
buildDir = .
inputFile = Examples/inputs_rz
dim = 1
addToCompileString = USE_RZ=TRUE
runtime_params =

[plain_2d]
buildDir = .
inputFile = Examples/inputs_2d
dim = 2
addToCompileString = USE_FFT=FALSE
runtime_params =

[nompi_2d]
buildDir = .
inputFile = Examples/inputs_nompi
dim = 2
useMPI = 0
addToCompileString =
runtime_params =

[rz_nompi]
buildDir = .
inputFile = Examples/inputs_rz_nompi
dim = 2
useMPI = 0
addToCompileString = USE_RZ=TRUE
runtime_params =

[qed_3d]
buildDir = .
inputFile = Examples/inputs_qed
dim = 3
addToCompileString = QED=TRUE
runtime_params =
";

/// Temp directory holding `WarpX-tests.ini` with `contents`.
pub fn setup_with(contents: &str) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    std::fs::write(dir.path().join("WarpX-tests.ini"), contents)
        .expect("failed to write WarpX-tests.ini");
    dir
}

/// Temp directory holding the standard [`MASTER`] file.
pub fn setup() -> TempDir {
    setup_with(MASTER)
}

/// Run ci-prep in `dir` with a scrubbed environment plus `env`.
pub fn ci_prep_in(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ci-prep"));
    cmd.args(args).current_dir(dir);
    for name in SCRUBBED {
        cmd.env_remove(name);
    }
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.output().expect("failed to execute ci-prep")
}

/// Run ci-prep and assert it succeeds. Returns stdout as string.
pub fn ci_prep_ok(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> String {
    let out = ci_prep_in(dir, args, env);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "ci-prep {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run ci-prep and assert it fails. Returns stderr as string.
pub fn ci_prep_fails(dir: &Path, args: &[&str], env: &[(&str, &str)]) -> String {
    let out = ci_prep_in(dir, args, env);
    assert!(
        !out.status.success(),
        "ci-prep {} should have failed:\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout)
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

/// Contents of the derived `ci-tests.ini`.
pub fn read_output(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("ci-tests.ini")).expect("ci-tests.ini should exist")
}

/// Section names of test blocks in `text`, in order.
pub fn test_names(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        if line.starts_with('[') && line.ends_with(']') {
            current = Some(line[1..line.len() - 1].to_owned());
        } else if line.starts_with("inputFile")
            && let Some(name) = current.take()
        {
            names.push(name);
        }
    }
    names
}
