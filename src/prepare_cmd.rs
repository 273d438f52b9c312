//! `ci-prep prepare` and `ci-prep list`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Serialize;

use ci_prep::config::{DEFAULT_CONFIG_FILE, PrepConfig};
use ci_prep::engine::flags::{
    ENV_ARCH, ENV_CCACHE, ENV_EB, ENV_NUM_MAKE_JOBS, ENV_OPENPMD, ENV_PSATD, ENV_QED,
    ENV_REGULAR_CARTESIAN_1D, ENV_REGULAR_CARTESIAN_2D, ENV_REGULAR_CARTESIAN_3D,
    ENV_RZ_OR_NOMPI, ENV_SINGLE_PRECISION, derive_test_dir,
};
use ci_prep::engine::profile::resolve_custom;
use ci_prep::engine::{CiFlags, Prepared, Profile, RawFlags, SelectError, SelectOptions};
use ci_prep::error::PrepError;
use ci_prep::files::{read_source, write_atomic};
use ci_prep::format::OutputFormat;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// CI flags. Each reads its environment variable; the option wins if both are set.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct FlagArgs {
    /// Target architecture (CPU or GPU) [default: CPU]
    #[arg(long, env = ENV_ARCH, global = true, value_name = "ARCH")]
    pub arch: Option<String>,

    /// Keep only regular 1D Cartesian tests
    #[arg(long, env = ENV_REGULAR_CARTESIAN_1D, global = true, value_name = "TRUE")]
    pub regular_cartesian_1d: Option<String>,

    /// Keep only regular 2D Cartesian tests
    #[arg(long, env = ENV_REGULAR_CARTESIAN_2D, global = true, value_name = "TRUE")]
    pub regular_cartesian_2d: Option<String>,

    /// Keep only regular 3D Cartesian tests
    #[arg(long, env = ENV_REGULAR_CARTESIAN_3D, global = true, value_name = "TRUE")]
    pub regular_cartesian_3d: Option<String>,

    /// Build with PSATD (FFT) support [default: TRUE]
    #[arg(long, env = ENV_PSATD, global = true, value_name = "TRUE")]
    pub psatd: Option<String>,

    /// Keep only single-precision tests
    #[arg(long, env = ENV_SINGLE_PRECISION, global = true, value_name = "TRUE")]
    pub single_precision: Option<String>,

    /// Keep only RZ or no-MPI tests
    #[arg(long, env = ENV_RZ_OR_NOMPI, global = true, value_name = "TRUE")]
    pub rz_or_nompi: Option<String>,

    /// Keep only QED tests
    #[arg(long, env = ENV_QED, global = true, value_name = "TRUE")]
    pub qed: Option<String>,

    /// Keep only embedded-boundary tests
    #[arg(long, env = ENV_EB, global = true, value_name = "TRUE")]
    pub eb: Option<String>,

    /// Build with openPMD support
    #[arg(long, env = ENV_OPENPMD, global = true, value_name = "TRUE")]
    pub openpmd: Option<String>,

    /// Build through ccache
    #[arg(long, env = ENV_CCACHE, global = true, value_name = "TRUE")]
    pub ccache: Option<String>,

    /// Override numMakeJobs
    #[arg(long, env = ENV_NUM_MAKE_JOBS, global = true, value_name = "N")]
    pub num_make_jobs: Option<String>,
}

impl From<&FlagArgs> for RawFlags {
    fn from(args: &FlagArgs) -> Self {
        Self {
            arch: args.arch.clone(),
            regular_cartesian_1d: args.regular_cartesian_1d.clone(),
            regular_cartesian_2d: args.regular_cartesian_2d.clone(),
            regular_cartesian_3d: args.regular_cartesian_3d.clone(),
            psatd: args.psatd.clone(),
            single_precision: args.single_precision.clone(),
            rz_or_nompi: args.rz_or_nompi.clone(),
            qed: args.qed.clone(),
            eb: args.eb.clone(),
            openpmd: args.openpmd.clone(),
            ccache: args.ccache.clone(),
            num_make_jobs: args.num_make_jobs.clone(),
        }
    }
}

/// Options shared by every command that runs the engine.
#[derive(clap::Args, Clone, Debug)]
pub struct RunArgs {
    /// Settings file (missing file means defaults)
    #[arg(long, env = "CI_PREP_CONFIG", global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Master test file [default: from settings, else WarpX-tests.ini]
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// Test directory [default: working directory minus the regression suffix]
    #[arg(long, global = true)]
    pub test_dir: Option<String>,

    /// Custom profile from the settings file to apply after the built-in ones (repeatable)
    #[arg(
        long = "profile",
        env = "CI_PREP_PROFILES",
        global = true,
        value_delimiter = ','
    )]
    pub profiles: Vec<String>,

    /// Drop tests selected twice by the rz-or-nompi union
    #[arg(
        long,
        env = "CI_PREP_DEDUPE_UNION",
        global = true,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub dedupe_union: bool,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct PrepareArgs {
    /// Derived test file [default: from settings, else ci-tests.ini]
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Print the derived file to stdout instead of writing it
    #[arg(long, global = true)]
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything a run needs, resolved once from flags, options, and settings.
struct Session {
    flags: CiFlags,
    profiles: Vec<Profile>,
    options: SelectOptions,
    source: PathBuf,
    output: PathBuf,
}

impl Session {
    fn load(flag_args: &FlagArgs, run: &RunArgs) -> Result<Self, PrepError> {
        let config = PrepConfig::load(&run.config)?;

        let test_dir = match &run.test_dir {
            Some(dir) => dir.clone(),
            None => {
                let cwd = std::env::current_dir()?;
                derive_test_dir(&cwd.to_string_lossy(), &config.paths.regression_suffix)
            }
        };

        let flags = CiFlags::resolve(
            &RawFlags::from(flag_args),
            test_dir,
            config.paths.reference_dir.clone(),
        );

        let profiles = resolve_custom(&config.profiles, &run.profiles).map_err(|e| match e {
            SelectError::UnknownProfile { name } => PrepError::UnknownProfile {
                name,
                available: config
                    .profile_names()
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
            },
            other => PrepError::from(other),
        })?;

        let options = SelectOptions {
            dedupe_union: run.dedupe_union || config.selection.dedupe_union,
        };

        Ok(Self {
            flags,
            profiles,
            options,
            source: run.source.clone().unwrap_or(config.paths.source),
            output: config.paths.output,
        })
    }

    fn run(&self) -> Result<Prepared, PrepError> {
        let text = read_source(&self.source)?;
        Ok(ci_prep::engine::prepare(
            text,
            &self.flags,
            &self.profiles,
            &self.options,
        ))
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Write the derived CI test file.
pub fn prepare(
    flag_args: &FlagArgs,
    run: &RunArgs,
    args: &PrepareArgs,
    quiet: bool,
) -> Result<()> {
    let session = Session::load(flag_args, run)?;
    // Progress goes to stderr when stdout carries the document.
    let progress = |line: &str| {
        if quiet {
            return;
        }
        if args.dry_run {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };

    progress(&format!("Compiling for {}", session.flags.arch));
    let prepared = session.run()?;
    for pass in &prepared.report.passes {
        progress(&pass.to_string());
    }

    if args.dry_run {
        print!("{}", prepared.text);
        return Ok(());
    }

    let output = args.output.clone().unwrap_or_else(|| session.output.clone());
    write_atomic(&output, &prepared.text)?;
    progress(&format!(
        "Selected {} of {} tests; wrote {}",
        prepared.selected.len(),
        prepared.extracted,
        display_path(&output)
    ));
    Ok(())
}

#[derive(Serialize)]
struct Listing<'a> {
    source: String,
    flags: &'a CiFlags,
    #[serde(flatten)]
    prepared: &'a Prepared,
}

/// Print the selected tests without writing anything.
pub fn list(flag_args: &FlagArgs, run: &RunArgs, format: OutputFormat) -> Result<()> {
    let session = Session::load(flag_args, run)?;
    let prepared = session.run()?;

    match format {
        OutputFormat::Text => {
            for name in &prepared.selected {
                println!("{name}");
            }
        }
        OutputFormat::Json => {
            let listing = Listing {
                source: display_path(&session.source),
                flags: &session.flags,
                prepared: &prepared,
            };
            let out = format
                .serialize(&listing)
                .context("failed to render selection report")?;
            println!("{out}");
        }
    }
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
