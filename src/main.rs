use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use ci_prep::format::OutputFormat;

mod prepare_cmd;

/// Derive a CI regression-test file from the master test battery
///
/// Reads the master test file (WarpX-tests.ini), patches global settings,
/// keeps the test blocks selected by the WARPX_* environment flags, and
/// writes the result (ci-tests.ini).
///
/// QUICK START:
///
///   # 2D Cartesian tests on CPU, 2 compile jobs
///   WARPX_CI_REGULAR_CARTESIAN_2D=TRUE WARPX_CI_NUM_MAKE_JOBS=2 ci-prep
///
///   # See which tests a GPU run would get, without writing anything
///   WARPX_TEST_ARCH=GPU ci-prep list
///
/// Boolean flags are on only when set to exactly TRUE. Unset flags take
/// their defaults (arch CPU, PSATD on, everything else off).
#[derive(Parser)]
#[command(name = "ci-prep")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'ci-prep <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(flatten)]
    flags: prepare_cmd::FlagArgs,

    #[command(flatten)]
    run: prepare_cmd::RunArgs,

    #[command(flatten)]
    prepare: prepare_cmd::PrepareArgs,

    /// Suppress progress lines
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the derived CI test file (default command)
    Prepare,

    /// Show which tests would be selected, without writing anything
    List {
        /// Output format: text (names) or json (full report)
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let _telemetry = ci_prep::telemetry::init();
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Prepare) => {
            prepare_cmd::prepare(&cli.flags, &cli.run, &cli.prepare, cli.quiet)
        }
        Some(Commands::List { format }) => prepare_cmd::list(&cli.flags, &cli.run, format),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "ci-prep",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

