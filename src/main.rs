use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{changeset, run, validate};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "sfdx-ci")]
#[command(version = VERSION)]
#[command(about = "Config-driven CI pipelines for Salesforce DX projects")]
struct Cli {
    /// sfdx executable to invoke (defaults to $SFDX_CI_SFDX_BIN, then `sfdx`)
    #[arg(long, global = true)]
    sfdx_bin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline file
    Run(run::RunArgs),
    /// Load and check a pipeline file without running it
    Validate(validate::ValidateArgs),
    /// Change-set diff and creation
    Changeset(changeset::ChangesetArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        sfdx_bin: cli.sfdx_bin,
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(exit_code_to_u8(1));
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
