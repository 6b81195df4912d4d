use clap::Args;
use serde::Serialize;

use sfdx_ci::config::LoadOptions;
use sfdx_ci::engine::{Engine, RunReport, StatusLogListener};
use sfdx_ci::git::GitCli;
use sfdx_ci::sfdx::SfdxCli;

use super::{display, expand_path, merge_input_sources, working_dir, CmdResult, GlobalArgs};

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline file (.yml, .yaml or .json)
    pub config: String,

    /// Global input value as id=value (repeatable)
    #[arg(long = "input", value_name = "ID=VALUE")]
    pub inputs: Vec<String>,

    /// JSON object of global inputs: inline, @file, or - for stdin
    #[arg(long = "inputs", value_name = "JSON")]
    pub inputs_json: Option<String>,

    /// Skip steps whose type has no handler instead of rejecting the file
    #[arg(long)]
    pub allow_unknown_steps: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub config: String,
    pub sfdx_bin: String,
    #[serde(flatten)]
    pub report: RunReport,
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<RunOutput> {
    let config_path = expand_path(&args.config);
    let inputs = merge_input_sources(args.inputs_json.as_deref(), &args.inputs)?;
    let cwd = working_dir()?;

    let mut engine = Engine::new(&cwd);
    engine.load(
        &config_path,
        LoadOptions {
            allow_unknown_steps: args.allow_unknown_steps,
        },
    )?;
    engine.set_global_inputs(inputs)?;

    let sfdx = SfdxCli::new(SfdxCli::resolve_bin(global.sfdx_bin.clone()), &cwd);
    let git = GitCli::new(&cwd);
    let mut listener = StatusLogListener::default();

    let report = engine.run(&sfdx, &git, &mut listener)?;

    Ok((
        RunOutput {
            config: display(&config_path),
            sfdx_bin: sfdx.bin().to_string(),
            report,
        },
        0,
    ))
}
