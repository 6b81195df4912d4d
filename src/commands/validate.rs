use clap::Args;
use serde::Serialize;

use sfdx_ci::config::{self, InputDeclaration, LoadOptions, VariableDeclaration};
use sfdx_ci::step::StepSummary;

use super::{display, expand_path, CmdResult};

#[derive(Args)]
pub struct ValidateArgs {
    /// Pipeline file (.yml, .yaml or .json)
    pub config: String,

    /// Accept steps whose type has no handler
    #[arg(long)]
    pub allow_unknown_steps: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOutput {
    pub config: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub inputs: Vec<InputDeclaration>,
    pub vars: Vec<VariableDeclaration>,
    pub steps: Vec<StepSummary>,
}

/// Load a pipeline file without running it.
pub fn run(args: ValidateArgs) -> CmdResult<ValidateOutput> {
    let path = expand_path(&args.config);
    let loaded = config::load(
        &path,
        LoadOptions {
            allow_unknown_steps: args.allow_unknown_steps,
        },
    )?;

    let steps = loaded.config.steps.iter().map(|step| step.summary()).collect();

    Ok((
        ValidateOutput {
            config: display(&loaded.path),
            version: loaded.config.version,
            inputs: loaded.config.inputs,
            vars: loaded.config.vars,
            steps,
        },
        0,
    ))
}
