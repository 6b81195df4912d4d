//! `Platform` backed by the `sfdx` command line tool.
//!
//! Commands run with `--json`; the tool answers with an envelope
//! `{status, result}` on success or `{status, name, message, stack}` on
//! failure. Older releases print the failure envelope on stderr.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use super::{ApexTestLevel, DeployRequest, Platform, ScratchOrgRequest};
use crate::error::{Error, PlatformErrorDetails, Result};
use crate::utils::command::{self, CapturedOutput};
use crate::utils::io;

pub const SFDX_BIN_ENV: &str = "SFDX_CI_SFDX_BIN";
const DEFAULT_BIN: &str = "sfdx";
const WAIT_MINUTES: &str = "60";

#[derive(Debug, Clone)]
pub struct SfdxCli {
    bin: String,
    working_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    result: Value,
    name: Option<String>,
    message: Option<String>,
    stack: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
    data: Option<Value>,
}

impl SfdxCli {
    pub fn new(bin: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Binary from the flag, else `SFDX_CI_SFDX_BIN`, else `sfdx`.
    pub fn resolve_bin(flag: Option<String>) -> String {
        flag.filter(|b| !b.trim().is_empty())
            .or_else(|| std::env::var(SFDX_BIN_ENV).ok().filter(|b| !b.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_BIN.to_string())
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    fn run(&self, subcommand: &str, args: Vec<String>) -> Result<Value> {
        self.run_with_env(subcommand, args, &[])
    }

    fn run_with_env(&self, subcommand: &str, mut args: Vec<String>, envs: &[(&str, &str)]) -> Result<Value> {
        let mut full = vec![subcommand.to_string()];
        full.append(&mut args);
        full.push("--json".to_string());

        crate::log_status!("sfdx", "{} {}", self.bin, subcommand);
        let output = command::capture_in(&self.working_dir, &self.bin, &full, envs, subcommand)?;
        parse_envelope(subcommand, &output)
    }
}

fn flag(name: &str, value: impl Into<String>) -> [String; 2] {
    [name.to_string(), value.into()]
}

/// Interpret the JSON envelope of a finished sfdx command.
pub(crate) fn parse_envelope(subcommand: &str, output: &CapturedOutput) -> Result<Value> {
    let envelope = serde_json::from_str::<Envelope>(output.stdout.trim())
        .or_else(|_| serde_json::from_str::<Envelope>(output.stderr.trim()));

    let envelope = match envelope {
        Ok(envelope) => envelope,
        Err(_) if !output.success => {
            return Err(Error::platform_command_failed(
                format!("{} failed: {}", subcommand, output.error_text()),
                PlatformErrorDetails {
                    name: "CommandFailed".to_string(),
                    command: Some(subcommand.to_string()),
                    ..Default::default()
                },
            ));
        }
        Err(e) => {
            return Err(Error::internal_json(
                e.to_string(),
                Some(format!("parse {} output", subcommand)),
            ))
        }
    };

    for warning in &envelope.warnings {
        crate::log_status!("sfdx", "warning: {}", warning);
    }

    if envelope.status == 0 && output.success {
        return Ok(envelope.result);
    }

    let message = envelope
        .message
        .unwrap_or_else(|| format!("{} exited with status {}", subcommand, output.exit_code));
    let logs = match envelope.result {
        Value::Null => None,
        result => Some(result),
    };
    Err(Error::platform_command_failed(
        message,
        PlatformErrorDetails {
            name: envelope.name.unwrap_or_else(|| "SfdxError".to_string()),
            command: Some(subcommand.to_string()),
            stack: envelope.stack,
            logs,
            summary: envelope.data,
        },
    ))
}

/// Swap the first line of CSV content for `header`.
fn replace_csv_header(content: &str, header: &str) -> String {
    match content.split_once('\n') {
        Some((_, rest)) => format!("{}\n{}", header, rest),
        None => format!("{}\n", header),
    }
}

impl Platform for SfdxCli {
    fn auth_access_token_store(&self, alias: &str, instance_url: &str, access_token: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--setalias", alias));
        args.extend(flag("--instanceurl", instance_url));
        args.push("--noprompt".to_string());
        self.run_with_env("auth:accesstoken:store", args, &[("SFDX_ACCESS_TOKEN", access_token)])
    }

    fn auth_sfdx_url_store(&self, alias: &str, sfdx_url_file: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--setalias", alias));
        args.extend(flag("--sfdxurlfile", sfdx_url_file));
        self.run("auth:sfdxurl:store", args)
    }

    fn auth_list(&self) -> Result<Value> {
        self.run("auth:list", Vec::new())
    }

    fn auth_logout(&self, target_user_name: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.push("--noprompt".to_string());
        self.run("auth:logout", args)
    }

    fn apex_execute(&self, target_user_name: &str, apex_code_file: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--apexcodefile", apex_code_file));
        self.run("force:apex:execute", args)
    }

    fn apex_test_run(&self, target_user_name: &str, output_dir: &str, test_level: ApexTestLevel) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--outputdir", output_dir));
        args.extend(flag("--testlevel", test_level.as_str()));
        args.extend(flag("--wait", WAIT_MINUTES));
        self.run("force:apex:test:run", args)
    }

    fn data_bulk_delete(&self, target_user_name: &str, csv_file: &str, s_object_type: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--csvfile", csv_file));
        args.extend(flag("--sobjecttype", s_object_type));
        args.extend(flag("--wait", WAIT_MINUTES));
        self.run("force:data:bulk:delete", args)
    }

    fn data_bulk_upsert(
        &self,
        target_user_name: &str,
        csv_file: &str,
        external_id: &str,
        s_object_type: &str,
    ) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--csvfile", csv_file));
        args.extend(flag("--externalid", external_id));
        args.extend(flag("--sobjecttype", s_object_type));
        args.extend(flag("--wait", WAIT_MINUTES));
        self.run("force:data:bulk:upsert", args)
    }

    fn data_tree_import(&self, target_user_name: &str, plan_file: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--plan", plan_file));
        self.run("force:data:tree:import", args)
    }

    fn data_soql_query_csv(
        &self,
        target_user_name: &str,
        csv_file: &Path,
        query: &str,
        replace_header: Option<&str>,
    ) -> Result<Value> {
        let subcommand = "force:data:soql:query";
        let args = vec![
            subcommand.to_string(),
            "--targetusername".to_string(),
            target_user_name.to_string(),
            "--query".to_string(),
            query.to_string(),
            "--resultformat".to_string(),
            "csv".to_string(),
        ];

        crate::log_status!("sfdx", "{} {} > {}", self.bin, subcommand, csv_file.display());
        let output = command::capture_in(&self.working_dir, &self.bin, &args, &[], subcommand)?;
        if !output.success {
            return Err(Error::platform_command_failed(
                format!("{} failed: {}", subcommand, output.error_text()),
                PlatformErrorDetails {
                    name: "SoqlQueryError".to_string(),
                    command: Some(subcommand.to_string()),
                    ..Default::default()
                },
            ));
        }

        let content = match replace_header {
            Some(header) => replace_csv_header(&output.stdout, header),
            None => output.stdout,
        };
        let target = if csv_file.is_absolute() {
            csv_file.to_path_buf()
        } else {
            self.working_dir.join(csv_file)
        };
        io::write_file(&target, &content, "write SOQL query CSV")?;
        Ok(Value::Null)
    }

    fn mdapi_deploy(&self, request: &DeployRequest) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", request.target_user_name.as_str()));
        args.extend(flag("--testlevel", request.test_level.as_str()));
        if request.check_only {
            args.push("--checkonly".to_string());
        }
        if let Some(dir) = &request.deploy_dir {
            args.extend(flag("--deploydir", dir.as_str()));
        }
        if let Some(zip) = &request.deploy_zip {
            args.extend(flag("--zipfile", zip.as_str()));
        }
        args.extend(flag("--wait", "0"));
        self.run("force:mdapi:deploy", args)
    }

    fn mdapi_deploy_report(&self, target_user_name: &str, job_id: &str, wait_minutes: u32) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--jobid", job_id));
        args.extend(flag("--wait", wait_minutes.to_string()));
        self.run("force:mdapi:deploy:report", args)
    }

    fn mdapi_retrieve(
        &self,
        target_user_name: &str,
        retrieve_target_dir: &str,
        manifest_file: Option<&str>,
        package_names: Option<&[String]>,
    ) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--retrievetargetdir", retrieve_target_dir));
        if let Some(manifest) = manifest_file {
            args.extend(flag("--unpackaged", manifest));
        }
        if let Some(names) = package_names.filter(|n| !n.is_empty()) {
            args.extend(flag("--packagenames", names.join(",")));
        }
        args.extend(flag("--wait", WAIT_MINUTES));
        self.run("force:mdapi:retrieve", args)
    }

    fn org_create_scratch(&self, request: &ScratchOrgRequest) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--type", "scratch"));
        args.extend(flag("--setalias", request.alias.as_str()));
        args.extend(flag("--definitionfile", request.definition_file.as_str()));
        args.extend(flag("--targetdevhubusername", request.dev_hub_user_name.as_str()));
        args.extend(flag("--durationdays", crate::variables::format_number(request.duration_days)));
        if request.no_ancestors {
            args.push("--noancestors".to_string());
        }
        if let Some(email) = &request.admin_email {
            args.push(format!("adminEmail={}", email));
        }
        self.run("force:org:create", args)
    }

    fn org_delete(&self, target_user_name: &str, dev_hub_user_name: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--targetdevhubusername", dev_hub_user_name));
        args.push("--noprompt".to_string());
        self.run("force:org:delete", args)
    }

    fn org_display(&self, target_user_name: &str) -> Result<Value> {
        self.run("force:org:display", flag("--targetusername", target_user_name).to_vec())
    }

    fn package_install(&self, target_user_name: &str, package_id: &str) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        args.extend(flag("--package", package_id));
        args.extend(flag("--wait", WAIT_MINUTES));
        args.push("--noprompt".to_string());
        self.run("force:package:install", args)
    }

    fn source_push(&self, target_user_name: &str, force_overwrite: bool) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--targetusername", target_user_name));
        if force_overwrite {
            args.push("--forceoverwrite".to_string());
        }
        self.run("force:source:push", args)
    }

    fn source_convert(&self, output_dir: &Path, source_paths: &[String]) -> Result<Value> {
        let mut args = Vec::new();
        args.extend(flag("--outputdir", output_dir.to_string_lossy()));
        args.extend(flag("--sourcepath", source_paths.join(",")));
        self.run("force:source:convert", args)
    }
}
