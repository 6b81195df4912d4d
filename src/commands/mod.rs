use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

use sfdx_ci::variables::InputData;

pub type CmdResult<T> = sfdx_ci::Result<(T, i32)>;

/// Options shared by every subcommand.
pub(crate) struct GlobalArgs {
    /// Explicit sfdx executable; falls back to the environment, then `sfdx`.
    pub sfdx_bin: Option<String>,
}

pub mod changeset;
pub mod run;
pub mod validate;

// ============================================================================
// Input Parsing (CLI layer)
// ============================================================================

/// Read JSON from string, file (@path), or stdin (-).
fn read_json_spec_to_string(spec: &str) -> sfdx_ci::Result<String> {
    use std::io::IsTerminal;

    if spec.trim() == "-" {
        let mut buf = String::new();
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(sfdx_ci::Error::validation_invalid_argument(
                "inputs",
                "Cannot read JSON from stdin when stdin is a TTY",
                None,
                None,
            ));
        }
        stdin
            .read_to_string(&mut buf)
            .map_err(|e| sfdx_ci::Error::internal_io(e.to_string(), Some("read stdin".to_string())))?;
        return Ok(buf);
    }

    if let Some(path) = spec.strip_prefix('@') {
        if path.trim().is_empty() {
            return Err(sfdx_ci::Error::validation_invalid_argument(
                "inputs",
                "Invalid JSON spec '@' (missing file path)",
                None,
                None,
            ));
        }
        return sfdx_ci::utils::io::read_file(&expand_path(path), "read inputs file");
    }

    Ok(spec.to_string())
}

/// Parse `id=value` pairs. Values are JSON literals when they parse as one,
/// otherwise plain strings.
fn parse_input_pairs(pairs: &[String]) -> sfdx_ci::Result<InputData> {
    let mut inputs = InputData::new();
    for pair in pairs {
        let (id, raw) = pair.split_once('=').ok_or_else(|| {
            sfdx_ci::Error::validation_invalid_argument(
                "input",
                format!("Expected id=value, got '{}'", pair),
                None,
                None,
            )
        })?;
        let id = id.trim();
        if id.is_empty() {
            return Err(sfdx_ci::Error::validation_invalid_argument(
                "input",
                format!("Missing input id in '{}'", pair),
                None,
                None,
            ));
        }
        inputs.insert(id.to_string(), parse_value(raw));
    }
    Ok(inputs)
}

/// Parse a string value into appropriate JSON type.
/// Order: JSON literal → string
fn parse_value(s: &str) -> Value {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => v,
        Ok(Value::String(text)) => Value::String(text),
        _ => Value::String(s.to_string()),
    }
}

/// Merge an inputs JSON object with `id=value` pairs. Pairs override the object.
pub fn merge_input_sources(spec: Option<&str>, pairs: &[String]) -> sfdx_ci::Result<InputData> {
    let mut base = match spec {
        Some(spec) => {
            let raw = read_json_spec_to_string(spec)?;
            serde_json::from_str::<InputData>(&raw).map_err(|e| {
                sfdx_ci::Error::validation_invalid_argument(
                    "inputs",
                    format!("Inputs must be a JSON object: {}", e),
                    None,
                    None,
                )
            })?
        }
        None => InputData::new(),
    };

    for (id, value) in parse_input_pairs(pairs)? {
        base.insert(id, value);
    }

    Ok(base)
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

fn working_dir() -> sfdx_ci::Result<PathBuf> {
    std::env::current_dir()
        .map_err(|e| sfdx_ci::Error::internal_io(e.to_string(), Some("resolve working directory".to_string())))
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(command: crate::Commands, global: &GlobalArgs) -> (sfdx_ci::Result<serde_json::Value>, i32) {
    match command {
        // Commands without global context
        crate::Commands::Validate(args) => dispatch!(args, validate),

        // Commands with global context
        crate::Commands::Run(args) => dispatch!(args, global, run),
        crate::Commands::Changeset(args) => dispatch!(args, global, changeset),
    }
}
