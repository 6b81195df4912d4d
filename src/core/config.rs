//! Pipeline file loading.
//!
//! A pipeline file is YAML (`.yml`/`.yaml`) or JSON (`.json`) with optional
//! `inputs` and `vars` declarations and a required `steps` list. Loading
//! checks, in order: the file exists, the extension is supported, the content
//! parses, the content matches the schema, and step ids are unique.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::step::{Step, StepKind, STEP_TYPES};
use crate::utils::io;
use crate::variables::ParamValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDeclaration {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub id: String,
    pub value: ParamValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub version: Option<String>,
    pub inputs: Vec<InputDeclaration>,
    pub vars: Vec<VariableDeclaration>,
    pub steps: Vec<Step>,
}

/// Step id to position in the step list. Built once at load.
#[derive(Debug, Clone, Default)]
pub struct StepIdIndex(HashMap<String, usize>);

impl StepIdIndex {
    pub fn build(steps: &[Step]) -> Result<Self> {
        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if let Some(&first) = index.get(&step.id) {
                return Err(Error::config_duplicate_step_id(&step.id, first, position));
            }
            index.insert(step.id.clone(), position);
        }
        Ok(Self(index))
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LoadedPipeline {
    pub path: PathBuf,
    pub config: PipelineConfig,
    pub index: StepIdIndex,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Keep steps of unknown type as `StepKind::Unsupported` instead of
    /// rejecting the file. The engine skips such steps.
    pub allow_unknown_steps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "yml" | "yaml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    inputs: Vec<InputDeclaration>,
    #[serde(default)]
    vars: Vec<VariableDeclaration>,
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    id: String,
    #[serde(rename = "type")]
    step_type: String,
    #[serde(default)]
    continue_on_error: bool,
    #[serde(flatten)]
    params: Map<String, Value>,
}

pub fn load(path: &Path, options: LoadOptions) -> Result<LoadedPipeline> {
    let label = path.display().to_string();
    if !path.is_file() {
        return Err(Error::config_file_not_found(label));
    }

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| Error::config_invalid_file_type(&label, "YAML or JSON"))?;
    let raw = io::read_file(path, "read pipeline config")?;

    let config = parse(&raw, format, &label, options)?;
    let index = StepIdIndex::build(&config.steps)?;

    crate::log_status!("config", "Loaded {} step(s) from {}", config.steps.len(), label);

    Ok(LoadedPipeline {
        path: path.to_path_buf(),
        config,
        index,
    })
}

/// Parse and validate pipeline content. Does not check step id uniqueness.
pub fn parse(raw: &str, format: ConfigFormat, label: &str, options: LoadOptions) -> Result<PipelineConfig> {
    let document: Value = match format {
        ConfigFormat::Yaml => serde_yml::from_str(raw)
            .map_err(|e| Error::config_invalid_content(label, format.label(), Some(e.to_string())))?,
        ConfigFormat::Json => serde_json::from_str(raw)
            .map_err(|e| Error::config_invalid_content(label, format.label(), Some(e.to_string())))?,
    };

    let raw_config: RawConfig =
        serde_json::from_value(document).map_err(|e| Error::config_invalid_schema(label, e.to_string()))?;

    let mut problems = Vec::new();
    let mut steps = Vec::with_capacity(raw_config.steps.len());

    for (position, raw_step) in raw_config.steps.into_iter().enumerate() {
        if raw_step.id.trim().is_empty() {
            problems.push(format!("steps[{}]: id must not be empty", position));
            continue;
        }

        match StepKind::parse(&raw_step.step_type, raw_step.params) {
            Ok(Some(kind)) => steps.push(Step {
                id: raw_step.id,
                continue_on_error: raw_step.continue_on_error,
                kind,
            }),
            Ok(None) if options.allow_unknown_steps => {
                crate::log_status!(
                    "config",
                    "Step '{}' has unsupported type '{}' and will be skipped",
                    raw_step.id,
                    raw_step.step_type
                );
                steps.push(Step {
                    id: raw_step.id,
                    continue_on_error: raw_step.continue_on_error,
                    kind: StepKind::Unsupported(raw_step.step_type),
                });
            }
            Ok(None) => problems.push(format!(
                "steps[{}] ({}): unknown step type '{}'",
                position, raw_step.id, raw_step.step_type
            )),
            Err(problem) => problems.push(format!(
                "steps[{}] ({}): {}",
                position, raw_step.id, problem
            )),
        }
    }

    if !problems.is_empty() {
        let mut err = Error::config_invalid_schema(label, problems.join("; "));
        if problems.iter().any(|p| p.contains("unknown step type")) {
            err = err.with_hint(format!("Supported step types: {}", STEP_TYPES.join(", ")));
        }
        return Err(err);
    }

    Ok(PipelineConfig {
        version: raw_config.version,
        inputs: raw_config.inputs,
        vars: raw_config.vars,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    const PIPELINE: &str = r#"
version: "1.0.0"
inputs:
  - id: orgAlias
    default: ci-scratch
vars:
  - id: devHub
    value: $env.DEV_HUB
steps:
  - id: display
    type: sfdx.force.org.display
    targetUserName: ${{input.orgAlias}}
  - id: push
    type: sfdx.force.source.push
    targetUserName: $input.orgAlias
    forceOverwrite: true
    continueOnError: true
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_yaml_pipeline_and_builds_index() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pipeline.yml", PIPELINE);

        let loaded = load(&path, LoadOptions::default()).unwrap();
        assert_eq!(loaded.config.version.as_deref(), Some("1.0.0"));
        assert_eq!(loaded.config.inputs[0].default, Some(ParamValue::from("ci-scratch")));
        assert_eq!(loaded.config.vars[0].id, "devHub");
        assert_eq!(loaded.config.steps.len(), 2);
        assert!(loaded.config.steps[1].continue_on_error);
        assert_eq!(loaded.index.position("push"), Some(1));
        assert_eq!(loaded.index.position("missing"), None);
    }

    #[test]
    fn loads_json_pipeline() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "pipeline.JSON",
            r#"{"steps":[{"id":"list","type":"sfdx.auth.list"}]}"#,
        );
        let loaded = load(&path, LoadOptions::default()).unwrap();
        assert!(matches!(loaded.config.steps[0].kind, StepKind::AuthList));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load(Path::new("/nonexistent/pipeline.yml"), LoadOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigFileNotFound);
    }

    #[test]
    fn unsupported_extension_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pipeline.toml", "steps = []");
        let err = load(&path, LoadOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidFileType);
    }

    #[test]
    fn malformed_content_is_reported_with_format() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pipeline.json", "{ steps: ");
        let err = load(&path, LoadOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidContent);
        assert!(err.message.contains("valid JSON data"));
    }

    #[test]
    fn missing_steps_is_a_schema_error() {
        let err = parse("inputs: []", ConfigFormat::Yaml, "p.yml", LoadOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidSchema);
    }

    #[test]
    fn step_problems_are_collected() {
        let raw = r#"
steps:
  - id: a
    type: sfdx.force.org.display
  - id: b
    type: sfdx.force.source.pull
    targetUserName: ci
"#;
        let err = parse(raw, ConfigFormat::Yaml, "p.yml", LoadOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidSchema);
        assert!(err.message.contains("steps[0] (a)"));
        assert!(err.message.contains("unknown step type 'sfdx.force.source.pull'"));
        assert_eq!(err.hints.len(), 1);
    }

    #[test]
    fn unknown_types_load_as_unsupported_when_allowed() {
        let raw = "steps:\n  - id: pull\n    type: sfdx.force.source.pull\n";
        let config = parse(
            raw,
            ConfigFormat::Yaml,
            "p.yml",
            LoadOptions {
                allow_unknown_steps: true,
            },
        )
        .unwrap();
        assert!(matches!(&config.steps[0].kind, StepKind::Unsupported(t) if t == "sfdx.force.source.pull"));
    }

    #[test]
    fn duplicate_step_ids_identify_both_positions() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "pipeline.yml",
            "steps:\n  - id: a\n    type: sfdx.auth.list\n  - id: b\n    type: sfdx.auth.list\n  - id: a\n    type: sfdx.auth.list\n",
        );
        let err = load(&path, LoadOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigDuplicateStepId);
        assert_eq!(err.message, "Steps #0 and #2 has duplicated ID: 'a'");
    }
}
