use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{InputDeclaration, VariableDeclaration};
use crate::error::Error;

use super::reference::{self, Reference};
use super::value::{scalar_to_string, ParamValue};

/// Externally supplied input values, keyed by input id.
pub type InputData = IndexMap<String, Value>;

/// Failure record stored for a step that raised an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

impl From<&Error> for StepFailure {
    fn from(err: &Error) -> Self {
        match err.platform_details() {
            Some(details) => Self {
                name: details.name,
                message: err.message.clone(),
                stack: details.stack,
                logs: details.logs,
                summary: details.summary,
            },
            None => Self {
                name: err.code.as_str().to_string(),
                message: err.message.clone(),
                stack: None,
                logs: None,
                summary: err
                    .details
                    .as_object()
                    .is_some_and(|d| !d.is_empty())
                    .then(|| err.details.clone()),
            },
        }
    }
}

/// One step's result. Serializes as `{success: true, outputs}` or
/// `{success: false, error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum StepRecord {
    Success { outputs: Option<Value> },
    Failure { error: StepFailure },
}

impl StepRecord {
    pub fn is_success(&self) -> bool {
        matches!(self, StepRecord::Success { .. })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for StepRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StepRecord::Success { outputs } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("success", &true)?;
                if let Some(outputs) = outputs {
                    map.serialize_entry("outputs", outputs)?;
                }
                map.end()
            }
            StepRecord::Failure { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Execution-ordered step results of one run.
pub type Outputs = IndexMap<String, StepRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Reference used a namespace other than env/input/var/step.
    UnknownNamespace,
    /// Reference resolved to null; the string accessor returned "".
    Unresolved,
    /// Value was not numeric; the number accessor returned 0.
    NotANumber,
    /// Value was not `true`/`false`; the boolean accessor returned false.
    NotABoolean,
}

/// Record of a typed accessor falling back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub expression: String,
    pub kind: DiagnosticKind,
}

/// Per-run variable scope: inputs, declared variables and step outputs.
#[derive(Debug, Default)]
pub struct VariableStore {
    inputs: IndexMap<String, Option<String>>,
    variables: IndexMap<String, Option<String>>,
    outputs: Outputs,
    diagnostics: Vec<Diagnostic>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an input, falling back to the declaration default when nothing
    /// was supplied. A supplied `null` stays null.
    pub fn set_input(&mut self, input: &InputDeclaration, supplied: Option<&Value>) {
        let value = match supplied {
            Some(value) => self.json_scalar(value),
            None => input.default.as_ref().and_then(|d| self.param_scalar(d)),
        };
        self.inputs.insert(input.id.clone(), value);
    }

    /// Resolve declared variables in declaration order. A variable referring
    /// to one declared later sees null.
    pub fn set_variables(&mut self, vars: &[VariableDeclaration]) {
        for variable in vars {
            let value = self.param_scalar(&variable.value);
            self.variables.insert(variable.id.clone(), value);
        }
    }

    /// Record a step's result. The first record for an id wins.
    pub fn set_output(&mut self, id: &str, result: std::result::Result<Option<Value>, &Error>) {
        if self.outputs.contains_key(id) {
            crate::log_status!("vars", "Ignoring second result for step '{}'", id);
            return;
        }
        let record = match result {
            Ok(outputs) => StepRecord::Success { outputs },
            Err(err) => StepRecord::Failure {
                error: StepFailure::from(err),
            },
        };
        self.outputs.insert(id.to_string(), record);
    }

    pub fn inputs(&self) -> &IndexMap<String, Option<String>> {
        &self.inputs
    }

    pub fn variables(&self) -> &IndexMap<String, Option<String>> {
        &self.variables
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn into_outputs(self) -> Outputs {
        self.outputs
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Resolve a raw string: literals pass through, references are looked up.
    pub fn resolve(&mut self, raw: &str) -> Option<String> {
        match reference::parse(raw) {
            None => Some(raw.to_string()),
            Some(Reference::Unknown(_)) => {
                self.note(raw, DiagnosticKind::UnknownNamespace);
                None
            }
            Some(reference) => self.lookup(&reference),
        }
    }

    pub fn lookup(&self, reference: &Reference<'_>) -> Option<String> {
        match reference {
            Reference::Env(name) => std::env::var(name).ok(),
            Reference::Input(id) => self.inputs.get(*id).cloned().flatten(),
            Reference::Var(id) => self.variables.get(*id).cloned().flatten(),
            Reference::Step { id, path } => {
                if path.is_empty() {
                    return None;
                }
                let record = self.outputs.get(*id)?.to_value();
                reference::descend(&record, path).and_then(scalar_to_string)
            }
            Reference::Unknown(_) => None,
        }
    }

    pub fn string_value(&mut self, raw: &str) -> String {
        match self.resolve(raw) {
            Some(value) => value,
            None => {
                self.note(raw, DiagnosticKind::Unresolved);
                String::new()
            }
        }
    }

    pub fn number_value(&mut self, raw: &ParamValue) -> f64 {
        let text = match raw {
            ParamValue::Number(n) => return *n,
            ParamValue::Bool(b) => Some(b.to_string()),
            ParamValue::Text(s) => self.resolve(s),
        };

        match text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => match t.parse::<f64>() {
                Ok(n) if !n.is_nan() => n,
                _ => {
                    self.note(&raw.to_scalar_string(), DiagnosticKind::NotANumber);
                    0.0
                }
            },
            None => {
                self.note(&raw.to_scalar_string(), DiagnosticKind::NotANumber);
                0.0
            }
        }
    }

    pub fn boolean_value(&mut self, raw: &ParamValue) -> bool {
        let text = match raw {
            ParamValue::Bool(b) => return *b,
            ParamValue::Number(n) => Some(super::value::format_number(*n)),
            ParamValue::Text(s) => self.resolve(s),
        };

        match text.map(|t| t.to_lowercase()).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => {
                self.note(&raw.to_scalar_string(), DiagnosticKind::NotABoolean);
                false
            }
        }
    }

    pub fn optional_number(&mut self, raw: Option<&ParamValue>) -> Option<f64> {
        raw.map(|value| self.number_value(value))
    }

    fn param_scalar(&mut self, value: &ParamValue) -> Option<String> {
        match value {
            ParamValue::Text(s) => self.resolve(s),
            other => Some(other.to_scalar_string()),
        }
    }

    fn json_scalar(&mut self, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => self.resolve(s),
            Value::Bool(_) | Value::Number(_) => scalar_to_string(value),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn note(&mut self, expression: &str, kind: DiagnosticKind) {
        crate::log_status!("vars", "'{}' fell back to default ({:?})", expression, kind);
        self.diagnostics.push(Diagnostic {
            expression: expression.to_string(),
            kind,
        });
    }
}
