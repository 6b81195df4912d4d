use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::{self, LoadOptions, LoadedPipeline};
use crate::error::{Error, Result};
use crate::git::VersionControl;
use crate::sfdx::Platform;
use crate::step::{Step, StepKind};
use crate::variables::{Diagnostic, InputData, Outputs, VariableStore};

use super::dispatch::{self, StepContext};
use super::events::{PipelineEvent, PipelineListener};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Loaded,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub status: RunState,
    pub outputs: Outputs,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_steps: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_steps: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub summary: RunSummary,
}

/// A step with its 1-based position.
#[derive(Debug, Clone, Copy)]
pub struct StepLookup<'a> {
    pub step: &'a Step,
    pub number: usize,
    pub total: usize,
}

/// Runs the steps of a loaded pipeline file in order.
///
/// Each run gets a fresh variable store. A step failure is recorded; unless
/// the step sets `continueOnError` the run then stops and the error is
/// returned. The outputs recorded before the abort remain available through
/// `outputs()`.
pub struct Engine {
    working_dir: PathBuf,
    pipeline: Option<LoadedPipeline>,
    input_data: InputData,
    state: RunState,
    outputs: Outputs,
    diagnostics: Vec<Diagnostic>,
}

impl Engine {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            pipeline: None,
            input_data: InputData::new(),
            state: RunState::Idle,
            outputs: Outputs::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Load and validate a pipeline file. A failed load leaves the engine as it was.
    pub fn load(&mut self, path: &Path, options: LoadOptions) -> Result<()> {
        let pipeline = config::load(path, options)?;
        self.install(pipeline);
        Ok(())
    }

    /// Use an already loaded pipeline.
    pub fn install(&mut self, pipeline: LoadedPipeline) {
        self.pipeline = Some(pipeline);
        self.outputs.clear();
        self.diagnostics.clear();
        self.state = RunState::Loaded;
    }

    /// Supply input values for subsequent runs. Ids without a declaration are ignored.
    pub fn set_global_inputs(&mut self, inputs: InputData) -> Result<()> {
        let pipeline = self.pipeline.as_ref().ok_or_else(Error::engine_not_loaded)?;
        for id in inputs.keys() {
            if !pipeline.config.inputs.iter().any(|input| &input.id == id) {
                crate::log_status!("engine", "Input '{}' is not declared and will be ignored", id);
            }
        }
        self.input_data = inputs;
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn pipeline(&self) -> Option<&LoadedPipeline> {
        self.pipeline.as_ref()
    }

    /// Step results of the most recent run.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn get_step(&self, id: &str) -> Option<StepLookup<'_>> {
        let pipeline = self.pipeline.as_ref()?;
        let position = pipeline.index.position(id)?;
        let steps = &pipeline.config.steps;
        Some(StepLookup {
            step: &steps[position],
            number: position + 1,
            total: steps.len(),
        })
    }

    pub fn run(
        &mut self,
        platform: &dyn Platform,
        vcs: &dyn VersionControl,
        listener: &mut dyn PipelineListener,
    ) -> Result<RunReport> {
        let pipeline = self.pipeline.as_ref().ok_or_else(Error::engine_not_loaded)?;

        let mut store = VariableStore::new();
        for input in &pipeline.config.inputs {
            store.set_input(input, self.input_data.get(&input.id));
        }
        store.set_variables(&pipeline.config.vars);

        self.state = RunState::Running;
        crate::log_status!("engine", "Running {} step(s)", pipeline.config.steps.len());

        let ctx = StepContext {
            platform,
            vcs,
            working_dir: &self.working_dir,
        };

        let mut skipped_steps = Vec::new();
        let mut abort: Option<Error> = None;

        for step in &pipeline.config.steps {
            listener.on_event(&PipelineEvent::StepStart {
                step_id: step.id.clone(),
            });

            if let StepKind::Unsupported(step_type) = &step.kind {
                crate::log_status!("engine", "Skipping '{}': no handler for '{}'", step.id, step_type);
                skipped_steps.push(step.id.clone());
                listener.on_event(&PipelineEvent::StepFinish);
                continue;
            }

            match dispatch::execute(&step.kind, &mut store, &ctx) {
                Ok(payload) => store.set_output(&step.id, Ok(payload)),
                Err(err) => {
                    store.set_output(&step.id, Err(&err));
                    if !step.continue_on_error {
                        listener.on_event(&PipelineEvent::StepError {
                            message: err.message.clone(),
                        });
                        abort = Some(err);
                        break;
                    }
                    crate::log_status!("engine", "Step '{}' failed, continuing: {}", step.id, err.message);
                }
            }

            listener.on_event(&PipelineEvent::StepFinish);
        }

        let total_steps = pipeline.config.steps.len();
        self.diagnostics = store.diagnostics().to_vec();
        self.outputs = store.into_outputs();

        if let Some(err) = abort {
            self.state = RunState::Failed;
            return Err(err);
        }

        self.state = RunState::Completed;
        let failed_steps: Vec<String> = self
            .outputs
            .iter()
            .filter(|(_, record)| !record.is_success())
            .map(|(id, _)| id.clone())
            .collect();

        Ok(RunReport {
            status: self.state,
            summary: RunSummary {
                total_steps,
                succeeded: self.outputs.len() - failed_steps.len(),
                failed: failed_steps.len(),
                skipped: skipped_steps.len(),
            },
            outputs: self.outputs.clone(),
            failed_steps,
            skipped_steps,
            diagnostics: self.diagnostics.clone(),
        })
    }

    /// Outputs of the last run as a JSON object keyed by step id.
    pub fn outputs_value(&self) -> Value {
        serde_json::to_value(&self.outputs).unwrap_or(Value::Null)
    }
}
