//! Pipeline execution.
//!
//! - `pipeline` - the engine and its run state machine
//! - `dispatch` - parameter binding and invocation per step kind
//! - `events` - lifecycle events and listeners

mod dispatch;
mod events;
mod pipeline;

pub use dispatch::{execute, StepContext};
pub use events::{NoopListener, PipelineEvent, PipelineListener, RecordingListener, StatusLogListener};
pub use pipeline::{Engine, RunReport, RunState, RunSummary, StepLookup};
