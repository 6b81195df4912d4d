//! Variable scope and reference resolution for step parameters.
//!
//! - `reference` - `$`-sigil expression parsing and path descent
//! - `store` - per-run inputs, variables, outputs and typed accessors
//! - `value` - scalar parameter values

pub mod reference;
mod store;
mod value;

pub use store::{
    Diagnostic, DiagnosticKind, InputData, Outputs, StepFailure, StepRecord, VariableStore,
};
pub use value::{format_number, scalar_to_string, ParamValue};
