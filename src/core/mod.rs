// Public modules
pub mod change_set;
pub mod config;
pub mod data_transfer;
pub mod engine;
pub mod error;
pub mod git;
pub mod sfdx;
pub mod step;
pub mod variables;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
