//! # CMA Common
//!
//! Error types and small value types shared by the agent's process tools.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{Error, ProcessError, ProcessResult, Result, ResultExt};
pub use types::{Completion, ExitStatus};
