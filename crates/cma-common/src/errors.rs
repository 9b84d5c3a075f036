//! Error types for the agent process tools.
//!
//! Two families live here:
//! - [`Error`] for configuration and I/O work around the launcher
//!   (reading launch specs, validating them).
//! - [`ProcessError`] for the launcher itself. Every variant that comes from
//!   an OS call keeps the raw OS error code so callers can log it; the
//!   launcher never interprets the code.
//!
//! ```rust
//! use cma_common::{Error, Result, ResultExt};
//!
//! fn inner() -> Result<()> {
//!     Err(Error::validation("command line is empty"))
//! }
//!
//! fn outer() -> Result<()> {
//!     inner().context("Failed to load launch spec")
//! }
//!
//! assert!(outer().unwrap_err().to_string().contains("Failed to load"));
//! ```

use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for configuration and I/O operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid input or configuration.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// I/O error (wraps std::io::Error).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed YAML document.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Adds context to an error.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }
}

// Convenience methods for Result types
pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(message))
    }
}

// ==============================================================================
// Process Launch Errors
// ==============================================================================

/// Launch and job-control failures.
///
/// `os_code` is the value of `GetLastError()` on Windows or `errno` on Unix
/// when the failing call reported one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Process spawn failed: {command} - {reason}")]
    SpawnFailed {
        command: String,
        reason: String,
        os_code: Option<i32>,
    },

    #[error("Job object creation failed: {reason}")]
    JobCreateFailed {
        reason: String,
        os_code: Option<i32>,
    },

    #[error("Process {pid} could not be assigned to its job: {reason}")]
    AssignFailed {
        pid: u32,
        reason: String,
        os_code: Option<i32>,
    },

    #[error("Wait on process {pid} failed: {reason}")]
    WaitFailed {
        pid: u32,
        reason: String,
        os_code: Option<i32>,
    },

    #[error("Termination of {target} failed: {reason}")]
    TerminateFailed {
        target: String,
        reason: String,
        os_code: Option<i32>,
    },

    #[error("Launch configuration error: {reason}")]
    Configuration { reason: String },
}

impl ProcessError {
    pub fn spawn_failed(
        command: impl Into<String>,
        reason: impl Into<String>,
        os_code: Option<i32>,
    ) -> Self {
        Self::SpawnFailed {
            command: command.into(),
            reason: reason.into(),
            os_code,
        }
    }

    pub fn job_create_failed(reason: impl Into<String>, os_code: Option<i32>) -> Self {
        Self::JobCreateFailed {
            reason: reason.into(),
            os_code,
        }
    }

    pub fn assign_failed(pid: u32, reason: impl Into<String>, os_code: Option<i32>) -> Self {
        Self::AssignFailed {
            pid,
            reason: reason.into(),
            os_code,
        }
    }

    pub fn wait_failed(pid: u32, reason: impl Into<String>, os_code: Option<i32>) -> Self {
        Self::WaitFailed {
            pid,
            reason: reason.into(),
            os_code,
        }
    }

    pub fn terminate_failed(
        target: impl Into<String>,
        reason: impl Into<String>,
        os_code: Option<i32>,
    ) -> Self {
        Self::TerminateFailed {
            target: target.into(),
            reason: reason.into(),
            os_code,
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Raw OS error code behind this failure, if the OS supplied one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::SpawnFailed { os_code, .. }
            | Self::JobCreateFailed { os_code, .. }
            | Self::AssignFailed { os_code, .. }
            | Self::WaitFailed { os_code, .. }
            | Self::TerminateFailed { os_code, .. } => *os_code,
            Self::Configuration { .. } => None,
        }
    }
}

impl From<ProcessError> for Error {
    fn from(e: ProcessError) -> Self {
        Error::validation(e.to_string())
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
