//! Value types shared by the launcher and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a finished process ended.
///
/// On Windows every process exits with a code (including ones killed through
/// `TerminateProcess`/`TerminateJobObject`, which get the code the killer
/// chose). On Unix a process may instead be ended by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitStatus {
    Code(i32),
    Signaled(i32),
}

impl ExitStatus {
    /// True when the process exited normally with code 0.
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Code(c) => Some(*c),
            ExitStatus::Signaled(_) => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(c) => write!(f, "exit code {}", c),
            ExitStatus::Signaled(s) => write!(f, "signal {}", s),
        }
    }
}

/// What the launcher does with the new process once it exists.
///
/// ```
/// use cma_common::Completion;
///
/// assert!(Completion::Wait.waits());
/// assert!(!Completion::Detach.waits());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Block until the process exits, then release every handle.
    Wait,
    /// Return immediately and hand the process handle to the caller.
    #[default]
    Track,
    /// Return immediately and release the process handle as well.
    Detach,
}

impl Completion {
    pub fn waits(&self) -> bool {
        matches!(self, Completion::Wait)
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Completion::Wait => "wait",
            Completion::Track => "track",
            Completion::Detach => "detach",
        };
        f.write_str(s)
    }
}
