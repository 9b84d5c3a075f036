//! Launcher core.
//!
//! [`try_launch`] starts one process and then, depending on the configured
//! [`Completion`]:
//! - `Wait`: blocks until the process exits and releases its handle,
//! - `Track`: hands the [`ProcessHandle`] to the caller,
//! - `Detach`: releases the process handle as well.
//!
//! The primary thread handle never leaves the backend. [`launch`] and the
//! `run_*` helpers flatten errors into sentinel results (`false`, pid 0) for
//! callers that only need to know whether a helper is available; the
//! [`ProcessError`] with its OS code is kept in [`LaunchResult::error`].

use crate::config::LaunchConfig;
use crate::handle::{JobHandle, ProcessHandle};
use crate::sys;
use cma_common::{Completion, ExitStatus, ProcessError, ProcessResult};
use std::path::Path;
use tracing::{debug, info, warn};

/// What a successful launch produced.
#[derive(Debug)]
pub struct Launched {
    /// Always non-zero.
    pub process_id: u32,
    /// Present in `Track` mode.
    pub process: Option<ProcessHandle>,
    /// Present for job-tracked launches.
    pub job: Option<JobHandle>,
    /// Present in `Wait` mode.
    pub exit_status: Option<ExitStatus>,
}

/// Outcome of a launch in sentinel form.
///
/// `process_id == 0` means no process was started, or the one started was
/// already torn down. On failure no handle field is populated; the one case
/// with both an error and a non-zero pid is [`ProcessError::WaitFailed`], where
/// the process was created but could not be waited for and may still run.
#[derive(Debug)]
pub struct LaunchResult {
    pub process_id: u32,
    pub process: Option<ProcessHandle>,
    pub job: Option<JobHandle>,
    pub exit_status: Option<ExitStatus>,
    pub error: Option<ProcessError>,
}

impl LaunchResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn failed(error: ProcessError) -> Self {
        Self {
            process_id: 0,
            process: None,
            job: None,
            exit_status: None,
            error: Some(error),
        }
    }
}

impl From<ProcessResult<Launched>> for LaunchResult {
    fn from(result: ProcessResult<Launched>) -> Self {
        match result {
            Ok(launched) => Self {
                process_id: launched.process_id,
                process: launched.process,
                job: launched.job,
                exit_status: launched.exit_status,
                error: None,
            },
            Err(error) => {
                let mut result = Self::failed(error);
                if let Some(ProcessError::WaitFailed { pid, .. }) = &result.error {
                    result.process_id = *pid;
                }
                result
            }
        }
    }
}

/// Start a process as described by `config`.
pub fn try_launch(config: &LaunchConfig) -> ProcessResult<Launched> {
    debug!(
        command = config.command_line(),
        mode = %config.completion(),
        "Launching process"
    );
    let (pid, process) = sys::spawn(config)?;
    let process = ProcessHandle::new(pid, process);
    info!(pid, command = config.command_line(), "Process started");

    complete(process, None, config.completion())
}

/// Start a process, never failing: errors are reported through the result.
pub fn launch(config: &LaunchConfig) -> LaunchResult {
    let result = try_launch(config);
    if let Err(e) = &result {
        warn!(command = config.command_line(), error = %e, "Launch failed");
    }
    result.into()
}

/// Run `command` and block until it exits.
///
/// Returns `true` when the process was started and waited for; the exit code
/// does not matter.
pub fn run_and_wait(command: &str, working_dir: Option<&Path>) -> bool {
    let mut builder = LaunchConfig::builder(command).completion(Completion::Wait);
    if let Some(dir) = working_dir {
        builder = builder.working_directory(dir);
    }
    run_flattened(builder.build()).succeeded()
}

/// Start `command` and forget about it.
pub fn run_detached(command: &str) -> bool {
    let config = LaunchConfig::builder(command)
        .completion(Completion::Detach)
        .build();
    run_flattened(config).succeeded()
}

/// Start a process and return its pid, or 0 on failure.
///
/// No handle is kept: a `Track` configuration behaves like `Detach` here.
pub fn run_std_command(config: &LaunchConfig) -> u32 {
    launch(config).process_id
}

fn run_flattened(config: ProcessResult<LaunchConfig>) -> LaunchResult {
    match config {
        Ok(config) => launch(&config),
        Err(e) => {
            warn!(error = %e, "Invalid launch configuration");
            LaunchResult::failed(e)
        }
    }
}

/// Apply the completion mode to a freshly started process.
pub(crate) fn complete(
    mut process: ProcessHandle,
    job: Option<JobHandle>,
    completion: Completion,
) -> ProcessResult<Launched> {
    let process_id = process.pid();
    match completion {
        Completion::Wait => {
            let status = process.wait()?;
            debug!(pid = process_id, %status, "Process exited");
            Ok(Launched {
                process_id,
                process: None,
                job,
                exit_status: Some(status),
            })
        }
        Completion::Track => Ok(Launched {
            process_id,
            process: Some(process),
            job,
            exit_status: None,
        }),
        Completion::Detach => {
            drop(process);
            Ok(Launched {
                process_id,
                process: None,
                job,
                exit_status: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_has_no_handles() {
        let result = LaunchResult::failed(ProcessError::spawn_failed("x", "nope", Some(2)));
        assert!(!result.succeeded());
        assert_eq!(result.process_id, 0);
        assert!(result.process.is_none());
        assert!(result.job.is_none());
        assert_eq!(result.error.as_ref().and_then(|e| e.os_code()), Some(2));
    }

    #[test]
    fn test_wait_failure_keeps_pid() {
        let error = ProcessError::wait_failed(4242, "wait interrupted", Some(4));
        let result: LaunchResult = Err::<Launched, _>(error).into();
        assert!(!result.succeeded());
        assert_eq!(result.process_id, 4242);
        assert!(result.process.is_none());

        let error = ProcessError::assign_failed(4242, "denied", Some(5));
        let result: LaunchResult = Err::<Launched, _>(error).into();
        assert_eq!(result.process_id, 0);
    }

    #[test]
    fn test_invalid_config_is_not_launched() {
        assert!(!run_and_wait("", None));
        assert!(!run_detached("  "));
    }

    #[test]
    fn test_missing_working_dir_fails_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        assert!(!run_and_wait("anything", Some(&missing)));
    }
}
