//! Job-tracked launcher.
//!
//! Starts a process bound to a fresh job so the whole tree it spawns can be
//! terminated later through the returned [`JobHandle`], even after the
//! process handle itself is gone.
//!
//! Order of operations: job, then process, then assignment, then thread
//! handle release. If assignment fails the process is terminated and both the
//! process and the job handles are released before
//! [`ProcessError::AssignFailed`] is returned; nothing is left running outside
//! a job and no job handle leaks.

use crate::config::LaunchConfig;
use crate::handle::{JobHandle, ProcessHandle};
use crate::launch::{complete, LaunchResult, Launched};
use crate::sys;
use cma_common::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Job object settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Kill every process in the job when the last job handle is released.
    #[serde(default)]
    pub kill_on_close: bool,
}

/// Start a process inside a new job.
///
/// `Completion::Wait` is rejected: job-tracked launches exist for later
/// control, not for blocking. With `Completion::Detach` only the job handle is
/// returned.
pub fn try_launch_as_job(config: &LaunchConfig, options: &JobOptions) -> ProcessResult<Launched> {
    if config.completion().waits() {
        return Err(ProcessError::configuration(
            "Job-tracked launches cannot wait for completion",
        ));
    }

    debug!(
        command = config.command_line(),
        kill_on_close = options.kill_on_close,
        "Launching process in job"
    );
    let (pid, process, job) = sys::launch_job(config, options)?;
    let process = ProcessHandle::new(pid, process);
    let job = JobHandle::new(job);
    info!(pid, command = config.command_line(), "Process started in job");

    complete(process, Some(job), config.completion())
}

/// Start a process inside a new job, never failing.
pub fn launch_as_job(config: &LaunchConfig, options: &JobOptions) -> LaunchResult {
    let result = try_launch_as_job(config, options);
    if let Err(e) = &result {
        warn!(command = config.command_line(), error = %e, "Job launch failed");
    }
    result.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cma_common::Completion;

    #[test]
    fn test_wait_mode_rejected() {
        let config = LaunchConfig::builder("anything")
            .completion(Completion::Wait)
            .build()
            .unwrap();
        let result = launch_as_job(&config, &JobOptions::default());
        assert!(!result.succeeded());
        assert_eq!(result.process_id, 0);
        assert!(matches!(
            result.error,
            Some(ProcessError::Configuration { .. })
        ));
    }

    #[test]
    fn test_job_options_yaml() {
        let options: JobOptions = serde_yaml::from_str("kill_on_close: true").unwrap();
        assert!(options.kill_on_close);
        let options: JobOptions = serde_yaml::from_str("{}").unwrap();
        assert!(!options.kill_on_close);
    }
}
