//! Unix backend for the launcher.
//!
//! The command line is split with Windows argv rules (see [`crate::cmdline`])
//! and started through `std::process::Command`. A job is a process group: the
//! child becomes leader of a new group before `exec`, and tree-wide control
//! signals the whole group with `killpg`.
//!
//! std marks every descriptor close-on-exec, so only the three standard
//! streams ever reach the child regardless of `inherit_handles`.

use crate::cmdline;
use crate::config::{LaunchConfig, Redirect};
use crate::job::JobOptions;
use crate::reaper;
use cma_common::{ExitStatus, ProcessError, ProcessResult};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{getpgid, Pid};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

pub(crate) type Process = Child;

/// A process group standing in for a job object.
#[derive(Debug)]
pub(crate) struct Job {
    pgid: Pid,
    kill_on_close: bool,
}

impl Drop for Job {
    fn drop(&mut self) {
        if self.kill_on_close {
            if let Err(e) = killpg(self.pgid, Signal::SIGKILL) {
                if e != Errno::ESRCH {
                    warn!(pgid = self.pgid.as_raw(), error = %e, "kill-on-close failed");
                }
            }
        }
    }
}

pub(crate) fn spawn(config: &LaunchConfig) -> ProcessResult<(u32, Process)> {
    let own_group = config.creation().new_process_group || config.creation().detached_console;
    let child = start(config, own_group)?;
    Ok((child.id(), child))
}

/// Start a process as leader of a new process group and return that group.
pub(crate) fn launch_job(
    config: &LaunchConfig,
    options: &JobOptions,
) -> ProcessResult<(u32, Process, Job)> {
    let child = start(config, true)?;
    let pid = child.id();
    let leader = Pid::from_raw(pid as i32);

    // The group is created by the child itself; confirm it took effect.
    let failure = match getpgid(Some(leader)) {
        Ok(group) if group == leader => None,
        Ok(group) => Some((format!("process is in group {}", group), None)),
        Err(e) => Some((format!("getpgid failed: {}", e), Some(e as i32))),
    };
    if let Some((reason, code)) = failure {
        return Err(abort_unassigned(
            child,
            ProcessError::assign_failed(pid, reason, code),
        ));
    }
    debug!(pid, "Process leads its own group");

    let job = Job {
        pgid: leader,
        kill_on_close: options.kill_on_close,
    };
    Ok((pid, child, job))
}

/// Wait for `child`; `None` timeout waits forever.
pub(crate) fn wait(
    child: &mut Process,
    pid: u32,
    timeout: Option<Duration>,
) -> ProcessResult<Option<ExitStatus>> {
    let status = match timeout {
        None => child.wait().map(Some),
        Some(d) if d.is_zero() => child.try_wait(),
        Some(d) => child.wait_timeout(d),
    };
    status
        .map(|s| s.map(convert))
        .map_err(|e| ProcessError::wait_failed(pid, e.to_string(), e.raw_os_error()))
}

pub(crate) fn kill(child: &mut Process, pid: u32) -> ProcessResult<()> {
    child.kill().map_err(|e| {
        ProcessError::terminate_failed(format!("process {}", pid), e.to_string(), e.raw_os_error())
    })
}

/// Kill and reap a child that did not end up in its own group.
///
/// No `Job` exists yet at this point, so nothing else needs releasing.
fn abort_unassigned(mut child: Child, error: ProcessError) -> ProcessError {
    let pid = child.id();
    warn!(pid, error = %error, "Terminating process outside its job");
    if let Err(e) = child.kill() {
        warn!(pid, error = %e, "Failed to kill process");
    }
    if let Err(e) = child.wait() {
        warn!(pid, error = %e, "Failed to reap process");
    }
    error
}

/// Reap the child now if it already exited, otherwise in the background.
pub(crate) fn release(mut child: Process, pid: u32) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        Ok(None) => reaper::adopt(child),
        Err(e) => debug!(pid, error = %e, "Released child is not waitable"),
    }
}

pub(crate) fn terminate_job(job: &Job, _exit_code: u32) -> ProcessResult<()> {
    match killpg(job.pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ProcessError::terminate_failed(
            format!("process group {}", job.pgid),
            e.to_string(),
            Some(e as i32),
        )),
    }
}

fn start(config: &LaunchConfig, own_group: bool) -> ProcessResult<Child> {
    let command_line = config.command_line();
    let argv = cmdline::split(command_line);
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ProcessError::configuration("Command line has no program"))?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(stdio(config.stdin(), command_line)?)
        .stdout(stdio(config.stdout(), command_line)?)
        .stderr(stdio(config.stderr(), command_line)?);
    if let Some(dir) = config.working_directory() {
        command.current_dir(dir);
    }
    if own_group {
        command.process_group(0);
    }

    let creation = config.creation();
    if creation.new_console || creation.no_window || config.startup().hide_window {
        debug!("Console and window options have no effect on this platform");
    }

    debug!(program = %program, args = ?args, own_group, "Spawning process");
    command.spawn().map_err(|e| {
        warn!(command = command_line, os_code = ?e.raw_os_error(), "spawn failed");
        ProcessError::spawn_failed(command_line, e.to_string(), e.raw_os_error())
    })
}

fn stdio(redirect: &Redirect, command: &str) -> ProcessResult<Stdio> {
    match redirect {
        Redirect::Inherit => Ok(Stdio::inherit()),
        Redirect::Null => Ok(Stdio::null()),
        Redirect::File(file) => file.try_clone().map(Stdio::from).map_err(|e| {
            ProcessError::spawn_failed(
                command,
                format!("Failed to duplicate stdio file: {}", e),
                e.raw_os_error(),
            )
        }),
    }
}

fn convert(status: std::process::ExitStatus) -> ExitStatus {
    match status.code() {
        Some(code) => ExitStatus::Code(code),
        None => ExitStatus::Signaled(status.signal().unwrap_or(0)),
    }
}
