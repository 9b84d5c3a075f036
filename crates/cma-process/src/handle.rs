//! Owned process and job handles.
//!
//! Every OS handle the launcher hands out is wrapped in one of these types.
//! They are move-only: the holder is the only owner, and the handle is
//! released exactly once when the value is dropped, on every exit path.
//!
//! | Handle          | Released by                                   |
//! |-----------------|-----------------------------------------------|
//! | primary thread  | the launcher, right after process creation    |
//! | [`ProcessHandle`] | the caller (drop), or the launcher in wait and detach modes |
//! | [`JobHandle`]   | the caller (drop)                             |

use crate::sys;
use cma_common::{ExitStatus, ProcessError, ProcessResult};
use std::fmt;
use std::mem::ManuallyDrop;
use std::time::Duration;
use tracing::trace;

/// A running (or finished but not yet released) child process.
///
/// Dropping the handle gives up control over the process; it does not stop
/// it. On Unix, a child that is still running when its handle is dropped is
/// waited for by a background reaper so it does not linger as a zombie.
pub struct ProcessHandle {
    pid: u32,
    // taken exactly once, in `Drop`
    inner: ManuallyDrop<sys::Process>,
}

impl ProcessHandle {
    pub(crate) fn new(pid: u32, inner: sys::Process) -> Self {
        Self {
            pid,
            inner: ManuallyDrop::new(inner),
        }
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the process exits. There is no timeout; use
    /// [`wait_timeout`](Self::wait_timeout) for a bounded wait.
    pub fn wait(&mut self) -> ProcessResult<ExitStatus> {
        sys::wait(&mut self.inner, self.pid, None)?.ok_or_else(|| {
            ProcessError::wait_failed(self.pid, "wait returned before the process exited", None)
        })
    }

    /// Wait at most `timeout`. `Ok(None)` means the process is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> ProcessResult<Option<ExitStatus>> {
        sys::wait(&mut self.inner, self.pid, Some(timeout))
    }

    /// Non-blocking exit check.
    pub fn try_wait(&mut self) -> ProcessResult<Option<ExitStatus>> {
        self.wait_timeout(Duration::ZERO)
    }

    /// Forcefully terminate this process (not its children).
    pub fn kill(&mut self) -> ProcessResult<()> {
        sys::kill(&mut self.inner, self.pid)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        trace!(pid = self.pid, "Releasing process handle");
        // SAFETY: `inner` is not touched again after this.
        let inner = unsafe { ManuallyDrop::take(&mut self.inner) };
        sys::release(inner, self.pid);
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle").field("pid", &self.pid).finish()
    }
}

/// Handle to the job that groups a launched process and its descendants.
///
/// The grouping lives as long as this handle, independent of any
/// [`ProcessHandle`]. With [`JobOptions::kill_on_close`](crate::JobOptions)
/// dropping the handle also kills every process still in the job.
pub struct JobHandle {
    inner: sys::Job,
}

impl JobHandle {
    pub(crate) fn new(inner: sys::Job) -> Self {
        Self { inner }
    }

    /// Terminate every process in the job.
    ///
    /// On Windows each process exits with `exit_code`. On Unix the group is
    /// sent `SIGKILL` and `exit_code` is not observable. Terminating a job that
    /// has no live members succeeds.
    ///
    /// On Unix the job is identified only by its group id. Once every member
    /// has exited and the leader has been reaped, the id is free for reuse,
    /// and a later `terminate` (or kill-on-close) could signal an unrelated
    /// group that happens to get the same id. Terminate jobs while they still
    /// have members, or drop the handle once the tree is known to be gone.
    pub fn terminate(&self, exit_code: u32) -> ProcessResult<()> {
        sys::terminate_job(&self.inner, exit_code)
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        trace!(job = ?self.inner, "Releasing job handle");
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").field("inner", &self.inner).finish()
    }
}
