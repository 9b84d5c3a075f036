//! Win32 backend for the launcher.
//!
//! Process creation goes through `CreateProcessW` with the command line passed
//! verbatim. Job-tracked launches create the job first, start the process
//! suspended, assign it, and only then let its primary thread run, so nothing
//! the child spawns can escape the job.
//!
//! Raw handles are converted to [`OwnedHandle`] as soon as the OS returns them,
//! which makes every early return below release what was acquired so far.

use crate::config::{LaunchConfig, Redirect};
use crate::job::JobOptions;
use cma_common::{ExitStatus, ProcessError, ProcessResult};
use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::time::Duration;
use tracing::{debug, warn};
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    DuplicateHandle, DUPLICATE_SAME_ACCESS, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Console::{
    GetStdHandle, STD_ERROR_HANDLE, STD_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JobObjectExtendedLimitInformation,
    SetInformationJobObject, TerminateJobObject, JOBOBJECT_EXTENDED_LIMIT_INFORMATION,
    JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
};
use windows::Win32::System::Threading::{
    CreateProcessW, GetCurrentProcess, GetExitCodeProcess, ResumeThread, TerminateProcess,
    WaitForSingleObject, CREATE_NEW_CONSOLE, CREATE_NEW_PROCESS_GROUP, CREATE_NO_WINDOW,
    CREATE_SUSPENDED, DETACHED_PROCESS, INFINITE, PROCESS_CREATION_FLAGS, PROCESS_INFORMATION,
    STARTF_USESHOWWINDOW, STARTF_USESTDHANDLES, STARTUPINFOW,
};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;

pub(crate) type Process = OwnedHandle;
pub(crate) type Job = OwnedHandle;

/// Exit code given to a process killed by the launcher itself.
const KILLED_EXIT_CODE: u32 = 1;

/// How long teardown waits for a terminated orphan to exit.
const ABORT_WAIT_MS: u32 = 5_000;

struct Created {
    pid: u32,
    process: OwnedHandle,
    thread: OwnedHandle,
}

/// Start a process; the primary thread handle is released before returning.
pub(crate) fn spawn(config: &LaunchConfig) -> ProcessResult<(u32, Process)> {
    let Created {
        pid,
        process,
        thread,
    } = create(config, PROCESS_CREATION_FLAGS(0))?;
    drop(thread);
    Ok((pid, process))
}

/// Create a job, then start a process inside it.
pub(crate) fn launch_job(
    config: &LaunchConfig,
    options: &JobOptions,
) -> ProcessResult<(u32, Process, Job)> {
    let job = create_job(options)?;
    debug!(job = ?job, "Created job object");

    // On failure `job` is dropped here, closing it before the error is reported.
    let Created {
        pid,
        process,
        thread,
    } = create(config, CREATE_SUSPENDED)?;

    if let Err(e) = unsafe { AssignProcessToJobObject(raw(&job), raw(&process)) } {
        let error = ProcessError::assign_failed(pid, e.to_string(), os_code(&e));
        return Err(abort_unassigned(pid, process, job, error));
    }
    debug!(pid, "Assigned process to job");

    if unsafe { ResumeThread(raw(&thread)) } == u32::MAX {
        let e = windows::core::Error::from_win32();
        let error = ProcessError::spawn_failed(
            config.command_line(),
            format!("ResumeThread failed: {}", e),
            os_code(&e),
        );
        return Err(abort_unassigned(pid, process, job, error));
    }
    drop(thread);

    Ok((pid, process, job))
}

/// Wait for `process`; `None` timeout waits forever.
pub(crate) fn wait(
    process: &mut Process,
    pid: u32,
    timeout: Option<Duration>,
) -> ProcessResult<Option<ExitStatus>> {
    let millis = match timeout {
        None => INFINITE,
        Some(d) => u32::try_from(d.as_millis())
            .unwrap_or(INFINITE - 1)
            .min(INFINITE - 1),
    };

    let event = unsafe { WaitForSingleObject(raw(process), millis) };
    if event == WAIT_OBJECT_0 {
        exit_status(process, pid).map(Some)
    } else if event == WAIT_TIMEOUT {
        Ok(None)
    } else {
        let e = windows::core::Error::from_win32();
        Err(ProcessError::wait_failed(pid, e.to_string(), os_code(&e)))
    }
}

pub(crate) fn kill(process: &mut Process, pid: u32) -> ProcessResult<()> {
    unsafe { TerminateProcess(raw(process), KILLED_EXIT_CODE) }.map_err(|e| {
        ProcessError::terminate_failed(format!("process {}", pid), e.to_string(), os_code(&e))
    })
}

/// Closing the handle is all there is to it.
pub(crate) fn release(process: Process, _pid: u32) {
    drop(process);
}

pub(crate) fn terminate_job(job: &Job, exit_code: u32) -> ProcessResult<()> {
    unsafe { TerminateJobObject(raw(job), exit_code) }.map_err(|e| {
        ProcessError::terminate_failed("job object", e.to_string(), os_code(&e))
    })
}

fn create(config: &LaunchConfig, extra: PROCESS_CREATION_FLAGS) -> ProcessResult<Created> {
    // CreateProcessW may write into the command line buffer.
    let mut command_line = wide(OsStr::new(config.command_line()));
    let work_dir = config.working_directory().map(|d| wide(d.as_os_str()));
    let std_handles = StdHandles::prepare(config)?;

    let mut startup = STARTUPINFOW {
        cb: std::mem::size_of::<STARTUPINFOW>() as u32,
        ..Default::default()
    };
    if config.startup().hide_window {
        startup.dwFlags |= STARTF_USESHOWWINDOW;
        startup.wShowWindow = SW_HIDE.0 as u16;
    }
    if let Some(handles) = &std_handles {
        startup.dwFlags |= STARTF_USESTDHANDLES;
        startup.hStdInput = handles.input.as_ref().map(raw).unwrap_or_default();
        startup.hStdOutput = handles.output.as_ref().map(raw).unwrap_or_default();
        startup.hStdError = handles.error.as_ref().map(raw).unwrap_or_default();
    }

    let flags = creation_flags(config) | extra;
    let current_dir = work_dir
        .as_ref()
        .map(|d| PCWSTR(d.as_ptr()))
        .unwrap_or(PCWSTR::null());
    let mut info = PROCESS_INFORMATION::default();

    debug!(
        command = config.command_line(),
        flags = flags.0,
        inherit_handles = config.inherit_handles(),
        "CreateProcessW"
    );
    let created = unsafe {
        CreateProcessW(
            PCWSTR::null(),
            Some(PWSTR(command_line.as_mut_ptr())),
            None,
            None,
            config.inherit_handles(),
            flags,
            None,
            current_dir,
            &startup,
            &mut info,
        )
    };
    // The child holds its own copies now.
    drop(std_handles);

    if let Err(e) = created {
        let code = os_code(&e);
        warn!(command = config.command_line(), os_code = ?code, "CreateProcessW failed");
        return Err(ProcessError::spawn_failed(
            config.command_line(),
            e.to_string(),
            code,
        ));
    }

    Ok(Created {
        pid: info.dwProcessId,
        process: unsafe { own(info.hProcess) },
        thread: unsafe { own(info.hThread) },
    })
}

fn creation_flags(config: &LaunchConfig) -> PROCESS_CREATION_FLAGS {
    let options = config.creation();
    let mut flags = PROCESS_CREATION_FLAGS(0);
    if options.new_console {
        flags |= CREATE_NEW_CONSOLE;
    }
    if options.no_window {
        flags |= CREATE_NO_WINDOW;
    }
    if options.detached_console {
        flags |= DETACHED_PROCESS;
    }
    if options.new_process_group {
        flags |= CREATE_NEW_PROCESS_GROUP;
    }
    flags
}

fn create_job(options: &JobOptions) -> ProcessResult<Job> {
    let job = unsafe { CreateJobObjectW(None, PCWSTR::null()) }.map_err(|e| {
        let code = os_code(&e);
        warn!(os_code = ?code, "CreateJobObjectW failed");
        ProcessError::job_create_failed(e.to_string(), code)
    })?;
    let job = unsafe { own(job) };

    if options.kill_on_close {
        let mut limits = JOBOBJECT_EXTENDED_LIMIT_INFORMATION::default();
        limits.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
        unsafe {
            SetInformationJobObject(
                raw(&job),
                JobObjectExtendedLimitInformation,
                (&limits as *const JOBOBJECT_EXTENDED_LIMIT_INFORMATION).cast(),
                std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
        }
        .map_err(|e| {
            ProcessError::job_create_failed(
                format!("Failed to configure job object: {}", e),
                os_code(&e),
            )
        })?;
    }

    Ok(job)
}

fn exit_status(process: &Process, pid: u32) -> ProcessResult<ExitStatus> {
    let mut code = 0u32;
    unsafe { GetExitCodeProcess(raw(process), &mut code) }
        .map_err(|e| ProcessError::wait_failed(pid, e.to_string(), os_code(&e)))?;
    Ok(ExitStatus::Code(code as i32))
}

/// Terminate a process that is not (or not usably) in its job, wait for it to
/// exit, and close both the process and the job handle.
fn abort_unassigned(pid: u32, process: Process, job: Job, error: ProcessError) -> ProcessError {
    warn!(pid, error = %error, "Terminating process outside its job");
    if let Err(e) = unsafe { TerminateProcess(raw(&process), KILLED_EXIT_CODE) } {
        warn!(pid, error = %e, "TerminateProcess on orphaned process failed");
    }
    if unsafe { WaitForSingleObject(raw(&process), ABORT_WAIT_MS) } != WAIT_OBJECT_0 {
        warn!(pid, "Orphaned process did not exit in time");
    }
    drop(process);
    drop(job);
    error
}

/// Inheritable duplicates of the child's standard handles, closed on drop.
struct StdHandles {
    input: Option<OwnedHandle>,
    output: Option<OwnedHandle>,
    error: Option<OwnedHandle>,
}

impl StdHandles {
    fn prepare(config: &LaunchConfig) -> ProcessResult<Option<Self>> {
        if !config.redirects_stdio() {
            return Ok(None);
        }
        let command = config.command_line();
        Ok(Some(Self {
            input: inheritable(config.stdin(), STD_INPUT_HANDLE, command)?,
            output: inheritable(config.stdout(), STD_OUTPUT_HANDLE, command)?,
            error: inheritable(config.stderr(), STD_ERROR_HANDLE, command)?,
        }))
    }
}

fn inheritable(
    redirect: &Redirect,
    std_handle: STD_HANDLE,
    command: &str,
) -> ProcessResult<Option<OwnedHandle>> {
    let source = match redirect {
        Redirect::Inherit => match unsafe { GetStdHandle(std_handle) } {
            Ok(h) if !h.is_invalid() && !h.0.is_null() => h,
            // No console attached: the child gets no handle for this stream.
            _ => return Ok(None),
        },
        Redirect::Null => {
            let nul = OpenOptions::new()
                .read(true)
                .write(true)
                .open("NUL")
                .map_err(|e| {
                    ProcessError::spawn_failed(
                        command,
                        format!("Failed to open NUL: {}", e),
                        e.raw_os_error(),
                    )
                })?;
            return duplicate_inheritable(HANDLE(nul.as_raw_handle()), command).map(Some);
        }
        Redirect::File(file) => HANDLE(file.as_raw_handle()),
    };
    duplicate_inheritable(source, command).map(Some)
}

fn duplicate_inheritable(source: HANDLE, command: &str) -> ProcessResult<OwnedHandle> {
    let mut target = HANDLE::default();
    unsafe {
        DuplicateHandle(
            GetCurrentProcess(),
            source,
            GetCurrentProcess(),
            &mut target,
            0,
            true,
            DUPLICATE_SAME_ACCESS,
        )
    }
    .map_err(|e| {
        ProcessError::spawn_failed(
            command,
            format!("Failed to duplicate stdio handle: {}", e),
            os_code(&e),
        )
    })?;
    Ok(unsafe { own(target) })
}

fn raw(handle: &OwnedHandle) -> HANDLE {
    HANDLE(handle.as_raw_handle())
}

/// # Safety
/// `handle` must be a valid, open handle that nothing else will close.
unsafe fn own(handle: HANDLE) -> OwnedHandle {
    OwnedHandle::from_raw_handle(handle.0)
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Win32 error code carried by `e`, unwrapped from its HRESULT form.
fn os_code(e: &windows::core::Error) -> Option<i32> {
    let hr = e.code().0;
    if (hr as u32) & 0xFFFF_0000 == 0x8007_0000 {
        Some(hr & 0xFFFF)
    } else {
        Some(hr)
    }
}
