// Shared helpers for launcher integration tests
#![allow(dead_code)]

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Command line running `script` through the platform shell.
///
/// Unix scripts must not contain double quotes.
pub fn shell(script: &str) -> String {
    #[cfg(unix)]
    {
        format!("sh -c \"{}\"", script)
    }

    #[cfg(windows)]
    {
        format!("cmd.exe /D /C {}", script)
    }
}

/// Script writing `text` to `path`.
pub fn echo_to(text: &str, path: &Path) -> String {
    #[cfg(unix)]
    {
        format!("echo {} > '{}'", text, path.display())
    }

    #[cfg(windows)]
    {
        format!("echo {}>\"{}\"", text, path.display())
    }
}

/// Script that sleeps `secs` seconds and then writes `text` to `path`.
pub fn sleep_then_write(secs: u64, text: &str, path: &Path) -> String {
    #[cfg(unix)]
    {
        format!("sleep {}; {}", secs, echo_to(text, path))
    }

    #[cfg(windows)]
    {
        format!(
            "ping -n {} 127.0.0.1 >NUL & {}",
            secs + 1,
            echo_to(text, path)
        )
    }
}

/// Command line of a process that just sleeps for `secs` seconds.
pub fn sleeper(secs: u64) -> String {
    #[cfg(unix)]
    {
        format!("sleep {}", secs)
    }

    #[cfg(windows)]
    {
        format!("ping -n {} 127.0.0.1", secs + 1)
    }
}

/// Command line of a process that exits on its own shortly after starting.
pub fn brief_sleeper() -> String {
    #[cfg(unix)]
    {
        "sleep 0.2".to_string()
    }

    #[cfg(windows)]
    {
        "ping -n 1 127.0.0.1".to_string()
    }
}

/// A program path that does not exist.
pub fn missing_program() -> String {
    #[cfg(unix)]
    {
        "/nonexistent/cma-missing-tool --flag".to_string()
    }

    #[cfg(windows)]
    {
        r"C:\nonexistent\cma-missing-tool.exe --flag".to_string()
    }
}

/// Poll `cond` every 50ms until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Whether `pid` is a live (non-zombie) process.
pub fn process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let stat = format!("/proc/{}/stat", pid);
        if Path::new("/proc/self/stat").exists() {
            return match std::fs::read_to_string(&stat) {
                // state follows the parenthesised command name
                Ok(content) => content
                    .rsplit_once(')')
                    .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                    .unwrap_or(false),
                Err(_) => false,
            };
        }
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        nix::sys::signal::kill(pid, None).is_ok()
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
        use windows::Win32::System::Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        unsafe {
            let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
                Ok(h) => h,
                Err(_) => return false,
            };
            let mut code = 0u32;
            let alive = GetExitCodeProcess(handle, &mut code).is_ok()
                && code == STILL_ACTIVE.0 as u32;
            let _ = CloseHandle(handle);
            alive
        }
    }
}

/// Number of OS handles (file descriptors on Unix) this process holds.
pub fn open_handle_count() -> Option<usize> {
    #[cfg(unix)]
    {
        let dir = if Path::new("/proc/self/fd").exists() {
            "/proc/self/fd"
        } else {
            "/dev/fd"
        };
        std::fs::read_dir(dir).ok().map(|entries| entries.count())
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Threading::{GetCurrentProcess, GetProcessHandleCount};

        let mut count = 0u32;
        unsafe { GetProcessHandleCount(GetCurrentProcess(), &mut count) }
            .ok()
            .map(|_| count as usize)
    }
}

/// Number of exited but unreaped children of this process (Linux only).
pub fn zombie_children() -> Option<usize> {
    let me = std::process::id().to_string();
    let entries = std::fs::read_dir("/proc").ok()?;
    let count = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
        .filter(|stat| {
            // "<pid> (<comm>) <state> <ppid> ..."
            let mut fields = match stat.rsplit_once(')') {
                Some((_, rest)) => rest.split_whitespace(),
                None => return false,
            };
            fields.next() == Some("Z") && fields.next() == Some(me.as_str())
        })
        .count();
    Some(count)
}

pub fn read_trimmed(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
