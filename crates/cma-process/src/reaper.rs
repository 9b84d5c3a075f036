//! Background reaper for children whose handle was released while running.
//!
//! A `Child` dropped before it exits stays a zombie until someone waits for
//! it. Released children are sent to a single reaper thread that polls them
//! with `try_wait` and forgets each one once it has been collected. The thread
//! is started on first use and lives as long as the host process.

use lazy_static::lazy_static;
use std::process::Child;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const REAP_INTERVAL: Duration = Duration::from_millis(100);

lazy_static! {
    /// `None` when the reaper thread could not be started.
    static ref REAPER: Option<Sender<Child>> = start();
}

fn start() -> Option<Sender<Child>> {
    let (tx, rx) = mpsc::channel();
    match thread::Builder::new()
        .name("cma-reaper".to_string())
        .spawn(move || run(rx))
    {
        Ok(_) => Some(tx),
        Err(e) => {
            warn!(error = %e, "Failed to start reaper thread");
            None
        }
    }
}

/// Hand a still-running child over to be waited for in the background.
pub(crate) fn adopt(child: Child) {
    let pid = child.id();
    match REAPER.as_ref().map(|tx| tx.send(child)) {
        Some(Ok(())) => debug!(pid, "Child handed to reaper"),
        _ => warn!(pid, "Reaper unavailable, child will not be reaped"),
    }
}

fn run(rx: Receiver<Child>) {
    let mut pending: Vec<Child> = Vec::new();
    loop {
        let next = if pending.is_empty() {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            rx.recv_timeout(REAP_INTERVAL)
        };
        match next {
            Ok(child) => pending.push(child),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
        pending.extend(rx.try_iter());

        pending.retain_mut(|child| match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "Reaped released child");
                false
            }
            Err(e) => {
                debug!(pid = child.id(), error = %e, "Dropping unwaitable child");
                false
            }
        });
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command;
    use std::time::Instant;

    #[test]
    fn test_adopted_child_is_reaped() {
        let child = Command::new("sleep").arg("0.2").spawn().unwrap();
        let proc_dir = format!("/proc/{}", child.id());
        adopt(child);

        // a zombie keeps its /proc entry until it is waited for
        let deadline = Instant::now() + Duration::from_secs(10);
        while Path::new(&proc_dir).exists() {
            assert!(Instant::now() < deadline, "{} still present", proc_dir);
            thread::sleep(Duration::from_millis(50));
        }
    }
}
