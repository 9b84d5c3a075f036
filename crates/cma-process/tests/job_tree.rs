//! Job-tracked launches: tree-wide termination through the job handle.

mod common;

use cma_common::{Completion, ProcessError};
use cma_process::{launch_as_job, try_launch_as_job, JobOptions, LaunchConfig};
use common::*;
use std::time::Duration;

#[test]
fn test_terminate_job_after_process_handle_released() {
    let config = LaunchConfig::builder(sleeper(30)).build().unwrap();

    println!("Step 1: Launching a sleeper inside a job...");
    let result = launch_as_job(&config, &JobOptions::default());
    assert!(result.succeeded(), "job launch failed: {:?}", result.error);
    assert!(result.process_id > 0);
    let pid = result.process_id;
    let job = result.job.expect("job handle");
    assert!(process_running(pid));

    println!("Step 2: Releasing the process handle...");
    drop(result.process);
    assert!(process_running(pid));

    println!("Step 3: Terminating through the job...");
    job.terminate(7).unwrap();
    assert!(wait_until(Duration::from_secs(10), || !process_running(pid)));

    // terminating an emptied job is not an error
    job.terminate(7).unwrap();
}

#[test]
#[cfg(unix)]
fn test_terminate_job_kills_grandchild() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("grandchild.pid");
    let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

    println!("Step 1: Launching a shell that spawns a grandchild...");
    let config = LaunchConfig::builder(shell(&script)).build().unwrap();
    let launched = try_launch_as_job(&config, &JobOptions::default()).unwrap();
    let mut leader = launched.process.unwrap();
    let job = launched.job.unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        read_trimmed(&pid_file).parse::<u32>().is_ok()
    }));
    let grandchild: u32 = read_trimmed(&pid_file).parse().unwrap();
    assert!(process_running(grandchild));

    println!("Step 2: Terminating the job...");
    job.terminate(1).unwrap();
    let status = leader.wait().unwrap();
    assert!(!status.success());

    println!("Step 3: Grandchild must be gone too...");
    assert!(wait_until(Duration::from_secs(10), || !process_running(grandchild)));
}

#[test]
#[cfg(windows)]
fn test_terminate_job_sets_exit_code() {
    let config = LaunchConfig::builder(sleeper(30)).build().unwrap();
    let launched = try_launch_as_job(&config, &JobOptions::default()).unwrap();
    let mut process = launched.process.unwrap();
    let job = launched.job.unwrap();

    job.terminate(42).unwrap();
    let status = process.wait().unwrap();
    assert_eq!(status, cma_common::ExitStatus::Code(42));
}

#[test]
fn test_detach_mode_keeps_only_the_job() {
    let config = LaunchConfig::builder(sleeper(30))
        .completion(Completion::Detach)
        .build()
        .unwrap();
    let result = launch_as_job(&config, &JobOptions::default());

    assert!(result.succeeded());
    assert!(result.process.is_none());
    let pid = result.process_id;
    let job = result.job.expect("job handle");

    job.terminate(1).unwrap();
    assert!(wait_until(Duration::from_secs(10), || !process_running(pid)));
}

#[test]
fn test_kill_on_close() {
    let config = LaunchConfig::builder(sleeper(30)).build().unwrap();
    let options = JobOptions { kill_on_close: true };
    let result = launch_as_job(&config, &options);
    assert!(result.succeeded());
    let pid = result.process_id;

    println!("Dropping the job handle must take the process with it...");
    drop(result.job);
    assert!(wait_until(Duration::from_secs(10), || !process_running(pid)));
}

#[test]
fn test_job_launch_failure_leaves_nothing() {
    let config = LaunchConfig::builder(missing_program()).build().unwrap();
    let result = launch_as_job(&config, &JobOptions::default());

    assert!(!result.succeeded());
    assert_eq!(result.process_id, 0);
    assert!(result.process.is_none());
    assert!(result.job.is_none());
    assert!(matches!(
        result.error,
        Some(ProcessError::SpawnFailed { .. })
    ));
}
