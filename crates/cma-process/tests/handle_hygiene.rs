//! Repeated launch/cleanup cycles must not grow the open-handle count, and on
//! Unix must not leave zombie children behind.
//!
//! Kept in its own test binary: other tests running in parallel would open
//! handles of their own and skew the count.

mod common;

use cma_common::Completion;
use cma_process::{launch, launch_as_job, run_detached, JobOptions, LaunchConfig};
use common::*;
use std::time::Duration;

fn cycle() {
    // success, wait mode
    let config = LaunchConfig::builder(shell("exit 0"))
        .completion(Completion::Wait)
        .build()
        .unwrap();
    assert!(launch(&config).succeeded());

    // failure
    let config = LaunchConfig::builder(missing_program()).build().unwrap();
    assert!(!launch(&config).succeeded());

    // track mode, caller waits and drops
    let config = LaunchConfig::builder(shell("exit 0")).build().unwrap();
    let mut process = launch(&config).process.unwrap();
    process.wait().unwrap();
    drop(process);

    // track mode, handle dropped while the child still runs
    let config = LaunchConfig::builder(brief_sleeper()).build().unwrap();
    let result = launch(&config);
    assert!(result.process.is_some());
    drop(result);

    // detach mode and the detached helper, child exits after we let go
    let config = LaunchConfig::builder(brief_sleeper())
        .completion(Completion::Detach)
        .build()
        .unwrap();
    assert!(launch(&config).succeeded());
    assert!(run_detached(&brief_sleeper()));

    // job, terminated and dropped
    let config = LaunchConfig::builder(sleeper(30)).build().unwrap();
    let result = launch_as_job(&config, &JobOptions::default());
    assert!(result.succeeded());
    let mut process = result.process.unwrap();
    result.job.as_ref().unwrap().terminate(1).unwrap();
    process.wait().unwrap();
    drop(process);
    drop(result.job);

    // job in detach mode, terminated through the job handle only
    let config = LaunchConfig::builder(sleeper(30))
        .completion(Completion::Detach)
        .build()
        .unwrap();
    let result = launch_as_job(&config, &JobOptions::default());
    assert!(result.succeeded());
    assert!(result.process.is_none());
    let job = result.job.unwrap();
    job.terminate(1).unwrap();
    drop(job);

    // job launch failure
    let config = LaunchConfig::builder(missing_program()).build().unwrap();
    assert!(!launch_as_job(&config, &JobOptions::default()).succeeded());
}

#[test]
fn test_no_resource_growth_over_many_cycles() {
    let Some(_) = open_handle_count() else {
        println!("Handle count not available on this host, skipping");
        return;
    };

    // warm up lazily opened runtime handles and the reaper thread
    cycle();
    std::thread::sleep(Duration::from_secs(1));
    let before = open_handle_count().unwrap();

    for i in 0..25 {
        println!("Cycle {}", i);
        cycle();
    }

    // released children finish on their own; give them time to be collected
    std::thread::sleep(Duration::from_secs(1));
    let after = open_handle_count().unwrap();

    println!("Handles before: {}, after: {}", before, after);
    assert!(after <= before, "handle count grew from {} to {}", before, after);

    #[cfg(target_os = "linux")]
    {
        println!("Every released child must have been reaped...");
        let reaped = wait_until(Duration::from_secs(15), || zombie_children() == Some(0));
        assert!(
            reaped,
            "{:?} zombie children left after release",
            zombie_children()
        );
    }
}
