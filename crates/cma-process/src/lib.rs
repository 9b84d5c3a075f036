//! # CMA Process
//!
//! Process launch and job-tree control for the agent.
//!
//! This crate provides:
//! - Launching external programs in wait, track, or detach mode
//! - Job-tracked launches for whole-tree termination
//! - Move-only owners for every OS handle a launch produces
//! - The elevation check used to decide on privileged launches
//!
//! ```rust,no_run
//! use cma_common::Completion;
//! use cma_process::{launch_as_job, JobOptions, LaunchConfig};
//!
//! let config = LaunchConfig::builder("plugin.exe --inventory")
//!     .completion(Completion::Track)
//!     .no_window(true)
//!     .build()?;
//! let result = launch_as_job(&config, &JobOptions::default());
//! if let Some(job) = &result.job {
//!     job.terminate(1)?;
//! }
//! # Ok::<(), cma_common::ProcessError>(())
//! ```

pub mod cmdline;
pub mod config;
pub mod handle;
pub mod job;
pub mod launch;
pub mod launch_spec;
pub mod privilege;

#[cfg(windows)]
mod launch_windows;
#[cfg(windows)]
use launch_windows as sys;

#[cfg(unix)]
mod launch_unix;
#[cfg(unix)]
mod reaper;
#[cfg(unix)]
use launch_unix as sys;

// Re-export main types
pub use config::{CreationOptions, LaunchConfig, LaunchConfigBuilder, Redirect, StartupOptions};
pub use handle::{JobHandle, ProcessHandle};
pub use job::{launch_as_job, try_launch_as_job, JobOptions};
pub use launch::{
    launch, run_and_wait, run_detached, run_std_command, try_launch, LaunchResult, Launched,
};
pub use launch_spec::{ConsoleSpec, LaunchSpec, StdioMode, StdioSpec};
pub use privilege::is_elevated;
