//! Launch specs loaded from YAML.
//!
//! ```yaml
//! command_line: '"C:\Program Files\tool\tool.exe" --scan'
//! working_directory: C:\ProgramData\agent
//! stdout: { file: C:\ProgramData\agent\tool.log, append: true }
//! stderr: discard
//! inherit_handles: true
//! console:
//!   no_window: true
//! completion: track
//! job:
//!   kill_on_close: true
//! ```
//!
//! A spec is plain data; [`LaunchSpec::into_config`] opens redirect files and
//! runs the same validation as [`LaunchConfigBuilder::build`](crate::LaunchConfigBuilder::build).

use crate::config::{LaunchConfig, Redirect};
use crate::job::JobOptions;
use cma_common::{Completion, ProcessError, ProcessResult, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub command_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub stdin: StdioSpec,
    #[serde(default)]
    pub stdout: StdioSpec,
    #[serde(default)]
    pub stderr: StdioSpec,
    #[serde(default)]
    pub inherit_handles: bool,
    #[serde(default)]
    pub console: ConsoleSpec,
    #[serde(default)]
    pub completion: Completion,
    /// Present when the process should be started inside a job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobOptions>,
}

/// `inherit`, `discard`, or `{ file: <path>, append: <bool> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StdioSpec {
    Mode(StdioMode),
    File {
        file: PathBuf,
        #[serde(default)]
        append: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdioMode {
    Inherit,
    Discard,
}

impl Default for StdioSpec {
    fn default() -> Self {
        StdioSpec::Mode(StdioMode::Inherit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSpec {
    pub new_console: bool,
    pub no_window: bool,
    pub detached: bool,
    pub new_process_group: bool,
    pub hide_window: bool,
}

impl LaunchSpec {
    /// Load a spec from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).context(format!(
            "Failed to read launch spec: {}",
            path.as_ref().display()
        ))?;

        Self::load_from_string(&content)
    }

    /// Load a spec from a YAML string.
    pub fn load_from_string(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML launch spec")
    }

    /// Open redirect targets and build a validated [`LaunchConfig`].
    pub fn into_config(&self) -> ProcessResult<LaunchConfig> {
        let mut builder = LaunchConfig::builder(self.command_line.clone())
            .stdin(open_redirect(&self.stdin, true)?)
            .stdout(open_redirect(&self.stdout, false)?)
            .stderr(open_redirect(&self.stderr, false)?)
            .inherit_handles(self.inherit_handles)
            .new_console(self.console.new_console)
            .no_window(self.console.no_window)
            .detached_console(self.console.detached)
            .new_process_group(self.console.new_process_group)
            .hide_window(self.console.hide_window)
            .completion(self.completion);
        if let Some(dir) = &self.working_directory {
            builder = builder.working_directory(dir);
        }
        builder.build()
    }
}

fn open_redirect(spec: &StdioSpec, input: bool) -> ProcessResult<Redirect> {
    match spec {
        StdioSpec::Mode(StdioMode::Inherit) => Ok(Redirect::Inherit),
        StdioSpec::Mode(StdioMode::Discard) => Ok(Redirect::Null),
        StdioSpec::File { file, append } => {
            let opened = if input {
                File::open(file)
            } else if *append {
                OpenOptions::new().create(true).append(true).open(file)
            } else {
                File::create(file)
            };
            opened.map(Redirect::file).map_err(|e| {
                ProcessError::configuration(format!(
                    "Cannot open redirect target {}: {}",
                    file.display(),
                    e
                ))
            })
        }
    }
}
