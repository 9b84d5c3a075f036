//! Launch configuration.
//!
//! A [`LaunchConfig`] is built once through [`LaunchConfigBuilder`], validated
//! in [`LaunchConfigBuilder::build`], and then only read by the launcher.
//! Console and startup behaviour are named options rather than raw flag words;
//! each backend maps them onto its own primitives.

use cma_common::{Completion, ProcessError, ProcessResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where one standard stream of the child goes.
#[derive(Debug, Clone, Default)]
pub enum Redirect {
    /// Whatever the launching process has for this stream.
    #[default]
    Inherit,
    /// The null device.
    Null,
    /// An open file. The launcher passes a duplicate to the child and keeps
    /// this one untouched.
    File(Arc<File>),
}

impl Redirect {
    pub fn file(file: File) -> Self {
        Redirect::File(Arc::new(file))
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, Redirect::Inherit)
    }
}

/// Process creation options.
///
/// On Windows these become `CREATE_NEW_CONSOLE`, `CREATE_NO_WINDOW`,
/// `DETACHED_PROCESS` and `CREATE_NEW_PROCESS_GROUP`. On Unix only the
/// process group options have a meaning; both put the child in a new
/// process group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreationOptions {
    pub new_console: bool,
    pub no_window: bool,
    pub detached_console: bool,
    pub new_process_group: bool,
}

/// Startup options (`STARTUPINFO` on Windows, ignored elsewhere).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupOptions {
    pub hide_window: bool,
}

/// Everything needed to start one process.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    command_line: String,
    working_directory: Option<PathBuf>,
    stdin: Redirect,
    stdout: Redirect,
    stderr: Redirect,
    inherit_handles: bool,
    creation: CreationOptions,
    startup: StartupOptions,
    completion: Completion,
}

impl LaunchConfig {
    /// Start building a configuration for `command_line` (executable plus
    /// arguments, quoted the Windows way).
    pub fn builder(command_line: impl Into<String>) -> LaunchConfigBuilder {
        LaunchConfigBuilder::new(command_line)
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn stdin(&self) -> &Redirect {
        &self.stdin
    }

    pub fn stdout(&self) -> &Redirect {
        &self.stdout
    }

    pub fn stderr(&self) -> &Redirect {
        &self.stderr
    }

    pub fn inherit_handles(&self) -> bool {
        self.inherit_handles
    }

    pub fn creation(&self) -> CreationOptions {
        self.creation
    }

    pub fn startup(&self) -> StartupOptions {
        self.startup
    }

    pub fn completion(&self) -> Completion {
        self.completion
    }

    /// True when at least one standard stream is not inherited.
    pub fn redirects_stdio(&self) -> bool {
        !(self.stdin.is_inherit() && self.stdout.is_inherit() && self.stderr.is_inherit())
    }
}

/// Builder for [`LaunchConfig`].
///
/// ```
/// use cma_common::Completion;
/// use cma_process::LaunchConfig;
///
/// let config = LaunchConfig::builder("cmd.exe /C echo hello")
///     .completion(Completion::Wait)
///     .no_window(true)
///     .build()
///     .unwrap();
/// assert!(config.completion().waits());
/// ```
#[derive(Debug, Clone)]
pub struct LaunchConfigBuilder {
    config: LaunchConfig,
}

impl LaunchConfigBuilder {
    fn new(command_line: impl Into<String>) -> Self {
        Self {
            config: LaunchConfig {
                command_line: command_line.into(),
                working_directory: None,
                stdin: Redirect::Inherit,
                stdout: Redirect::Inherit,
                stderr: Redirect::Inherit,
                inherit_handles: false,
                creation: CreationOptions::default(),
                startup: StartupOptions::default(),
                completion: Completion::default(),
            },
        }
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(dir.into());
        self
    }

    pub fn stdin(mut self, redirect: Redirect) -> Self {
        self.config.stdin = redirect;
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.config.stdout = redirect;
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.config.stderr = redirect;
        self
    }

    pub fn inherit_handles(mut self, inherit: bool) -> Self {
        self.config.inherit_handles = inherit;
        self
    }

    pub fn creation(mut self, creation: CreationOptions) -> Self {
        self.config.creation = creation;
        self
    }

    pub fn new_console(mut self, on: bool) -> Self {
        self.config.creation.new_console = on;
        self
    }

    pub fn no_window(mut self, on: bool) -> Self {
        self.config.creation.no_window = on;
        self
    }

    pub fn detached_console(mut self, on: bool) -> Self {
        self.config.creation.detached_console = on;
        self
    }

    pub fn new_process_group(mut self, on: bool) -> Self {
        self.config.creation.new_process_group = on;
        self
    }

    pub fn hide_window(mut self, on: bool) -> Self {
        self.config.startup.hide_window = on;
        self
    }

    pub fn completion(mut self, completion: Completion) -> Self {
        self.config.completion = completion;
        self
    }

    /// Shorthand for `Completion::Wait` / `Completion::Track`.
    pub fn wait_for_completion(self, wait: bool) -> Self {
        self.completion(if wait { Completion::Wait } else { Completion::Track })
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> ProcessResult<LaunchConfig> {
        validate(&self.config)?;
        Ok(self.config)
    }
}

fn validate(config: &LaunchConfig) -> ProcessResult<()> {
    if config.command_line.trim().is_empty() {
        return Err(ProcessError::configuration("Command line cannot be empty"));
    }

    if config.command_line.contains('\0') {
        return Err(ProcessError::configuration(
            "Command line cannot contain NUL characters",
        ));
    }

    if config.redirects_stdio() && !config.inherit_handles {
        return Err(ProcessError::configuration(
            "Redirected stdio requires inherit_handles, the child would not receive the handles",
        ));
    }

    let creation = &config.creation;
    if creation.new_console && creation.detached_console {
        return Err(ProcessError::configuration(
            "new_console and detached_console are mutually exclusive",
        ));
    }
    if creation.new_console && creation.no_window {
        return Err(ProcessError::configuration(
            "no_window has no effect together with new_console",
        ));
    }

    if let Some(dir) = &config.working_directory {
        if !dir.is_dir() {
            return Err(ProcessError::configuration(format!(
                "Working directory does not exist: {}",
                dir.display()
            )));
        }
    }

    Ok(())
}
