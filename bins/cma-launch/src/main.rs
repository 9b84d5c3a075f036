use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use cma_common::Completion;
use cma_process::{
    is_elevated, try_launch, try_launch_as_job, JobOptions, LaunchConfig, LaunchSpec, Launched,
};

/// Start a program the way the agent starts its plugins and helpers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Launch spec file (YAML); replaces the command line and mode options
    #[arg(short, long, value_name = "FILE", conflicts_with = "command")]
    config: Option<PathBuf>,

    /// How to run the program
    #[arg(short, long, value_enum, default_value = "wait")]
    mode: Mode,

    /// Working directory for the program
    #[arg(long, value_name = "DIR")]
    cwd: Option<PathBuf>,

    /// Kill the whole job when this tool exits (job mode only)
    #[arg(long)]
    kill_on_close: bool,

    /// In track and job modes, wait this many seconds and then terminate
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Only report whether this process runs elevated
    #[arg(long)]
    elevated: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Program and arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Wait,
    Track,
    Detach,
    Job,
}

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.debug)?;

    if args.elevated {
        println!("elevated: {}", is_elevated());
        return Ok(());
    }

    let (config, job) = match &args.config {
        Some(path) => {
            info!("Launch spec: {}", path.display());
            let spec = LaunchSpec::load_from_file(path)?;
            (spec.into_config()?, spec.job)
        }
        None => build_from_args(&args)?,
    };

    let launched = match &job {
        Some(options) => try_launch_as_job(&config, options),
        None => try_launch(&config),
    }
    .with_context(|| format!("Failed to launch: {}", config.command_line()))?;

    println!("pid: {}", launched.process_id);
    supervise(launched, args.timeout.map(Duration::from_secs))
}

fn build_from_args(args: &Args) -> Result<(LaunchConfig, Option<JobOptions>)> {
    let completion = match args.mode {
        Mode::Wait => Completion::Wait,
        Mode::Track | Mode::Job => Completion::Track,
        Mode::Detach => Completion::Detach,
    };
    let mut builder =
        LaunchConfig::builder(join_command_line(&args.command)?).completion(completion);
    if let Some(dir) = &args.cwd {
        builder = builder.working_directory(dir);
    }

    let job = (args.mode == Mode::Job).then_some(JobOptions {
        kill_on_close: args.kill_on_close,
    });
    Ok((builder.build()?, job))
}

/// Wait for a tracked process, terminating it (or its job) after `timeout`.
fn supervise(launched: Launched, timeout: Option<Duration>) -> Result<()> {
    if let Some(status) = launched.exit_status {
        println!("exit: {}", status);
        return Ok(());
    }
    let Some(mut process) = launched.process else {
        info!("Process detached");
        return Ok(());
    };

    let status = match timeout {
        None => process.wait()?,
        Some(limit) => match process.wait_timeout(limit)? {
            Some(status) => status,
            None => {
                warn!("Timeout of {:?} reached, terminating", limit);
                match &launched.job {
                    Some(job) => job.terminate(1)?,
                    None => process.kill()?,
                }
                process.wait()?
            }
        },
    };
    println!("exit: {}", status);
    Ok(())
}

/// Build one command line that `cmdline::split` turns back into `parts`.
///
/// The program name follows `CommandLineToArgvW` program rules: quotes only
/// delimit, so it cannot contain a quote itself.
fn join_command_line(parts: &[String]) -> Result<String> {
    let Some((program, args)) = parts.split_first() else {
        return Err(anyhow!("No command given (use --config or pass a command)"));
    };
    if program.contains('"') {
        return Err(anyhow!("Program name cannot contain '\"': {}", program));
    }

    let mut line = if program.is_empty() || program.contains([' ', '\t']) {
        format!("\"{}\"", program)
    } else {
        program.clone()
    };
    for arg in args {
        line.push(' ');
        line.push_str(&quote_arg(arg));
    }
    Ok(line)
}

/// Escape one argument: backslashes are doubled only where they precede a
/// quote, and quotes are backslash-escaped.
fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut slashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => slashes += 1,
            '"' => {
                quoted.extend(std::iter::repeat('\\').take(slashes * 2 + 1));
                quoted.push('"');
                slashes = 0;
            }
            c => {
                quoted.extend(std::iter::repeat('\\').take(slashes));
                quoted.push(c);
                slashes = 0;
            }
        }
    }
    // the closing quote follows, so trailing backslashes double
    quoted.extend(std::iter::repeat('\\').take(slashes * 2));
    quoted.push('"');
    quoted
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
