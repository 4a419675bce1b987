//! External tools - command construction and blocking child-process execution

pub mod bowtie2;
pub mod kraken2;
pub mod registry;
pub mod trimmomatic;

pub use registry::{ChildRegistry, ChildState};

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// How often a running child is checked for exit
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A fully constructed external command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Short name used for log files and messages (`bowtie2`, `kraken2`, ...)
    pub tool: &'static str,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(tool: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Runs external commands to completion.
///
/// Implementations block until the child exits and return a human-readable
/// reason on failure; the caller decides which pipeline stage failed.
pub trait ToolRunner: Send + Sync {
    fn run(&self, command: &ToolCommand, log_path: &Path) -> Result<(), String>;
}

/// Runs commands as real child processes, with stdout and stderr written to
/// a per-sample log file.
///
/// Every child is held in a `ChildRegistry` while it runs, so an interrupt
/// handler can kill and reap it.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    registry: Arc<ChildRegistry>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::with_registry(ChildRegistry::global())
    }
}

impl ProcessRunner {
    pub fn with_registry(registry: Arc<ChildRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ChildRegistry> {
        &self.registry
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, command: &ToolCommand, log_path: &Path) -> Result<(), String> {
        if self.registry.is_terminated() {
            return Err(format!("{} not started: run interrupted", command.tool));
        }
        info!("Running {} command: {}", command.tool, command);

        let log = File::create(log_path)
            .map_err(|e| format!("cannot create log {}: {}", log_path.display(), e))?;
        let log_err = log
            .try_clone()
            .map_err(|e| format!("cannot duplicate log handle {}: {}", log_path.display(), e))?;

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|e| format!("failed to start {}: {}", command.program.display(), e))?;

        let pid = self
            .registry
            .register(child)
            .ok_or_else(|| format!("{} not started: run interrupted", command.tool))?;
        debug!("{} running as pid {}", command.tool, pid);

        let status = loop {
            match self
                .registry
                .poll(pid)
                .map_err(|e| format!("failed waiting for {}: {}", command.tool, e))?
            {
                ChildState::Running => thread::sleep(POLL_INTERVAL),
                ChildState::Exited(status) => break status,
                ChildState::Stopped => return Err(format!("{} stopped: run interrupted", command.tool)),
            }
        };

        if status.success() {
            debug!("{} finished, log at {}", command.tool, log_path.display());
            Ok(())
        } else {
            Err(match status.code() {
                Some(code) => format!(
                    "{} exited with status {} (see {})",
                    command.tool,
                    code,
                    log_path.display()
                ),
                None => format!("{} was terminated by a signal", command.tool),
            })
        }
    }
}

/// Per-sample log file for one tool
pub fn log_path(log_dir: &Path, sample_id: &str, tool: &str) -> PathBuf {
    log_dir.join(format!("{}_{}.log", sample_id, tool))
}
