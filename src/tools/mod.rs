//! External instrument-control tools
//!
//! Every instrument is driven by running a collaborator executable to
//! completion. [`ToolRunner`] is the seam: the real implementation spawns a
//! process, tests substitute a recording fake.

pub mod instruments;
pub mod interrupt;
pub mod process;
pub mod testing;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::common::{Error, Result};

pub use instruments::Instruments;
pub use interrupt::{listen_for_signals, Interrupt, InterruptTrigger};
pub use process::ProcessRunner;

/// One external tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to launch (the interpreter)
    pub program: PathBuf,
    /// Arguments, starting with the tool path
    pub args: Vec<String>,
    /// Human-readable step description for logs and failure notes
    pub description: String,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, description: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append `flag value` only when a value is present
    pub fn opt_arg(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    /// Whether the argument vector contains `needle` as a whole argument
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Command line rendered for logging
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured output of a successful tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Last non-empty line of stdout
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
    }

    /// Parse the scalar a read-style tool reports on its last output line
    pub fn scalar(&self, description: &str) -> Result<f64> {
        let line = self
            .last_line()
            .ok_or_else(|| Error::tool_output(description, &self.stdout))?;
        line.parse::<f64>()
            .map_err(|_| Error::tool_output(description, line))
    }
}

/// Runs external tools to completion
///
/// Implementations must return `Error::ToolFailed` for a nonzero exit,
/// `Error::ToolSpawn` when the process cannot be run, and
/// `Error::Interrupted` (after terminating the child) when `interrupt`
/// fires while waiting.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation, interrupt: &Interrupt) -> Result<ToolOutput>;
}
