//! Interpreter session state
//!
//! A [`Session`] owns everything a script run mutates: variables, endpoint
//! configuration and test cases. Handlers receive it explicitly, so several
//! runs can coexist in one process.

pub mod case;
pub mod config_store;
pub mod handler;
pub mod variables;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::common::config::{Config, PowerConfig, TimingConfig};
use crate::common::{Error, Result};
use crate::tools::{Instruments, Interrupt, Invocation, ToolOutput, ToolRunner};

pub use case::{CaseTracker, TestCase, Verdict};
pub use config_store::ConfigStore;
pub use handler::{handle_command, handle_line};
pub use variables::VariableStore;

/// Mutable interpreter state for one script run
pub struct Session {
    pub variables: VariableStore,
    pub endpoints: ConfigStore,
    pub cases: CaseTracker,
    instruments: Instruments,
    runner: Arc<dyn ToolRunner>,
    interrupt: Interrupt,
    power: PowerConfig,
    timing: TimingConfig,
    output_dir: PathBuf,
    screenshot_subdir: String,
}

impl Session {
    pub fn new(config: &Config, runner: Arc<dyn ToolRunner>, interrupt: Interrupt) -> Self {
        Self {
            variables: VariableStore::new(),
            endpoints: ConfigStore::from_endpoints(&config.endpoints),
            cases: CaseTracker::new(),
            instruments: Instruments::from_config(&config.tools),
            runner,
            interrupt,
            power: config.power.clone(),
            timing: config.timing.clone(),
            output_dir: config.report.output_dir.clone(),
            screenshot_subdir: config.report.screenshot_dir.clone(),
        }
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn instruments(&self) -> &Instruments {
        &self.instruments
    }

    /// Run a tool, cancellable by the session's interrupt
    pub async fn run_tool(&self, invocation: &Invocation) -> Result<ToolOutput> {
        self.runner.run(invocation, &self.interrupt).await
    }

    /// Attribute a non-fatal error to the open test case
    pub fn record_error(&mut self, error: &Error, line: Option<usize>) {
        match line {
            Some(line) => tracing::warn!("line {}: {}", line, error),
            None => tracing::warn!("{}", error),
        }
        self.cases.record_failure(&error.to_string());
    }

    /// Fail-safe power-off
    ///
    /// Ignores the operator interrupt (which is usually why this runs) and
    /// is bounded by the configured emergency timeout instead.
    pub async fn emergency_power_off(&self) -> Result<()> {
        let invocation = self.instruments.power_off(&self.endpoints);
        let secs = self.timing.emergency_timeout_secs;
        let never = Interrupt::never();

        match tokio::time::timeout(
            Duration::from_secs(secs),
            self.runner.run(&invocation, &never),
        )
        .await
        {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(Error::ToolTimeout {
                description: invocation.description,
                secs,
            }),
        }
    }

    pub(crate) fn power_defaults(&self) -> &PowerConfig {
        &self.power
    }

    pub(crate) fn power_cycle_pause(&self) -> Duration {
        Duration::from_millis(self.timing.power_cycle_pause_ms)
    }

    /// Directory screenshots are written to
    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join(&self.screenshot_subdir)
    }

    /// Screenshot link relative to the report file
    pub(crate) fn screenshot_link(&self, label: &str, file_name: &str) -> String {
        format!("![{}]({}/{})", label, self.screenshot_subdir, file_name)
    }
}
