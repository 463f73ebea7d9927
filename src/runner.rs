//! Script run loop
//!
//! Executes a script line by line against a [`Session`] and guarantees the
//! shutdown sequence on every exit path: an interrupted or crashed run
//! powers the DUT off first, then every run writes its report from whatever
//! test cases were finalized.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use colored::Colorize;
use futures_util::FutureExt;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::report::{Report, Termination};
use crate::script::Script;
use crate::session::{handle_line, Session, TestCase};
use crate::tools::{Interrupt, ToolRunner};

/// All test cases passed
pub const EXIT_PASS: i32 = 0;
/// The run completed with failing cases
pub const EXIT_FAILURES: i32 = 1;
/// A fatal error ended the run
pub const EXIT_FATAL: i32 = 2;
/// The operator interrupted the run
pub const EXIT_INTERRUPTED: i32 = 130;

/// Result of a script run
#[derive(Debug)]
pub struct RunOutcome {
    pub termination: Termination,
    /// Finalized test cases, in script order
    pub cases: Vec<TestCase>,
    /// `id (title)` of each case that recorded a failure
    pub failures: Vec<String>,
    /// Report file, when one was written
    pub report_path: Option<PathBuf>,
    /// The fatal error, for crashed runs
    pub error: Option<String>,
    /// Whether the fail-safe power-off was attempted
    pub emergency_power_off: bool,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self.termination {
            Termination::Interrupted => EXIT_INTERRUPTED,
            Termination::Crashed => EXIT_FATAL,
            Termination::Completed if self.failures.is_empty() => EXIT_PASS,
            Termination::Completed => EXIT_FAILURES,
        }
    }

    /// Print the end-of-run summary for the operator
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        match self.termination {
            Termination::Interrupted => {
                println!("{}", "Run interrupted by operator".yellow().bold());
            }
            Termination::Crashed => {
                println!(
                    "{} {}",
                    "Run aborted:".red().bold(),
                    self.error.as_deref().unwrap_or("unknown error")
                );
            }
            Termination::Completed if self.failures.is_empty() => {
                println!("All tests finished, result: {}", "PASS".green().bold());
            }
            Termination::Completed => {
                println!("Tests finished with {} failing case(s):", self.failures.len());
                for label in &self.failures {
                    println!(" - {}", label.red());
                }
            }
        }
    }
}

/// Load and run a script file
///
/// Never returns an error: every failure, including an unreadable script,
/// ends up in the returned outcome after the shutdown sequence ran.
pub async fn run_script(
    path: &Path,
    config: &Config,
    tools: Arc<dyn ToolRunner>,
    interrupt: Interrupt,
) -> RunOutcome {
    let started = Local::now();
    let mut session = Session::new(config, tools, interrupt);

    let result = match Script::load(path) {
        Ok(script) => {
            println!("Loading test sequence: {}", path.display());
            execute(&mut session, &script).await
        }
        Err(e) => Err(e),
    };

    finish(session, config, started, result).await
}

/// Run an already loaded script
pub async fn run(
    script: &Script,
    config: &Config,
    tools: Arc<dyn ToolRunner>,
    interrupt: Interrupt,
) -> RunOutcome {
    let started = Local::now();
    let mut session = Session::new(config, tools, interrupt);
    let result = execute(&mut session, script).await;
    finish(session, config, started, result).await
}

/// Execute every line in order, stopping only on a fatal error
///
/// A panic in a handler is caught and treated as a fatal error so the
/// shutdown sequence still runs.
async fn execute(session: &mut Session, script: &Script) -> Result<()> {
    let body = async {
        for line in &script.lines {
            // Lines without tool calls never suspend; give the signal
            // listener a turn so an interrupt lands between them
            tokio::task::yield_now().await;
            if session.interrupt().is_triggered() {
                return Err(Error::Interrupted);
            }
            handle_line(session, line).await?;
        }
        Ok(())
    };

    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(Error::Internal(message))
        }
    }
}

/// Shutdown sequence shared by every exit path
async fn finish(
    mut session: Session,
    config: &Config,
    started: DateTime<Local>,
    result: Result<()>,
) -> RunOutcome {
    session.cases.finalize();

    let termination = match &result {
        Ok(()) => Termination::Completed,
        Err(Error::Interrupted) => Termination::Interrupted,
        Err(_) => Termination::Crashed,
    };

    let emergency = termination != Termination::Completed;
    if emergency {
        match &result {
            Err(Error::Interrupted) => {
                println!("\n\n{}", "!!! Operator interrupt (Ctrl+C) !!!".red().bold());
            }
            Err(e) => tracing::error!("Fatal error: {}", e),
            Ok(()) => {}
        }
        println!("{}", "Emergency power-off...".yellow());
        if let Err(e) = session.emergency_power_off().await {
            tracing::error!("Emergency power-off failed: {}", e);
        }
    }

    let cases = session.cases.finalized().to_vec();
    let report_path = if cases.is_empty() {
        tracing::info!("No test cases finalized, skipping report");
        None
    } else {
        let report = Report::new(started, Local::now(), termination, cases.clone());
        match report.write(&config.report.output_dir, config.report.format) {
            Ok(path) => {
                println!("\n[Report] Test report written: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::error!("Failed to write report: {}", e);
                None
            }
        }
    };

    RunOutcome {
        termination,
        cases,
        failures: session.cases.failures().to_vec(),
        report_path,
        error: result.err().map(|e| e.to_string()),
        emergency_power_off: emergency,
    }
}
