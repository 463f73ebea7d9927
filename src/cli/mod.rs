//! CLI command handling
//!
//! Sets up configuration, logging and signal handling, then hands off to the
//! run loop.

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use colored::Colorize;

use crate::commands::Commands;
use crate::common::{config::Config, logging, paths, Result};
use crate::runner::{self, EXIT_FAILURES, EXIT_PASS};
use crate::script::Script;
use crate::tools::{listen_for_signals, ProcessRunner};

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            script,
            config,
            output_dir,
            format,
            log_file,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(dir) = output_dir {
                config.report.output_dir = dir;
            }
            if let Some(format) = format {
                config.report.format = format;
            }

            let log_path = log_file.then(|| {
                let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
                paths::run_log_path(&config.report.output_dir, &stamp)
            });
            if logging::init_cli(log_path.as_deref()) {
                if let Some(path) = &log_path {
                    tracing::info!("Logging to {}", path.display());
                }
            }

            run(&script, &config).await
        }

        Commands::Check { script } => {
            logging::init_cli(None);
            check(&script)
        }

        Commands::ConfigPath => {
            match paths::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No configuration directory available on this platform"),
            }
            Ok(EXIT_PASS)
        }
    }
}

async fn run(script: &Path, config: &Config) -> Result<i32> {
    let interrupt = listen_for_signals();
    let tools = Arc::new(ProcessRunner::new());

    let outcome = runner::run_script(script, config, tools, interrupt).await;
    outcome.print_summary();
    Ok(outcome.exit_code())
}

fn check(path: &Path) -> Result<i32> {
    let script = match Script::load(path) {
        Ok(script) => script,
        Err(e) => {
            println!("  {} {}", "✗".red(), e);
            return Ok(EXIT_FAILURES);
        }
    };
    let errors = script.check();

    if errors.is_empty() {
        println!(
            "{} {} ({} commands)",
            "✓".green(),
            path.display(),
            script.lines.len()
        );
        return Ok(EXIT_PASS);
    }

    for (line, error) in &errors {
        println!("  {} line {}: {}", "✗".red(), line, error);
    }
    println!("\n{} error(s) in {}", errors.len(), path.display());
    Ok(EXIT_FAILURES)
}
