//! CLI command definitions
//!
//! Defines the clap commands for the sequencer CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::common::config::ReportFormat;

/// Sequence file used when none is given
pub const DEFAULT_SCRIPT: &str = "test_script.txt";

#[derive(Subcommand)]
pub enum Commands {
    /// Run a test sequence against the instruments
    Run {
        /// Path to the test sequence script
        #[arg(default_value = DEFAULT_SCRIPT)]
        script: PathBuf,

        /// Configuration file (default: platform config dir)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Directory for reports, screenshots and logs
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum)]
        format: Option<ReportFormat>,

        /// Also write the run log into the output directory
        #[arg(long)]
        log_file: bool,
    },

    /// Check a script for syntax errors without touching any instrument
    Check {
        /// Path to the test sequence script
        script: PathBuf,
    },

    /// Print the configuration file location
    ConfigPath,
}
