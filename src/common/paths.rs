//! Configuration and result file locations
//!
//! Run artifacts (reports, logs, screenshots) live under the configured
//! output directory, relative to the working directory unless absolute.

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "bench-sequencer";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/bench-sequencer/`
/// - macOS: `~/Library/Application Support/bench-sequencer/`
/// - Windows: `%APPDATA%\bench-sequencer\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Report file name for a run stamp (`YYYYmmdd_HHMMSS`)
pub fn report_file_name(stamp: &str, extension: &str) -> String {
    format!("test_report_{}.{}", stamp, extension)
}

/// Log file for a run
pub fn run_log_path(output_dir: &Path, stamp: &str) -> PathBuf {
    output_dir.join(format!("run_{}.log", stamp))
}

/// Ensure a directory exists, creating parents as needed
pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}
