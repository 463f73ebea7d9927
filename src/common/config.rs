//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Instrument-control tool locations
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Initial instrument endpoints, overridable from scripts with CONFIG
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Power supply defaults
    #[serde(default)]
    pub power: PowerConfig,

    /// Timing settings
    #[serde(default)]
    pub timing: TimingConfig,

    /// Report output settings
    #[serde(default)]
    pub report: ReportConfig,
}

/// Locations of the external instrument-control tools
#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    /// Interpreter used to launch every tool
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Power supply control tool
    #[serde(default = "default_power_tool")]
    pub power: PathBuf,

    /// Resistance box control tool
    #[serde(default = "default_resistance_tool")]
    pub resistance: PathBuf,

    /// Oscilloscope control tool
    #[serde(default = "default_scope_tool")]
    pub scope: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            power: default_power_tool(),
            resistance: default_resistance_tool(),
            scope: default_scope_tool(),
        }
    }
}

fn default_interpreter() -> String {
    "python".to_string()
}
fn default_power_tool() -> PathBuf {
    PathBuf::from("power_ctrl").join("power_ctrl_cli.py")
}
fn default_resistance_tool() -> PathBuf {
    PathBuf::from("res_ctrl").join("resistance_cli.py")
}
fn default_scope_tool() -> PathBuf {
    PathBuf::from("yokogawa").join("yokogawa.py")
}

impl ToolsConfig {
    /// Resolve the interpreter executable
    ///
    /// Falls back to the configured name when it cannot be found in PATH,
    /// leaving the spawn error to surface at invocation time
    pub fn interpreter_path(&self) -> PathBuf {
        which::which(&self.interpreter).unwrap_or_else(|_| PathBuf::from(&self.interpreter))
    }
}

/// Endpoints seeded into the configuration store at session start
#[derive(Debug, Deserialize, Default, Clone)]
pub struct EndpointsConfig {
    /// Resistance box serial port
    pub res_port: Option<String>,
    /// Power supply address
    pub power_addr: Option<String>,
    /// Oscilloscope address
    pub scope_ip: Option<String>,
}

/// Setpoints used by POWER_ON when the script gives none
#[derive(Debug, Deserialize, Clone)]
pub struct PowerConfig {
    #[serde(default = "default_voltage")]
    pub default_voltage: String,

    #[serde(default = "default_current")]
    pub default_current: String,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            default_voltage: default_voltage(),
            default_current: default_current(),
        }
    }
}

fn default_voltage() -> String {
    "12.0".to_string()
}
fn default_current() -> String {
    "2.0".to_string()
}

/// Timing settings
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Pause between off and on during POWER_CYCLE
    #[serde(default = "default_power_cycle_pause")]
    pub power_cycle_pause_ms: u64,

    /// Upper bound on the fail-safe power-off invocation
    #[serde(default = "default_emergency_timeout")]
    pub emergency_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            power_cycle_pause_ms: default_power_cycle_pause(),
            emergency_timeout_secs: default_emergency_timeout(),
        }
    }
}

fn default_power_cycle_pause() -> u64 {
    1000
}
fn default_emergency_timeout() -> u64 {
    10
}

/// Report file format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Markdown tables
    #[default]
    Markdown,
    /// Machine-readable JSON
    Json,
}

/// Report output settings
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Directory receiving reports, logs and screenshots
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Screenshot subdirectory, relative to `output_dir`
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: String,

    #[serde(default)]
    pub format: ReportFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            screenshot_dir: default_screenshot_dir(),
            format: ReportFormat::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("result")
}
fn default_screenshot_dir() -> String {
    "screen_shot".to_string()
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// used when present, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tools.interpreter, "python");
        assert_eq!(config.power.default_voltage, "12.0");
        assert_eq!(config.power.default_current, "2.0");
        assert_eq!(config.timing.power_cycle_pause_ms, 1000);
        assert_eq!(config.report.format, ReportFormat::Markdown);
        assert_eq!(config.report.output_dir, PathBuf::from("result"));
        assert_eq!(config.report.screenshot_dir, "screen_shot");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [tools]
            interpreter = "python3"

            [endpoints]
            res_port = "COM7"

            [report]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.tools.interpreter, "python3");
        assert_eq!(config.tools.power, default_power_tool());
        assert_eq!(config.endpoints.res_port.as_deref(), Some("COM7"));
        assert!(config.endpoints.power_addr.is_none());
        assert_eq!(config.report.format, ReportFormat::Json);
        assert_eq!(config.timing.emergency_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::parse("[tools\ninterpreter = ").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, super::super::Error::FileRead { .. }));
    }
}
