//! Error types for the test sequencer
//!
//! Most errors are recorded against the open test case and the run carries
//! on. Only the variants reported by [`Error::is_fatal`] end a run, and even
//! those go through the emergency power-off path first.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the sequencer
#[derive(Error, Debug)]
pub enum Error {
    // === Script Syntax Errors ===
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}: wrong arguments. Usage: {usage}")]
    Usage {
        command: &'static str,
        usage: &'static str,
    },

    #[error("Variable name must start with '$': {0}")]
    InvalidVariableName(String),

    #[error("Expected keyword 'TO', got '{0}'")]
    ExpectedTo(String),

    #[error("Invalid WAIT duration '{0}': expected a number of seconds")]
    InvalidDuration(String),

    // === Semantic Errors ===
    #[error("Undefined variable: {0} (define it with DEF_VAR first)")]
    UndefinedVariable(String),

    #[error("Cannot parse value '{token}': {reason}")]
    InvalidValue { token: String, reason: String },

    // === Tool Invocation Errors ===
    #[error("Tool failed [{description}]: {stderr}")]
    ToolFailed { description: String, stderr: String },

    #[error("Could not run tool [{description}]: {error}")]
    ToolSpawn { description: String, error: String },

    #[error("Tool [{description}] returned a non-numeric value: '{output}'")]
    ToolOutput { description: String, output: String },

    #[error("Tool [{description}] did not finish within {secs} seconds")]
    ToolTimeout { description: String, secs: u64 },

    // === Fatal Errors ===
    #[error("Interrupted by operator")]
    Interrupted,

    #[error("Failed to read script '{path}': {error}")]
    ScriptRead { path: String, error: String },

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid value error
    pub fn invalid_value(token: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a tool failure error from captured stderr
    pub fn tool_failed(description: &str, stderr: &str) -> Self {
        Self::ToolFailed {
            description: description.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }

    /// Create a tool spawn error
    pub fn tool_spawn(description: &str, error: impl ToString) -> Self {
        Self::ToolSpawn {
            description: description.to_string(),
            error: error.to_string(),
        }
    }

    /// Create a protocol violation error for unparseable tool output
    pub fn tool_output(description: &str, output: &str) -> Self {
        Self::ToolOutput {
            description: description.to_string(),
            output: output.trim().to_string(),
        }
    }

    /// Whether this error must end the run
    ///
    /// Everything else is attributed to the open test case and execution
    /// continues with the next script line.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Interrupted
                | Error::ScriptRead { .. }
                | Error::InvalidDuration(_)
                | Error::Internal(_)
        )
    }
}
