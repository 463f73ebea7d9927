//! Common utilities shared across the sequencer

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Format a value the way reports show it
pub fn fmt4(value: f64) -> String {
    format!("{:.4}", value)
}
