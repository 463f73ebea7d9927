//! Bench sequencer - a test sequencer for hardware-in-the-loop validation
//!
//! Interprets a small line-oriented script that drives power, load and scope
//! tools, asserts measurements against tolerances and reports per test case.

pub mod cli;
pub mod commands;
pub mod common;
pub mod report;
pub mod runner;
pub mod script;
pub mod session;
pub mod tools;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use script::{Command, Script};
