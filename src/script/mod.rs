//! Test sequence scripts
//!
//! A script is UTF-8 text with one command per line. Blank lines and lines
//! starting with `#` are skipped.

pub mod command;
pub mod value;

use std::path::Path;

pub use command::Command;

use crate::common::{Error, Result};

/// Marker that starts a comment line
pub const COMMENT_MARKER: char = '#';

/// A script line that carries a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number in the source file
    pub number: usize,
    /// Trimmed line text
    pub text: String,
}

/// A loaded script, with blank and comment lines removed
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<ScriptLine>,
}

impl Script {
    /// Load a script file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::ScriptRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Ok(Self::from_source(&content))
    }

    /// Build a script from source text
    pub fn from_source(source: &str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                let text = line.trim();
                if text.is_empty() || text.starts_with(COMMENT_MARKER) {
                    None
                } else {
                    Some(ScriptLine {
                        number: i + 1,
                        text: text.to_string(),
                    })
                }
            })
            .collect();
        Self { lines }
    }

    /// Parse every line without running anything
    ///
    /// Returns the line number and error of each line that fails to parse.
    pub fn check(&self) -> Vec<(usize, Error)> {
        self.lines
            .iter()
            .filter_map(|line| Command::parse(&line.text).err().map(|e| (line.number, e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let script = Script::from_source(
            "# header\n\nDEF_VAR $i\n   \n  # indented comment\nTEST T1 \"t\"\n",
        );
        let numbers: Vec<usize> = script.lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![3, 6]);
        assert_eq!(script.lines[1].text, "TEST T1 \"t\"");
    }

    #[test]
    fn test_check_reports_line_numbers() {
        let script = Script::from_source("TEST T1 ok\nBOGUS\nREAD CH1 AS $x\nPOWER_OFF\n");
        let errors = script.check();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, 2);
        assert!(matches!(errors[0].1, Error::UnknownCommand(_)));
        assert_eq!(errors[1].0, 3);
        assert!(matches!(errors[1].1, Error::ExpectedTo(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Script::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, Error::ScriptRead { .. }));
        assert!(err.is_fatal());
    }
}
