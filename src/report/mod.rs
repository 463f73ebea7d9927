//! Run report generation
//!
//! A report is built once, when the run ends, from the finalized test cases.
//! It is written on every exit path, including interrupts and crashes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::common::config::ReportFormat;
use crate::common::{paths, Result};
use crate::session::{TestCase, Verdict};

/// How the run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Reached the end of the script
    Completed,
    /// Operator interrupt
    Interrupted,
    /// Fatal error
    Crashed,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Completed => "completed",
            Termination::Interrupted => "interrupted by operator",
            Termination::Crashed => "aborted by fatal error",
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub termination: Termination,
    pub overall: Verdict,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<TestCase>,
}

impl Report {
    pub fn new(
        started: DateTime<Local>,
        finished: DateTime<Local>,
        termination: Termination,
        cases: Vec<TestCase>,
    ) -> Self {
        let total = cases.len();
        let passed = cases.iter().filter(|c| c.passed()).count();
        let failed = total - passed;
        Self {
            started,
            finished,
            termination,
            overall: if failed == 0 {
                Verdict::Pass
            } else {
                Verdict::Fail
            },
            total,
            passed,
            failed,
            cases,
        }
    }

    /// Timestamp used in the report file name
    pub fn stamp(&self) -> String {
        self.finished.format("%Y%m%d_%H%M%S").to_string()
    }

    /// Run duration as `H:MM:SS.mmm`
    pub fn duration(&self) -> String {
        let millis = (self.finished - self.started).num_milliseconds().max(0);
        let secs = millis / 1000;
        format!(
            "{}:{:02}:{:02}.{:03}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            millis % 1000
        )
    }

    /// Render as Markdown tables
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let overall_icon = match self.overall {
            Verdict::Pass => "✅",
            Verdict::Fail => "🔴",
        };

        out.push_str("# 📄 Automated Test Report\n\n");
        out.push_str(&format!(
            "- **Test time**: `{}`\n",
            self.finished.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "- **Overall result**: {} **{}**\n",
            overall_icon, self.overall
        ));
        out.push_str(&format!("- **Duration**: `{}`\n", self.duration()));
        if self.termination != Termination::Completed {
            out.push_str(&format!("- **Run ended**: {}\n", self.termination.as_str()));
        }
        out.push('\n');

        out.push_str("## 1. 📊 Statistics\n\n");
        out.push_str("| Total | ✅ Passed | 🔴 Failed |\n");
        out.push_str("| :---: | :---: | :---: |\n");
        out.push_str(&format!(
            "| {} | {} | {} |\n\n",
            self.total, self.passed, self.failed
        ));

        out.push_str("## 2. 📝 Details\n\n");
        out.push_str("| ID | Title | Result | Expected | Actual | Note |\n");
        out.push_str("| :--- | :--- | :---: | :--- | :--- | :--- |\n");

        for case in &self.cases {
            let result = match case.result {
                Verdict::Pass => "✅ PASS",
                Verdict::Fail => "🔴 FAIL",
            };
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                escape_cell(&case.id),
                escape_cell(&case.title),
                result,
                join_rows(&case.expected),
                join_rows(&case.actual),
                escape_cell(case.note.trim()),
            ));
        }

        out
    }

    /// Write the report into `dir`, returning the file path
    pub fn write(&self, dir: &Path, format: ReportFormat) -> Result<PathBuf> {
        paths::ensure_dir(dir)?;
        let (extension, content) = match format {
            ReportFormat::Markdown => ("md", self.to_markdown()),
            ReportFormat::Json => ("json", serde_json::to_string_pretty(self)?),
        };
        let path = dir.join(paths::report_file_name(&self.stamp(), extension));
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// One list entry per line inside a table cell
fn join_rows(rows: &[String]) -> String {
    if rows.is_empty() {
        "-".to_string()
    } else {
        rows.iter()
            .map(|r| escape_cell(r))
            .collect::<Vec<_>>()
            .join("<br>")
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
