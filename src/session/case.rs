//! Test case tracking
//!
//! Exactly one case is open at a time. Opening a new one or finishing the
//! run moves the open case into the finalized list; because the open case is
//! held in an `Option` and taken on finalization, it can never be appended
//! twice.

use serde::Serialize;

/// Identifier shown for failures that happen before the first TEST line
pub const NO_CASE_ID: &str = "N/A";

/// Outcome of a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One titled unit of the run
#[derive(Debug, Clone, Serialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub result: Verdict,
    /// Expected range or difference bound, one entry per assertion
    pub expected: Vec<String>,
    /// Measured value, parallel to `expected`
    pub actual: Vec<String>,
    pub note: String,
}

impl TestCase {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            result: Verdict::Pass,
            expected: Vec::new(),
            actual: Vec::new(),
            note: String::new(),
        }
    }

    /// Append an expected/actual report row
    pub fn record(&mut self, expected: String, actual: String) {
        self.expected.push(expected);
        self.actual.push(actual);
    }

    /// Mark the case failed and note why
    ///
    /// A message already present in the note is not repeated.
    pub fn fail(&mut self, message: &str) {
        self.result = Verdict::Fail;
        if !self.note.contains(message) {
            self.note.push_str(message);
            self.note.push_str("; ");
        }
    }

    /// Append a display link (e.g. a screenshot) to the note
    pub fn attach(&mut self, link: &str) {
        self.note.push_str(link);
        self.note.push(' ');
    }

    pub fn passed(&self) -> bool {
        self.result == Verdict::Pass
    }

    /// `id (title)` label used in failure summaries
    pub fn label(&self) -> String {
        format!("{} ({})", self.id, self.title)
    }
}

/// Holds the open case and everything finalized so far
#[derive(Debug, Default)]
pub struct CaseTracker {
    open: Option<TestCase>,
    finalized: Vec<TestCase>,
    /// `id (title)` of every case that recorded a failure, in order
    failures: Vec<String>,
}

impl CaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalize the open case, if any, and open a new one
    pub fn open(&mut self, id: &str, title: &str) {
        self.finalize();
        self.open = Some(TestCase::new(id, title));
    }

    /// Move the open case into the finalized list
    ///
    /// Calling this with no open case does nothing.
    pub fn finalize(&mut self) {
        if let Some(case) = self.open.take() {
            self.finalized.push(case);
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut TestCase> {
        self.open.as_mut()
    }

    /// Id of the open case, or `N/A`
    pub fn current_id(&self) -> &str {
        self.open.as_ref().map(|c| c.id.as_str()).unwrap_or(NO_CASE_ID)
    }

    /// Attribute a failure to the open case
    ///
    /// Failures outside any case still count toward the run's failure
    /// summary under the `N/A` id.
    pub fn record_failure(&mut self, message: &str) {
        let label = match self.open.as_mut() {
            Some(case) => {
                case.fail(message);
                case.label()
            }
            None => format!("{} ()", NO_CASE_ID),
        };
        if !self.failures.contains(&label) {
            self.failures.push(label);
        }
    }

    /// Append a report row to the open case
    pub fn record(&mut self, expected: String, actual: String) {
        if let Some(case) = self.open.as_mut() {
            case.record(expected, actual);
        }
    }

    pub fn finalized(&self) -> &[TestCase] {
        &self.finalized
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
