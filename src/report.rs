//! Run results and aggregation.
//!
//! A [`TestResult`] is created once per executed unit and never mutated
//! afterwards. The [`RunSummary`] is computed from the results on demand,
//! never stored alongside them. Rendering beyond the JSON document persisted
//! by [`JsonReportSink`] is a collaborator's concern.

use crate::assertion::AssertionFailure;
use crate::fault::TestFault;
use crate::unit::{TestStatus, UnitName};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: UnitName,
    pub status: TestStatus,
    pub elapsed: Duration,
    /// Assertion failures in the order they were signalled. Fail-fast means
    /// at most one comes from the body itself.
    pub failures: Vec<AssertionFailure>,
    /// Primary non-assertion fault (uncaught, fixture, timeout, mock).
    pub fault: Option<TestFault>,
    /// Tear-down fault preserved alongside the primary failure.
    pub teardown_fault: Option<TestFault>,
    pub assertions_evaluated: u32,
}

impl TestResult {
    pub fn is_failure(&self) -> bool {
        self.status == TestStatus::Failed
    }

    /// First failure or fault, rendered for summaries.
    pub fn failure_detail(&self) -> Option<String> {
        if let Some(failure) = self.failures.first() {
            return Some(failure.to_string());
        }
        if let Some(fault) = &self.fault {
            return Some(fault.to_string());
        }
        self.teardown_fault.as_ref().map(ToString::to_string)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub results: Vec<TestResult>,
    /// Wall-clock time for the whole run.
    pub elapsed: Duration,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_results(&self.results, self.elapsed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub inconclusive: usize,
    pub elapsed: Duration,
    pub failures: Vec<FailureDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureDetail {
    pub unit: String,
    pub detail: String,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult], elapsed: Duration) -> Self {
        let mut passed = 0;
        let mut failed = 0;
        let mut inconclusive = 0;
        let mut failures = Vec::new();
        for result in results {
            match result.status {
                TestStatus::Passed => passed += 1,
                TestStatus::Failed => {
                    failed += 1;
                    failures.push(FailureDetail {
                        unit: result.name.fully_qualified(),
                        detail: result
                            .failure_detail()
                            .unwrap_or_else(|| "failed without recorded detail".to_string()),
                    });
                }
                TestStatus::Inconclusive => inconclusive += 1,
                TestStatus::Pending | TestStatus::Running => {
                    debug_assert!(false, "non-terminal status in results");
                }
            }
        }
        Self {
            total: results.len(),
            passed,
            failed,
            inconclusive,
            elapsed,
            failures,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.inconclusive == 0
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Consumer of a finished run. Format and destination are external to the
/// engine.
pub trait ReportSink {
    fn consume(&mut self, report: &RunReport) -> Result<(), ReportError>;
}

/// Persists the results and summary as a pretty-printed JSON document.
pub struct JsonReportSink {
    path: PathBuf,
}

#[derive(Serialize)]
struct JsonRunDocument<'a> {
    summary: RunSummary,
    results: &'a [TestResult],
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonReportSink {
    fn consume(&mut self, report: &RunReport) -> Result<(), ReportError> {
        let document = JsonRunDocument {
            summary: report.summary(),
            results: &report.results,
        };
        let payload = serde_json::to_vec_pretty(&document)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&self.path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: TestStatus) -> TestResult {
        TestResult {
            name: UnitName::new("group", name),
            status,
            elapsed: Duration::from_millis(2),
            failures: Vec::new(),
            fault: None,
            teardown_fault: None,
            assertions_evaluated: 1,
        }
    }

    #[test]
    fn summary_counts_each_terminal_status() {
        let results = vec![
            result("a", TestStatus::Passed),
            result("b", TestStatus::Failed),
            result("c", TestStatus::Inconclusive),
            result("d", TestStatus::Passed),
        ];
        let summary = RunSummary::from_results(&results, Duration::from_millis(10));
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inconclusive, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].unit, "group::b");
        assert!(!summary.all_passed());
    }

    #[test]
    fn failure_detail_prefers_assertion_failures() {
        let mut res = result("a", TestStatus::Failed);
        res.fault = Some(TestFault::uncaught("secondary"));
        res.failures.push(AssertionFailure::new("primary"));
        assert!(res.failure_detail().unwrap().contains("primary"));
    }
}
