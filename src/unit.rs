//! Test units and their execution state machine.

use crate::context::TestContext;
use crate::fault::TestFault;
use crate::fixture::Fixture;
use log::debug;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A test body or fixture callable. `Arc`-wrapped so the runner can hand
/// clones to worker and recovery threads.
pub type TestFn = Arc<dyn Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync>;

/// Same shape as [`TestFn`]; named separately where a set-up or tear-down is
/// meant.
pub type FixtureFn = TestFn;

/// Grouping name plus case name. The fully-qualified form is unique within a
/// run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnitName {
    pub group: String,
    pub case: String,
}

impl UnitName {
    pub fn new(group: impl Into<String>, case: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            case: case.into(),
        }
    }

    pub fn fully_qualified(&self) -> String {
        format!("{}::{}", self.group, self.case)
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.group, self.case)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Inconclusive,
}

impl TestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TestStatus::Passed | TestStatus::Failed | TestStatus::Inconclusive
        )
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Inconclusive => "inconclusive",
        };
        f.write_str(name)
    }
}

/// One discoverable, independently executable test case. Identity is fixed
/// at discovery; only the status field changes, and only the runner changes
/// it.
pub struct TestUnit {
    name: UnitName,
    body: TestFn,
    fixture: Fixture,
    status: TestStatus,
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl TestUnit {
    pub fn new(name: UnitName, body: TestFn, fixture: Fixture) -> Self {
        Self {
            name,
            body,
            fixture,
            status: TestStatus::Pending,
        }
    }

    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn status(&self) -> TestStatus {
        self.status
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    pub(crate) fn body(&self) -> &TestFn {
        &self.body
    }

    /// Legal transitions: pending -> running -> one terminal status.
    pub(crate) fn transition(&mut self, next: TestStatus) {
        let legal = match (self.status, next) {
            (TestStatus::Pending, TestStatus::Running) => true,
            (TestStatus::Running, terminal) => terminal.is_terminal(),
            _ => false,
        };
        debug_assert!(legal, "illegal transition {} -> {next}", self.status);
        debug!("unit {}: {} -> {next}", self.name, self.status);
        self.status = next;
    }

    /// Replaces the fixture; used when a shared group fixture has already
    /// run and the member case must execute its body alone.
    pub(crate) fn strip_fixture(&mut self) {
        self.fixture = Fixture::none();
    }
}
