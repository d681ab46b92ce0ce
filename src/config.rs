//! Runner configuration.

use crate::timeouts::{DEFAULT_TEST_TIMEOUT, TEARDOWN_GRACE};
use std::time::Duration;

/// Knobs for a run. Defaults are sequential execution with the centralized
/// timeout policy and no global deadline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Upper bound on parallel workers. A limit of 1 is fully sequential.
    pub concurrency_limit: usize,
    /// Per-unit deadline covering set-up, body and tear-down.
    pub test_timeout: Duration,
    /// Extra time granted to a tear-down attempted after a unit timed out.
    pub teardown_grace: Duration,
    /// Deadline for the whole run. Units that cannot start before it are
    /// recorded as failed with a timeout fault.
    pub run_deadline: Option<Duration>,
    /// Seed for a deterministic shuffle of the execution schedule. Reported
    /// order is unaffected.
    pub shuffle_seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 1,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            teardown_grace: TEARDOWN_GRACE,
            run_deadline: None,
            shuffle_seed: None,
        }
    }
}

impl RunConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn with_teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = Some(deadline);
        self
    }

    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }
}
