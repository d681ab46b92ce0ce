//! Centralized timeout policies for test execution.
//!
//! Keeping these values in one place makes it clear which parts of the
//! runner share behaviour and gives us a single knob to turn if we need to
//! tighten or relax limits.

use std::time::Duration;

/// Maximum time one test unit (set-up, body, tear-down) may run by default.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Grace period granted to a tear-down attempted after a unit timed out.
pub const TEARDOWN_GRACE: Duration = Duration::from_secs(5);
