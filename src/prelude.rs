//! Convenience re-exports for downstream crates. Pull this module in via
//! `use veritor::prelude::*;` when you want the most common types without
//! spelunking the module tree.

pub use crate::assertion::AssertionFailure;
pub use crate::config::RunConfig;
pub use crate::context::TestContext;
pub use crate::discovery::{discover, DiscoverySource, Suite};
pub use crate::fault::{FaultKind, TestFault};
pub use crate::fixture::FixtureScope;
pub use crate::mock::{ArgMatcher, CapabilitySpec, MemberMatcher, Mock, MockMode};
pub use crate::report::{ReportSink, RunReport, RunSummary, TestResult};
pub use crate::runner::Runner;
pub use crate::unit::{TestStatus, TestUnit, UnitName};
pub use crate::util::error::{HarnessError, Result as HarnessResult};
pub use crate::value::{Value, ValueKind};
