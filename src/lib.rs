//! Core library entrypoint for the Veritor test execution engine:
//! fixture lifecycle management, mock substitution, and a concurrency-bounded
//! test runner with deterministic reporting.

pub mod assertion;
pub mod config;
pub mod context;
pub mod discovery;
pub mod fault;
pub mod fixture;
pub mod mock;
pub mod prelude;
pub mod report;
pub mod runner;
pub mod telemetry;
pub mod timeouts;
pub mod unit;
pub mod util;
pub mod value;

pub use assertion::{AssertionFailure, SourceLocation};
pub use config::RunConfig;
pub use context::{SlotStore, TestContext};
pub use discovery::{discover, CandidateCase, DiscoveryError, DiscoverySource, Suite};
pub use fault::{FaultKind, FixturePhase, TestFault, UnconfiguredInvocation};
pub use fixture::{run_with_fixture, Fixture, FixtureOutcome, FixtureScope, TeardownClaim};
pub use mock::{
    ArgMatcher, CapabilitySpec, ExpectationBuilder, InvocationRecord, MemberMatcher, MemberSpec,
    Mock, MockError, MockMode,
};
pub use report::{
    FailureDetail, JsonReportSink, ReportError, ReportSink, RunReport, RunSummary, TestResult,
};
pub use runner::Runner;
pub use telemetry::{MetricsRegistry, MetricsSnapshot};
pub use unit::{FixtureFn, TestFn, TestStatus, TestUnit, UnitName};
pub use util::error::HarnessError;
pub use value::{KindMismatch, Value, ValueKind};
