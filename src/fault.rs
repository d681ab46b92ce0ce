//! Fault taxonomy for test execution.
//!
//! Every fault a test can produce is one of the five modeled kinds below.
//! Faults are always caught at the unit boundary; the runner records them on
//! the unit's result and continues with the rest of the run.

use crate::assertion::AssertionFailure;
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Kind-only projection of [`TestFault`], used by throw assertions and mock
/// fault configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    AssertionFailed,
    UnconfiguredInvocation,
    FixtureFault,
    Timeout,
    UncaughtFault,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::AssertionFailed => "AssertionFailed",
            FaultKind::UnconfiguredInvocation => "UnconfiguredInvocation",
            FaultKind::FixtureFault => "FixtureFault",
            FaultKind::Timeout => "Timeout",
            FaultKind::UncaughtFault => "UncaughtFault",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FixturePhase {
    SetUp,
    TearDown,
}

impl fmt::Display for FixturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixturePhase::SetUp => f.write_str("set-up"),
            FixturePhase::TearDown => f.write_str("tear-down"),
        }
    }
}

/// A mock received a call no expectation matched while in strict mode.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("unconfigured invocation of {capability}.{member}({})", render_args(.args))]
pub struct UnconfiguredInvocation {
    pub capability: String,
    pub member: String,
    pub args: Vec<Value>,
}

fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum TestFault {
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
    #[error(transparent)]
    Unconfigured(#[from] UnconfiguredInvocation),
    #[error("fixture {phase} failed: {message}")]
    Fixture {
        phase: FixturePhase,
        message: String,
    },
    #[error("exceeded deadline of {limit_ms} ms")]
    Timeout { limit_ms: u64 },
    #[error("uncaught fault: {message}")]
    Uncaught { message: String },
}

impl TestFault {
    pub fn kind(&self) -> FaultKind {
        match self {
            TestFault::Assertion(_) => FaultKind::AssertionFailed,
            TestFault::Unconfigured(_) => FaultKind::UnconfiguredInvocation,
            TestFault::Fixture { .. } => FaultKind::FixtureFault,
            TestFault::Timeout { .. } => FaultKind::Timeout,
            TestFault::Uncaught { .. } => FaultKind::UncaughtFault,
        }
    }

    pub fn uncaught(message: impl Into<String>) -> Self {
        TestFault::Uncaught {
            message: message.into(),
        }
    }
}
