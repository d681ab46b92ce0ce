//! Fixture lifecycle management.
//!
//! [`run_with_fixture`] drives the set-up / body / tear-down sequence with
//! scoped-acquisition semantics: tear-down runs exactly once after the body,
//! on every exit path. Exactly-once is enforced with an atomic claim token
//! shared with the runner's timeout recovery path, so a tear-down attempted
//! after a body timeout can never race a late completion of the original
//! thread into a second run.

use crate::context::TestContext;
use crate::fault::{FixturePhase, TestFault};
use crate::unit::{FixtureFn, TestFn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fixtures are scoped per unit unless explicitly marked shared across a
/// group. Sharing reintroduces cross-test coupling and is never the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixtureScope {
    #[default]
    PerUnit,
    SharedGroup,
}

#[derive(Clone, Default)]
pub struct Fixture {
    pub set_up: Option<FixtureFn>,
    pub tear_down: Option<FixtureFn>,
    pub scope: FixtureScope,
}

impl Fixture {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn per_unit(set_up: Option<FixtureFn>, tear_down: Option<FixtureFn>) -> Self {
        Self {
            set_up,
            tear_down,
            scope: FixtureScope::PerUnit,
        }
    }

    pub fn shared(set_up: Option<FixtureFn>, tear_down: Option<FixtureFn>) -> Self {
        Self {
            set_up,
            tear_down,
            scope: FixtureScope::SharedGroup,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.scope == FixtureScope::SharedGroup
    }
}

/// Claim token for tear-down. The first claimer runs it; everyone else
/// backs off.
#[derive(Clone, Default)]
pub struct TeardownClaim {
    claimed: Arc<AtomicBool>,
}

impl TeardownClaim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Default)]
pub struct FixtureOutcome {
    /// Set-up fault, already wrapped as a fixture fault. When present the
    /// body never ran.
    pub setup_fault: Option<TestFault>,
    /// `None` iff set-up faulted.
    pub body_result: Option<Result<(), TestFault>>,
    /// Tear-down fault, preserved even when the body also faulted.
    pub teardown_fault: Option<TestFault>,
}

/// Runs set-up, body and tear-down with the lifecycle guarantees above.
///
/// A set-up fault skips the body but still attempts a registered tear-down
/// so paired acquisitions release symmetrically.
pub fn run_with_fixture(
    fixture: &Fixture,
    cx: &mut TestContext,
    body: &TestFn,
    claim: &TeardownClaim,
) -> FixtureOutcome {
    let mut outcome = FixtureOutcome::default();

    if let Some(set_up) = &fixture.set_up {
        if let Err(fault) = call_guarded(set_up, cx) {
            outcome.setup_fault = Some(wrap_fixture_fault(FixturePhase::SetUp, &fault));
        }
    }

    if outcome.setup_fault.is_none() {
        outcome.body_result = Some(call_guarded(body, cx));
    }

    if let Some(tear_down) = &fixture.tear_down {
        if claim.claim() {
            if let Err(fault) = call_guarded(tear_down, cx) {
                outcome.teardown_fault = Some(wrap_fixture_fault(FixturePhase::TearDown, &fault));
            }
        }
    }

    outcome
}

pub(crate) fn wrap_fixture_fault(phase: FixturePhase, fault: &TestFault) -> TestFault {
    TestFault::Fixture {
        phase,
        message: fault.to_string(),
    }
}

/// Invokes a callable, converting a panic into an uncaught fault so nothing
/// escapes the unit boundary.
pub(crate) fn call_guarded(f: &TestFn, cx: &mut TestContext) -> Result<(), TestFault> {
    match catch_unwind(AssertUnwindSafe(|| f(cx))) {
        Ok(result) => result,
        Err(payload) => Err(TestFault::uncaught(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
