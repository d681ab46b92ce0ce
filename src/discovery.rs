//! Test discovery.
//!
//! The runner does not parse source. A [`DiscoverySource`] collaborator
//! supplies already-resolved candidates (callable plus group/case names and
//! optional fixture bindings); [`discover`] turns them into pending
//! [`TestUnit`]s and enforces fully-qualified-name uniqueness. [`Suite`] is
//! the in-memory source for building suites by hand.

use crate::context::TestContext;
use crate::fault::TestFault;
use crate::fixture::{Fixture, FixtureScope};
use crate::unit::{FixtureFn, TestFn, TestUnit, UnitName};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone)]
pub struct CandidateCase {
    pub group: String,
    pub case: String,
    pub body: TestFn,
    pub set_up: Option<FixtureFn>,
    pub tear_down: Option<FixtureFn>,
    pub scope: FixtureScope,
}

pub trait DiscoverySource {
    fn candidates(&self) -> Vec<CandidateCase>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("no test cases discovered")]
    NoCases,
    #[error("duplicate fully-qualified test name {0}")]
    DuplicateName(String),
}

/// Resolves a source's candidates into pending test units, in source order.
pub fn discover(source: &dyn DiscoverySource) -> Result<Vec<TestUnit>, DiscoveryError> {
    let candidates = source.candidates();
    if candidates.is_empty() {
        return Err(DiscoveryError::NoCases);
    }
    let mut seen = BTreeSet::new();
    let mut units = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let name = UnitName::new(candidate.group, candidate.case);
        if !seen.insert(name.fully_qualified()) {
            return Err(DiscoveryError::DuplicateName(name.fully_qualified()));
        }
        let fixture = match candidate.scope {
            FixtureScope::PerUnit => Fixture::per_unit(candidate.set_up, candidate.tear_down),
            FixtureScope::SharedGroup => Fixture::shared(candidate.set_up, candidate.tear_down),
        };
        units.push(TestUnit::new(name, candidate.body, fixture));
    }
    Ok(units)
}

/// Hand-built discovery source.
///
/// Cases are registered with `with_*` builders. A group-level fixture marks
/// every case of that group as sharing one set-up/tear-down pair; sharing is
/// opt-in per group and never inferred.
#[derive(Default)]
pub struct Suite {
    cases: Vec<CandidateCase>,
    group_fixtures: BTreeMap<String, (Option<FixtureFn>, Option<FixtureFn>)>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case<B>(mut self, group: impl Into<String>, case: impl Into<String>, body: B) -> Self
    where
        B: Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync + 'static,
    {
        self.cases.push(CandidateCase {
            group: group.into(),
            case: case.into(),
            body: Arc::new(body),
            set_up: None,
            tear_down: None,
            scope: FixtureScope::PerUnit,
        });
        self
    }

    pub fn with_fixture_case<S, T, B>(
        mut self,
        group: impl Into<String>,
        case: impl Into<String>,
        set_up: S,
        tear_down: T,
        body: B,
    ) -> Self
    where
        S: Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync + 'static,
        T: Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync + 'static,
        B: Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync + 'static,
    {
        self.cases.push(CandidateCase {
            group: group.into(),
            case: case.into(),
            body: Arc::new(body),
            set_up: Some(Arc::new(set_up)),
            tear_down: Some(Arc::new(tear_down)),
            scope: FixtureScope::PerUnit,
        });
        self
    }

    /// Registers a shared set-up/tear-down pair for a group. They run once
    /// per group, not once per case.
    pub fn with_group_fixture<S, T>(
        mut self,
        group: impl Into<String>,
        set_up: S,
        tear_down: T,
    ) -> Self
    where
        S: Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync + 'static,
        T: Fn(&mut TestContext) -> Result<(), TestFault> + Send + Sync + 'static,
    {
        self.group_fixtures.insert(
            group.into(),
            (Some(Arc::new(set_up)), Some(Arc::new(tear_down))),
        );
        self
    }

    pub fn with_candidate(mut self, candidate: CandidateCase) -> Self {
        self.cases.push(candidate);
        self
    }
}

impl DiscoverySource for Suite {
    fn candidates(&self) -> Vec<CandidateCase> {
        self.cases
            .iter()
            .map(|case| {
                let mut candidate = case.clone();
                if candidate.scope == FixtureScope::PerUnit && candidate.set_up.is_none() {
                    if let Some((set_up, tear_down)) = self.group_fixtures.get(&candidate.group) {
                        candidate.set_up = set_up.clone();
                        candidate.tear_down = tear_down.clone();
                        candidate.scope = FixtureScope::SharedGroup;
                    }
                }
                candidate
            })
            .collect()
    }
}
