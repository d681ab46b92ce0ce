//! Mock engine: substitute implementations of capability interfaces.
//!
//! A [`Mock`] implements every member of a [`CapabilitySpec`] and nothing
//! else; it never forwards to a real implementation. Expectations resolve in
//! registration order (the first full match wins, so a later exact matcher
//! does not shadow an earlier broad one). All invocations land in an
//! append-only log behind a single-writer lock; verification recounts from
//! that log rather than trusting cached counters, so counts cannot drift
//! when calls land outside any configured matcher.

use crate::assertion::{AssertionFailure, SourceLocation};
use crate::context::TestContext;
use crate::fault::{FaultKind, FixturePhase, TestFault, UnconfiguredInvocation};
use crate::value::{Value, ValueKind};
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSpec {
    pub name: String,
    pub arity: usize,
    pub returns: ValueKind,
}

/// Abstract interface description: member names, argument arities and return
/// kinds. Supplied by the calling code, never derived from concrete types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySpec {
    name: String,
    members: Vec<MemberSpec>,
}

impl CapabilitySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_member(
        mut self,
        name: impl Into<String>,
        arity: usize,
        returns: ValueKind,
    ) -> Self {
        self.members.push(MemberSpec {
            name: name.into(),
            arity,
            returns,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&MemberSpec> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Whether unmatched invocations fault or return defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgMatcher {
    /// Matches any value in this position.
    Any,
    /// Matches a structurally equal value of the same kind.
    Exact(Value),
}

impl ArgMatcher {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ArgMatcher::Any => true,
            ArgMatcher::Exact(expected) => {
                expected.structural_eq(value).unwrap_or(false)
            }
        }
    }
}

/// Member name plus per-position argument matchers, evaluated left to right.
/// Positions beyond the listed matchers match any value.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberMatcher {
    member: String,
    args: Vec<ArgMatcher>,
}

impl MemberMatcher {
    /// Matches every invocation of the member, regardless of arguments.
    pub fn of(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, matcher: ArgMatcher) -> Self {
        self.args.push(matcher);
        self
    }

    pub fn with_exact(self, value: impl Into<Value>) -> Self {
        self.with_arg(ArgMatcher::Exact(value.into()))
    }

    pub fn with_any(self) -> Self {
        self.with_arg(ArgMatcher::Any)
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    fn matches(&self, member: &str, args: &[Value]) -> bool {
        if self.member != member {
            return false;
        }
        self.args
            .iter()
            .zip(args)
            .all(|(matcher, value)| matcher.matches(value))
    }
}

/// One logged call: member, arguments, and when it happened. Appended in
/// call order; the sequence number is the log's append index.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub member: String,
    pub args: Vec<Value>,
    pub sequence: u64,
    pub recorded_at: Instant,
}

#[derive(Debug)]
enum MockBehavior {
    Returns(Value),
    Raises(FaultKind),
}

/// A configured response rule. The hit counter is a cache; the invocation
/// log stays the source of truth and the counter is always recomputable
/// from it.
#[derive(Debug)]
struct Expectation {
    matcher: MemberMatcher,
    behavior: MockBehavior,
    hits: AtomicU64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MockError {
    #[error("capability {capability} declares member {member} twice")]
    DuplicateMember { capability: String, member: String },
    #[error("capability {capability} has no member {member}")]
    UnknownMember { capability: String, member: String },
    #[error("member {capability}.{member} takes {expected} argument(s), matcher lists {given}")]
    ArityMismatch {
        capability: String,
        member: String,
        expected: usize,
        given: usize,
    },
    #[error("member {capability}.{member} returns {expected}, configured value is {given}")]
    ReturnKindMismatch {
        capability: String,
        member: String,
        expected: ValueKind,
        given: ValueKind,
    },
}

#[derive(Debug)]
pub struct Mock {
    spec: CapabilitySpec,
    mode: MockMode,
    expectations: Vec<Expectation>,
    log: Mutex<Vec<InvocationRecord>>,
}

impl Mock {
    pub fn new(spec: CapabilitySpec, mode: MockMode) -> Result<Self, MockError> {
        for (idx, member) in spec.members.iter().enumerate() {
            if spec.members[..idx].iter().any(|m| m.name == member.name) {
                return Err(MockError::DuplicateMember {
                    capability: spec.name.clone(),
                    member: member.name.clone(),
                });
            }
        }
        Ok(Self {
            spec,
            mode,
            expectations: Vec::new(),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn strict(spec: CapabilitySpec) -> Result<Self, MockError> {
        Self::new(spec, MockMode::Strict)
    }

    pub fn lenient(spec: CapabilitySpec) -> Result<Self, MockError> {
        Self::new(spec, MockMode::Lenient)
    }

    pub fn capability(&self) -> &CapabilitySpec {
        &self.spec
    }

    pub fn mode(&self) -> MockMode {
        self.mode
    }

    /// Starts configuring behavior for invocations the matcher covers.
    /// Validates the member and the matcher arity up front.
    pub fn when(&mut self, matcher: MemberMatcher) -> Result<ExpectationBuilder<'_>, MockError> {
        let member = self.member_spec(&matcher.member)?;
        if matcher.args.len() > member.arity {
            return Err(MockError::ArityMismatch {
                capability: self.spec.name.clone(),
                member: matcher.member.clone(),
                expected: member.arity,
                given: matcher.args.len(),
            });
        }
        Ok(ExpectationBuilder {
            mock: self,
            matcher,
        })
    }

    /// Invokes a capability member on the substitute.
    ///
    /// The call is logged before resolution, so strict-mode faults and
    /// lenient defaults are visible to later verification alike.
    pub fn invoke(&self, member: &str, args: Vec<Value>) -> Result<Value, TestFault> {
        let member_spec = match self.member_spec(member) {
            Ok(spec) => spec.clone(),
            Err(err) => return Err(TestFault::uncaught(err.to_string())),
        };
        if args.len() != member_spec.arity {
            return Err(TestFault::uncaught(format!(
                "member {}.{} takes {} argument(s), invoked with {}",
                self.spec.name,
                member,
                member_spec.arity,
                args.len()
            )));
        }

        {
            let mut log = self.log.lock();
            let sequence = log.len() as u64;
            log.push(InvocationRecord {
                member: member.to_string(),
                args: args.clone(),
                sequence,
                recorded_at: Instant::now(),
            });
        }

        for expectation in &self.expectations {
            if expectation.matcher.matches(member, &args) {
                expectation.hits.fetch_add(1, Ordering::Relaxed);
                return match &expectation.behavior {
                    MockBehavior::Returns(value) => Ok(value.clone()),
                    MockBehavior::Raises(kind) => {
                        Err(self.synthesize_fault(*kind, member, args))
                    }
                };
            }
        }

        match self.mode {
            MockMode::Strict => Err(TestFault::from(UnconfiguredInvocation {
                capability: self.spec.name.clone(),
                member: member.to_string(),
                args,
            })),
            MockMode::Lenient => {
                debug!(
                    "mock {}: lenient default for unmatched member {}",
                    self.spec.name, member
                );
                Ok(member_spec.returns.default_value())
            }
        }
    }

    /// Recounts logged invocations matching the matcher and asserts the
    /// count through the assertion engine. Cached expectation counters are
    /// deliberately not consulted.
    #[track_caller]
    pub fn verify(
        &self,
        cx: &mut TestContext,
        matcher: &MemberMatcher,
        expected_count: u64,
    ) -> Result<(), AssertionFailure> {
        let observed = self.count_matching(matcher);
        let message = format!(
            "mock {}.{}: expected {} matching invocation(s), observed {}",
            self.spec.name, matcher.member, expected_count, observed
        );
        cx.assert_equal(expected_count as i64, observed as i64, Some(&message))
    }

    pub fn count_matching(&self, matcher: &MemberMatcher) -> u64 {
        self.log
            .lock()
            .iter()
            .filter(|record| matcher.matches(&record.member, &record.args))
            .count() as u64
    }

    /// Snapshot of the invocation log in append order.
    pub fn invocations(&self) -> Vec<InvocationRecord> {
        self.log.lock().clone()
    }

    /// Cached hit counters in expectation registration order. Exposed so
    /// callers can check the counters against a recount of the log.
    pub fn expectation_hits(&self) -> Vec<u64> {
        self.expectations
            .iter()
            .map(|e| e.hits.load(Ordering::Relaxed))
            .collect()
    }

    fn member_spec(&self, member: &str) -> Result<&MemberSpec, MockError> {
        self.spec.member(member).ok_or_else(|| MockError::UnknownMember {
            capability: self.spec.name.clone(),
            member: member.to_string(),
        })
    }

    fn synthesize_fault(&self, kind: FaultKind, member: &str, args: Vec<Value>) -> TestFault {
        let origin = format!("mock {}.{}", self.spec.name, member);
        match kind {
            FaultKind::AssertionFailed => TestFault::Assertion(
                AssertionFailure {
                    message: format!("{origin}: configured assertion failure"),
                    expected: None,
                    actual: None,
                    location: SourceLocation::from_caller(),
                },
            ),
            FaultKind::UnconfiguredInvocation => TestFault::from(UnconfiguredInvocation {
                capability: self.spec.name.clone(),
                member: member.to_string(),
                args,
            }),
            FaultKind::FixtureFault => TestFault::Fixture {
                phase: FixturePhase::SetUp,
                message: format!("{origin}: configured fixture fault"),
            },
            FaultKind::Timeout => TestFault::Timeout { limit_ms: 0 },
            FaultKind::UncaughtFault => {
                TestFault::uncaught(format!("{origin}: configured fault"))
            }
        }
    }
}

#[derive(Debug)]
pub struct ExpectationBuilder<'a> {
    mock: &'a mut Mock,
    matcher: MemberMatcher,
}

impl ExpectationBuilder<'_> {
    /// Configures the matched invocations to return the value. The value's
    /// kind must agree with the member's declared return kind.
    pub fn returns(self, value: impl Into<Value>) -> Result<(), MockError> {
        let value = value.into();
        let member = self
            .mock
            .member_spec(&self.matcher.member)
            .expect("matcher member validated by when()");
        if value.kind() != member.returns {
            return Err(MockError::ReturnKindMismatch {
                capability: self.mock.spec.name.clone(),
                member: self.matcher.member.clone(),
                expected: member.returns,
                given: value.kind(),
            });
        }
        self.mock.expectations.push(Expectation {
            matcher: self.matcher,
            behavior: MockBehavior::Returns(value),
            hits: AtomicU64::new(0),
        });
        Ok(())
    }

    /// Configures the matched invocations to raise a fault of the kind.
    pub fn raises(self, kind: FaultKind) {
        self.mock.expectations.push(Expectation {
            matcher: self.matcher,
            behavior: MockBehavior::Raises(kind),
            hits: AtomicU64::new(0),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_spec() -> CapabilitySpec {
        CapabilitySpec::new("storage")
            .with_member("fetch", 1, ValueKind::Text)
            .with_member("delete", 1, ValueKind::Bool)
    }

    #[test]
    fn duplicate_members_are_rejected_at_construction() {
        let spec = CapabilitySpec::new("storage")
            .with_member("fetch", 1, ValueKind::Text)
            .with_member("fetch", 2, ValueKind::Text);
        let err = Mock::strict(spec).unwrap_err();
        assert!(matches!(err, MockError::DuplicateMember { .. }));
    }

    #[test]
    fn configured_member_returns_value() {
        let mut mock = Mock::strict(storage_spec()).unwrap();
        mock.when(MemberMatcher::of("fetch").with_exact("k1"))
            .unwrap()
            .returns("v1")
            .unwrap();
        let value = mock.invoke("fetch", vec![Value::Text("k1".into())]).unwrap();
        assert_eq!(value, Value::Text("v1".into()));
    }

    #[test]
    fn registration_order_wins_over_specificity() {
        let mut mock = Mock::strict(storage_spec()).unwrap();
        mock.when(MemberMatcher::of("fetch").with_any())
            .unwrap()
            .returns("broad")
            .unwrap();
        mock.when(MemberMatcher::of("fetch").with_exact("k1"))
            .unwrap()
            .returns("narrow")
            .unwrap();
        let value = mock.invoke("fetch", vec![Value::Text("k1".into())]).unwrap();
        assert_eq!(value, Value::Text("broad".into()));
        assert_eq!(mock.expectation_hits(), vec![1, 0]);
    }

    #[test]
    fn strict_mode_faults_on_unmatched_invocation() {
        let mut mock = Mock::strict(storage_spec()).unwrap();
        mock.when(MemberMatcher::of("fetch").with_exact("k1"))
            .unwrap()
            .returns("v1")
            .unwrap();
        let fault = mock
            .invoke("delete", vec![Value::Text("k1".into())])
            .unwrap_err();
        assert_eq!(fault.kind(), FaultKind::UnconfiguredInvocation);
        // the failed call is still logged
        assert_eq!(mock.invocations().len(), 1);
    }

    #[test]
    fn lenient_mode_returns_member_default() {
        let mock = Mock::lenient(storage_spec()).unwrap();
        let fetched = mock.invoke("fetch", vec![Value::Text("k1".into())]).unwrap();
        assert_eq!(fetched, Value::Text(String::new()));
        let deleted = mock.invoke("delete", vec![Value::Text("k1".into())]).unwrap();
        assert_eq!(deleted, Value::Bool(false));
        assert_eq!(mock.invocations().len(), 2);
    }

    #[test]
    fn unknown_member_is_a_misuse_fault() {
        let mock = Mock::lenient(storage_spec()).unwrap();
        let fault = mock.invoke("shred", vec![]).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::UncaughtFault);
        let fault = mock.invoke("fetch", vec![]).unwrap_err();
        assert!(fault.to_string().contains("takes 1 argument(s)"));
    }

    #[test]
    fn verify_recounts_from_the_log() {
        let mut mock = Mock::lenient(storage_spec()).unwrap();
        mock.when(MemberMatcher::of("fetch").with_exact("k1"))
            .unwrap()
            .returns("v1")
            .unwrap();
        mock.invoke("fetch", vec![Value::Text("k1".into())]).unwrap();
        // lands outside the expectation's matcher but inside the member's log
        mock.invoke("fetch", vec![Value::Text("k2".into())]).unwrap();

        let mut cx = TestContext::new();
        mock.verify(&mut cx, &MemberMatcher::of("fetch"), 2).unwrap();
        mock.verify(&mut cx, &MemberMatcher::of("fetch").with_exact("k1"), 1)
            .unwrap();
        mock.verify(&mut cx, &MemberMatcher::of("delete"), 0).unwrap();
        // cached counter only saw the matched call
        assert_eq!(mock.expectation_hits(), vec![1]);

        let failure = mock
            .verify(&mut cx, &MemberMatcher::of("fetch"), 5)
            .unwrap_err();
        assert!(failure.message.contains("expected 5 matching invocation(s), observed 2"));
    }

    #[test]
    fn cached_hits_never_exceed_log_recount() {
        let mut mock = Mock::lenient(storage_spec()).unwrap();
        let matcher = MemberMatcher::of("fetch").with_exact("k1");
        mock.when(matcher.clone()).unwrap().returns("v1").unwrap();
        for _ in 0..3 {
            mock.invoke("fetch", vec![Value::Text("k1".into())]).unwrap();
        }
        mock.invoke("fetch", vec![Value::Text("other".into())]).unwrap();
        assert_eq!(mock.expectation_hits(), vec![3]);
        assert_eq!(mock.count_matching(&matcher), 3);
    }

    #[test]
    fn raises_produces_the_configured_kind() {
        let mut mock = Mock::strict(storage_spec()).unwrap();
        mock.when(MemberMatcher::of("fetch"))
            .unwrap()
            .raises(FaultKind::UncaughtFault);
        let fault = mock.invoke("fetch", vec![Value::Text("k1".into())]).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::UncaughtFault);
        assert!(fault.to_string().contains("mock storage.fetch"));
    }

    #[test]
    fn return_kind_is_validated_at_configuration() {
        let mut mock = Mock::strict(storage_spec()).unwrap();
        let err = mock
            .when(MemberMatcher::of("fetch"))
            .unwrap()
            .returns(7)
            .unwrap_err();
        assert!(matches!(err, MockError::ReturnKindMismatch { .. }));
    }

    #[test]
    fn matcher_arity_is_validated_at_configuration() {
        let mut mock = Mock::strict(storage_spec()).unwrap();
        let err = mock
            .when(MemberMatcher::of("fetch").with_any().with_any())
            .unwrap_err();
        assert!(matches!(err, MockError::ArityMismatch { .. }));
    }
}
