//! Assertion engine.
//!
//! Assertions are methods on [`TestContext`]. Each call increments the
//! context's evaluated counter and either returns `Ok(())` or an
//! [`AssertionFailure`]. Test bodies propagate the failure with `?`, which
//! halts the remaining statements of that body; the runner records the
//! failed result and continues with the next unit.

use crate::context::TestContext;
use crate::fault::{FaultKind, TestFault};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::panic::Location;
use thiserror::Error;

/// Call-site context captured when an assertion fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[track_caller]
    pub fn from_caller() -> Self {
        let caller = Location::caller();
        Self {
            file: caller.file(),
            line: caller.line(),
            column: caller.column(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("assertion failed at {location}: {message}")]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub location: SourceLocation,
}

impl AssertionFailure {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
            location: SourceLocation::from_caller(),
        }
    }

    pub fn with_values(mut self, expected: Value, actual: Value) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }
}

fn described(base: String, message: Option<&str>) -> String {
    match message {
        Some(extra) => format!("{extra}: {base}"),
        None => base,
    }
}

impl TestContext {
    /// Holds iff `expected` and `actual` are structurally equal. Comparing
    /// values of incompatible kinds is itself a failure.
    #[track_caller]
    pub fn assert_equal(
        &mut self,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
        message: Option<&str>,
    ) -> Result<(), AssertionFailure> {
        self.note_assertion();
        let expected = expected.into();
        let actual = actual.into();
        match expected.structural_eq(&actual) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AssertionFailure::new(described(
                format!("expected {expected}, actual {actual}"),
                message,
            ))
            .with_values(expected, actual)),
            Err(mismatch) => Err(AssertionFailure::new(described(
                mismatch.to_string(),
                message,
            ))
            .with_values(expected, actual)),
        }
    }

    /// Holds iff the two values are structurally unequal. A kind mismatch is
    /// a failure here too, not a silent pass.
    #[track_caller]
    pub fn assert_not_equal(
        &mut self,
        left: impl Into<Value>,
        right: impl Into<Value>,
        message: Option<&str>,
    ) -> Result<(), AssertionFailure> {
        self.note_assertion();
        let left = left.into();
        let right = right.into();
        match left.structural_eq(&right) {
            Ok(false) => Ok(()),
            Ok(true) => Err(AssertionFailure::new(described(
                format!("values unexpectedly equal: {left}"),
                message,
            ))
            .with_values(left, right)),
            Err(mismatch) => Err(AssertionFailure::new(described(
                mismatch.to_string(),
                message,
            ))
            .with_values(left, right)),
        }
    }

    #[track_caller]
    pub fn assert_true(
        &mut self,
        predicate: bool,
        message: Option<&str>,
    ) -> Result<(), AssertionFailure> {
        self.note_assertion();
        if predicate {
            Ok(())
        } else {
            Err(AssertionFailure::new(described(
                "predicate did not hold".to_string(),
                message,
            )))
        }
    }

    /// Holds iff the value is the absent (unit) value.
    #[track_caller]
    pub fn assert_absent(
        &mut self,
        actual: impl Into<Value>,
        message: Option<&str>,
    ) -> Result<(), AssertionFailure> {
        self.note_assertion();
        let actual = actual.into();
        if actual == Value::Unit {
            Ok(())
        } else {
            Err(AssertionFailure::new(described(
                format!("expected absent value, actual {actual}"),
                message,
            ))
            .with_values(Value::Unit, actual))
        }
    }

    /// Holds iff the callable raises a fault of exactly the expected kind.
    /// Any other fault, or no fault at all, is a failure with a message
    /// distinguishing the two cases.
    #[track_caller]
    pub fn assert_throws<F>(
        &mut self,
        expected: FaultKind,
        callable: F,
    ) -> Result<(), AssertionFailure>
    where
        F: FnOnce() -> Result<(), TestFault>,
    {
        self.note_assertion();
        match callable() {
            Err(fault) if fault.kind() == expected => Ok(()),
            Err(fault) => Err(AssertionFailure::new(format!(
                "expected fault {expected}, got fault {} ({fault})",
                fault.kind()
            ))),
            Ok(()) => Err(AssertionFailure::new(format!(
                "expected fault {expected}, no fault raised"
            ))),
        }
    }
}
