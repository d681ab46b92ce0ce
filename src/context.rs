//! Per-test execution context.
//!
//! A [`TestContext`] travels through a unit's set-up, body and tear-down. It
//! counts evaluated assertions (the runner flags zero-assertion units as
//! inconclusive), carries unit-local slot storage for handing resources from
//! set-up to body, and exposes group-shared slot storage when the unit runs
//! under a shared fixture. Shared state is always an explicit handle, never
//! ambient globals.

use crate::value::Value;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named slot storage shared across a fixture scope.
#[derive(Debug, Default)]
pub struct SlotStore {
    slots: Mutex<BTreeMap<String, Value>>,
}

impl SlotStore {
    pub fn put(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.slots.lock().insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.slots.lock().get(name).cloned()
    }

    pub fn take(&self, name: &str) -> Option<Value> {
        self.slots.lock().remove(name)
    }
}

pub struct TestContext {
    assertions_evaluated: u32,
    locals: BTreeMap<String, Value>,
    shared: Arc<SlotStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_shared(Arc::new(SlotStore::default()))
    }

    pub fn with_shared(shared: Arc<SlotStore>) -> Self {
        Self {
            assertions_evaluated: 0,
            locals: BTreeMap::new(),
            shared,
        }
    }

    /// Stores a unit-local value, typically a handle acquired in set-up that
    /// the body needs.
    pub fn put_local(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.locals.insert(name.into(), value.into());
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        self.locals.get(name).cloned()
    }

    /// Slot storage shared with the rest of the fixture scope. For per-unit
    /// fixtures this is private to the unit; under a shared group fixture it
    /// is the group's storage.
    pub fn shared(&self) -> &Arc<SlotStore> {
        &self.shared
    }

    pub fn assertions_evaluated(&self) -> u32 {
        self.assertions_evaluated
    }

    pub(crate) fn note_assertion(&mut self) {
        self.assertions_evaluated = self.assertions_evaluated.saturating_add(1);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
