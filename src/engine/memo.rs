//! Goal-indexed memoization.
//!
//! The memo store maps a monomorphic [`Shape`] to the value already built
//! for it, guaranteeing at most one successful build per (engine, shape)
//! for the lifetime of the engine. An entry, once populated, is never
//! overwritten: the first success wins and every later resolution of the
//! same shape observes the same physical value.
//!
//! ## The per-shape gate
//!
//! Each shape owns a `Mutex<Option<Built>>` slot. The solver locks the slot
//! *before* inspecting it and keeps the guard across the build, so a
//! concurrent resolution of the same shape blocks until the first build
//! completes and then observes the cached value. This is a correctness
//! requirement (same physical result for every caller), not an
//! optimization.
//!
//! Recursive resolution of a shape already in flight on the *same* thread
//! never reaches this module: the solver's ancestor check runs first and
//! routes through the cycle mechanism instead, so the gate cannot
//! self-deadlock.
//!
//! Failures are never recorded. A failed build leaves the slot empty, and a
//! later attempt (possibly under different scoped rules) retries from
//! scratch.

use crate::{Rule, Shape, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A successfully built value together with the auxiliary rules its build
/// carried. Keeping the rules in the entry means a memo hit re-exposes the
/// same scoped payload the original build did.
#[derive(Clone)]
pub(crate) struct Built {
    pub(crate) value: Value,
    pub(crate) rules: Vec<Arc<Rule>>,
    /// True when the committed rule came from the scoped stack. Such builds
    /// are only valid under the injecting frame and are never memoized.
    pub(crate) scoped: bool,
}

impl fmt::Debug for Built {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Built")
            .field("value", &"<value>")
            .field("rules", &self.rules.len())
            .field("scoped", &self.scoped)
            .finish()
    }
}

pub(crate) type Slot = Arc<Mutex<Option<Built>>>;

/// Shape-keyed permanent cache of built values.
#[derive(Debug, Default)]
pub(crate) struct MemoStore {
    slots: Mutex<HashMap<Shape, Slot>>,
}

impl MemoStore {
    /// Fetch (or create) the slot for `goal`. The outer map lock is held
    /// only for the lookup; the returned slot carries its own gate.
    pub(crate) fn slot(&self, goal: &Shape) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(goal.clone()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;

    #[test]
    fn slots_are_shared_per_shape() {
        let store = MemoStore::default();
        let a = store.slot(&shape!(thing));
        let b = store.slot(&shape!(thing));
        assert!(Arc::ptr_eq(&a, &b));

        let other = store.slot(&shape!(other));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn entries_survive_across_slot_fetches() {
        let store = MemoStore::default();

        {
            let slot = store.slot(&shape!(thing));
            let mut entry = slot.lock().unwrap();
            assert!(entry.is_none());
            *entry = Some(Built { value: value(7_u32), rules: vec![], scoped: false });
        }

        let slot = store.slot(&shape!(thing));
        let entry = slot.lock().unwrap();
        let built = entry.as_ref().expect("entry recorded");
        assert_eq!(built.value.downcast_ref::<u32>(), Some(&7));
    }
}
