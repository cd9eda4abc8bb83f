//! Deferred handles for cyclic construction.
//!
//! When resolving a shape requires resolving that same shape again as one of
//! its own (transitive) antecedents, recursing would not terminate even
//! though the rules are logically well-founded. The solver instead allocates
//! a two-phase cell for the in-progress shape and asks a *deferred-handle
//! rule* (a rule whose consequent is the [`Shape::Deferred`] wrapping of the
//! shape) to produce a stand-in value from the cell's read side. The
//! stand-in fills the antecedent position that needed the shape; once the
//! original frame finishes constructing the real value, the solver sets the
//! cell before unwinding, closing the cycle.
//!
//! Not every recursive shape is supported automatically: without a
//! registered deferred-handle rule the branch fails with a reportable
//! `CycleUnsupported` error.
//!
//! ## Contract for rule authors
//!
//! A rule that receives a [`Deferred`] must capture it lazily: store the
//! handle (or a closure over it), never an eagerly dereferenced value.
//! [`Deferred::get`] returns [`HandleUnset`] until the cycle closes; a
//! premature read is a usage error in the surrounding construction, not an
//! engine error.
//!
//! Deferred-handle rules declare no antecedents; the solver invokes them
//! with exactly one argument, the handle wrapped as a [`Value`].

use crate::error::HandleUnset;
use crate::{Shape, Value};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Write side of an in-progress shape's cell, held by the solver. `set` is
/// called at most once, before the frame that introduced the cycle unwinds.
pub(crate) type Cell = Arc<OnceCell<Value>>;

/// Two-phase handle standing in for a value still under construction.
///
/// `get` may be captured (inside a closure or a struct field) before the
/// cycle closes, but the value it observes must only be read afterwards.
#[derive(Clone)]
pub struct Deferred {
    shape: Shape,
    cell: Cell,
}

impl Deferred {
    pub(crate) fn new(shape: Shape, cell: Cell) -> Self {
        Deferred { shape, cell }
    }

    /// The shape this handle stands in for.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Read the resolved value. Errors until the engine closes the cycle.
    pub fn get(&self) -> Result<Value, HandleUnset> {
        self.cell.get().cloned().ok_or_else(|| HandleUnset { shape: self.shape.clone() })
    }

    /// True once the cycle has been closed.
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("shape", &self.shape)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value;

    #[test]
    fn reads_fail_until_the_cell_is_set() {
        let cell: Cell = Arc::new(OnceCell::new());
        let handle = Deferred::new(shape!(node), cell.clone());

        assert!(!handle.is_resolved());
        let err = handle.get().unwrap_err();
        assert_eq!(err.shape, shape!(node));

        cell.set(value(11_u8)).ok().expect("first set succeeds");
        assert!(handle.is_resolved());
        let resolved = handle.get().expect("resolved after set");
        assert_eq!(resolved.downcast_ref::<u8>(), Some(&11));
    }

    #[test]
    fn clones_observe_the_same_cell() {
        let cell: Cell = Arc::new(OnceCell::new());
        let handle = Deferred::new(shape!(node), cell.clone());
        let alias = handle.clone();

        cell.set(value("closed")).ok().expect("first set succeeds");
        assert!(alias.is_resolved());
    }
}
