extern crate self as derivon;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;

pub use api::{DEFAULT_MAX_DEPTH, Engine, Options, PassSummary, Resolution, SearchDetails};
pub use engine::{Deferred, TraceMask};
pub use error::{BuildError, HandleUnset, ResolveError};

// --- Shapes -----------------------------------------------------------------

/// Structural descriptor for the shape of a value to build.
///
/// A shape is either **monomorphic** (fully determined, usable as a goal and
/// as a memoization key) or **polymorphic** (contains at least one
/// [`Shape::Param`], legal only inside rule signatures before
/// specialization). Two shapes are equal iff they are structurally equal;
/// equality and hashing never consider identity.
///
/// The [`Shape::Deferred`] constructor is the proxy-wrapped form of its inner
/// shape: a rule whose consequent is `Deferred(t)` declares that `t` may
/// participate in cyclic construction (see `src/engine/cycle.rs`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    /// A bare shape with no arguments, e.g. `int`.
    Atom(&'static str),
    /// A head symbol applied to argument shapes, e.g. `list[int]`.
    Apply { head: &'static str, args: Vec<Shape> },
    /// An open parameter, e.g. `?T`. Only legal inside rule signatures.
    Param(&'static str),
    /// The deferred-handle wrapper of the inner shape.
    Deferred(Box<Shape>),
}

impl Shape {
    pub fn atom(name: &'static str) -> Self {
        Shape::Atom(name)
    }

    pub fn apply(head: &'static str, args: Vec<Shape>) -> Self {
        Shape::Apply { head, args }
    }

    pub fn param(name: &'static str) -> Self {
        Shape::Param(name)
    }

    pub fn deferred(inner: Shape) -> Self {
        Shape::Deferred(Box::new(inner))
    }

    /// True if the shape contains no open parameters.
    ///
    /// Goals and memo keys must be monomorphic; antecedents become
    /// monomorphic through specialization before they are resolved.
    pub fn is_monomorphic(&self) -> bool {
        match self {
            Shape::Atom(_) => true,
            Shape::Param(_) => false,
            Shape::Apply { args, .. } => args.iter().all(Shape::is_monomorphic),
            Shape::Deferred(inner) => inner.is_monomorphic(),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Atom(name) => f.write_str(name),
            Shape::Param(name) => write!(f, "?{name}"),
            Shape::Deferred(inner) => write!(f, "deferred[{inner}]"),
            Shape::Apply { head, args } => {
                write!(f, "{head}[")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// --- Values -----------------------------------------------------------------

/// An opaque built value. The engine never inspects values; rules downcast.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value for use as a rule result or antecedent.
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
    Arc::new(v)
}

/// Borrow antecedent `index` from a build closure's arguments as `T`.
///
/// Fails with a [`BuildError`] when the position is missing or holds a value
/// of a different concrete type, so a malformed rule set surfaces a
/// reportable error instead of a panic.
pub fn expect_arg<'a, T: Any>(args: &'a [Value], index: usize) -> Result<&'a T, BuildError> {
    args.get(index).and_then(|v| v.downcast_ref::<T>()).ok_or_else(|| {
        BuildError::new(format!("antecedent {index} is missing or has an unexpected type"))
    })
}

// --- Rules ------------------------------------------------------------------

/// Build callback of a rule: receives the resolved antecedent values in
/// declaration order and constructs the consequent value.
pub type Production = Box<dyn Fn(&[Value]) -> Result<Derived, BuildError> + Send + Sync>;

/// A derivation rule: a name, a consequent [`Shape`], an ordered list of
/// antecedent [`Shape`]s, and a `build` function that receives the resolved
/// antecedent values and constructs the consequent value.
///
/// A rule with no antecedents is a fact. `build` must be a pure function of
/// its arguments; the engine relies on no side effects and may invoke it in
/// candidate attempts that are later discarded.
pub struct Rule {
    pub name: &'static str,
    pub consequent: Shape,
    pub antecedents: Vec<Shape>,
    pub build: Production,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("consequent", &self.consequent)
            .field("antecedents", &self.antecedents)
            .field("build", &"<function>")
            .finish()
    }
}

/// Result of a rule's build: the constructed value, optionally paired with
/// auxiliary rules carried by that value.
///
/// Carried rules become visible to the remaining antecedents of the
/// candidate frame that resolved this value, and are removed again when that
/// frame exits (scoped rule injection; see `src/engine/solver.rs`).
pub struct Derived {
    pub value: Value,
    pub rules: Vec<Rule>,
}

impl Derived {
    /// A plain result with no carried rules.
    pub fn of(value: Value) -> Self {
        Derived { value, rules: Vec::new() }
    }

    /// A result carrying auxiliary rules unpacked from the value's payload.
    pub fn carrying(value: Value, rules: Vec<Rule>) -> Self {
        Derived { value, rules }
    }
}

impl fmt::Debug for Derived {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived").field("value", &"<value>").field("rules", &self.rules).finish()
    }
}

// Trait to convert build results into `Derived` (used by the `rule!` macro).
pub trait IntoDerived {
    fn into_derived(self) -> Derived;
}

impl IntoDerived for Derived {
    fn into_derived(self) -> Derived {
        self
    }
}

impl IntoDerived for Value {
    fn into_derived(self) -> Derived {
        Derived::of(self)
    }
}
