//! Resolution error kinds.
//!
//! Every failure is synchronous and reported to the immediate caller of the
//! driver; there is no partial or degraded result. Failures are never
//! memoized, so a later call for the same goal may retry from scratch (and
//! may succeed if the effective rule set changed via scoped injection).

use crate::Shape;
use thiserror::Error;

/// Failure raised by a rule's build closure.
///
/// A build failure fails the candidate that invoked the rule; the solver
/// moves on to the next candidate at the same level but never resumes the
/// half-built state.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BuildError {
    message: String,
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        BuildError { message: message.into() }
    }
}

/// A deferred handle was read before the engine closed its cycle.
///
/// This is a usage error in the construction surrounding the handle (the
/// capturing rule dereferenced eagerly instead of storing the accessor), not
/// an engine error.
#[derive(Debug, Clone, Error)]
#[error("deferred handle for `{shape}` was read before its cycle closed")]
pub struct HandleUnset {
    pub shape: Shape,
}

/// Terminal failure of a goal resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No rule chain produces the requested shape. Also the spelling for an
    /// exhausted iterative-deepening budget: the engine cannot distinguish
    /// "needs more depth" from "truly impossible" in finite time.
    ///
    /// `deepest` is the longest goal path the search attempted before giving
    /// up, innermost last, kept for diagnosis.
    #[error("no derivation found for `{goal}`")]
    NoDerivation { goal: Shape, deepest: Vec<Shape> },

    /// The goal turned out to be one of its own (transitive) antecedents and
    /// no deferred-handle rule is registered for it. Distinguished from
    /// [`ResolveError::NoDerivation`] for diagnostic clarity only; both are
    /// fatal to the enclosing goal.
    #[error("`{goal}` recurses into itself and no deferred-handle rule is registered for it")]
    CycleUnsupported { goal: Shape },

    /// A rule's build closure failed while constructing `goal` from
    /// already-resolved antecedents.
    #[error("rule `{rule}` failed while building `{goal}`: {source}")]
    Build {
        rule: &'static str,
        goal: Shape,
        #[source]
        source: BuildError,
    },

    /// The requested goal contains open parameters. Goals must be fully
    /// monomorphic; this is rejected before any search runs.
    #[error("goal `{goal}` is polymorphic; goals must be monomorphic")]
    PolymorphicGoal { goal: Shape },

    /// The built value does not have the Rust type requested by
    /// [`Engine::generate_as`](crate::Engine::generate_as).
    #[error("value built for `{goal}` does not have the requested type")]
    WrongType { goal: Shape },
}
