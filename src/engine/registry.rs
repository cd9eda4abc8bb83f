//! Rule indexing and candidate lookup.
//!
//! This module holds the *static* side of the engine: the structures derived
//! from the full rule list that make goal resolution fast and predictable.
//!
//! Resolution is intentionally split into two phases:
//!
//! 1. **Index rules** (this module): create a cheap representation of the
//!    rule set (`RuleBook`) keyed by the consequent's head symbol.
//! 2. **Run** (see `solver.rs`): for each goal, enumerate matching
//!    candidates in registration order and explore them depth-first.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleBook::rules`. Bucket vectors and the
//!   `open` list store ids in ascending order, so merging them preserves
//!   registration order, which is the order candidates are tried in DFS mode:
//!   first success wins. Two rules with literally identical signatures are a
//!   deterministic tie: the earlier registration is tried first.
//! - Scoped rules are *not* indexed. They are few, short-lived and searched
//!   linearly after the base set, in injection order.

use super::signature::{Substitution, match_shape};
use crate::{Rule, Shape};
use std::collections::HashMap;
use std::sync::Arc;

/// Rule identifier (index into the rules vector).
pub(crate) type RuleId = usize;

/// Coarse index key for a rule consequent. A key only gates which rules are
/// *considered*; full matching still runs per candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum HeadKey {
    Atom(&'static str),
    Apply(&'static str, usize),
    Deferred,
}

impl HeadKey {
    /// None for an open consequent (a bare param), which can match any goal
    /// and therefore lives in the `open` list instead of a bucket.
    fn of(shape: &Shape) -> Option<Self> {
        match shape {
            Shape::Atom(name) => Some(HeadKey::Atom(*name)),
            Shape::Apply { head, args } => Some(HeadKey::Apply(*head, args.len())),
            Shape::Deferred(_) => Some(HeadKey::Deferred),
            Shape::Param(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct RuleIndex {
    by_head: HashMap<HeadKey, Vec<RuleId>>,
    open: Vec<RuleId>,
}

/// Immutable base rule set plus lookup index.
#[derive(Debug)]
pub(crate) struct RuleBook {
    rules: Vec<Arc<Rule>>,
    index: RuleIndex,
}

/// A rule whose consequent matches the current goal, paired with the
/// substitution that specializes its antecedents, and whether it came from
/// the scoped stack rather than the base set.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub(crate) rule: Arc<Rule>,
    pub(crate) subst: Substitution,
    pub(crate) scoped: bool,
}

impl RuleBook {
    pub(crate) fn new(rules: Vec<Rule>) -> Self {
        let rules: Vec<Arc<Rule>> = rules.into_iter().map(Arc::new).collect();

        let mut index = RuleIndex::default();
        for (id, rule) in rules.iter().enumerate() {
            match HeadKey::of(&rule.consequent) {
                Some(key) => index.by_head.entry(key).or_default().push(id),
                None => index.open.push(id),
            }
        }

        RuleBook { rules, index }
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }

    /// Base-rule ids that could match `goal`, in registration order: the
    /// head bucket merged with the open-consequent list (both already
    /// sorted ascending).
    fn ids_for(&self, goal: &Shape) -> Vec<RuleId> {
        let bucket: &[RuleId] = HeadKey::of(goal)
            .and_then(|key| self.index.by_head.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let open = self.index.open.as_slice();

        let mut out = Vec::with_capacity(bucket.len() + open.len());
        let (mut i, mut j) = (0, 0);
        while i < bucket.len() && j < open.len() {
            if bucket[i] < open[j] {
                out.push(bucket[i]);
                i += 1;
            } else {
                out.push(open[j]);
                j += 1;
            }
        }
        out.extend_from_slice(&bucket[i..]);
        out.extend_from_slice(&open[j..]);
        out
    }

    /// Every rule in the current set whose consequent matches `goal`, each
    /// paired with its substitution: base rules first (registration order),
    /// then scoped rules in injection order.
    pub(crate) fn candidates(&self, goal: &Shape, scoped: &[Arc<Rule>]) -> Vec<Candidate> {
        let mut out = Vec::new();

        for id in self.ids_for(goal) {
            let rule = &self.rules[id];
            let mut subst = Substitution::default();
            if match_shape(&rule.consequent, goal, &mut subst) {
                out.push(Candidate { rule: rule.clone(), subst, scoped: false });
            }
        }

        for rule in scoped {
            let mut subst = Substitution::default();
            if match_shape(&rule.consequent, goal, &mut subst) {
                out.push(Candidate { rule: rule.clone(), subst, scoped: true });
            }
        }

        out
    }
}
