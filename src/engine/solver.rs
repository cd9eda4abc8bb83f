//! Backward-chaining search core.
//!
//! This module is the operational heart of the engine:
//!
//! - For the current goal, enumerate candidate rules (registration order;
//!   see `registry.rs`) and commit to the first candidate whose antecedents
//!   all resolve and whose build succeeds.
//! - Resolve antecedents left-to-right, depth-first, recursively; discard
//!   all partial work for a candidate when any antecedent fails.
//! - Detect structural recursion through the ancestor goal stack and route
//!   it through a deferred handle instead of recursing (see `cycle.rs`).
//! - Answer from and record into the memo store (see `memo.rs`).
//!
//! ## Strategies
//!
//! ```text
//! run_depth_first      one pass, no bound
//!                      - linear in derivation attempts
//!                      - loops forever on unproductive infinite rule
//!                        chains (caller responsibility)
//!
//! run_deepening        pass at limit 1, 2, 3, ... max_depth
//!                      - retries the whole goal when a pass was clipped
//!                      - stops early when a pass fails unclipped
//!                      - surfaces a minimal-depth derivation
//! ```
//!
//! A pass is *clipped* when the depth bound cut off at least one branch.
//! An unclipped failed pass is final: no amount of deepening changes the
//! outcome, so the driver stops instead of burning the remaining budget.
//! Memoized sub-results persist across passes, so shallow sub-goals solved
//! at limit `d` are not recomputed at `d+1`.
//!
//! ## Scoped rule injection
//!
//! Rules carried by a resolved antecedent value (`Derived::rules`) are
//! pushed onto a per-search stack and visible to the remaining antecedents
//! of the same candidate. The stack is truncated to its entry mark on every
//! exit path of the candidate frame, success and failure alike, so scoped
//! rules can never leak into sibling branches.

use super::cycle::{Cell, Deferred};
use super::memo::{Built, MemoStore};
use super::metrics::{PassMetrics, RunMetrics, RunOutcome};
use super::registry::{Candidate, RuleBook};
use super::trace::{self, TraceMask};
use crate::error::ResolveError;
use crate::{Rule, Shape, Value};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

/// One configured search over a rule book, borrowed from the owning engine.
pub(crate) struct Search<'a> {
    book: &'a RuleBook,
    memo: &'a MemoStore,
    max_depth: usize,
    trace: TraceMask,
}

/// Transient state for one pass: the ancestor goal stack, the scoped-rule
/// stack, in-progress cycle cells, and diagnostics.
struct SearchState {
    /// Goals whose candidate frames are currently in progress, outermost
    /// first. Used for cycle detection; its length is the current depth.
    path: Vec<Shape>,
    /// Scoped rules, innermost last. Truncated on candidate-frame exit.
    scoped: Vec<Arc<Rule>>,
    /// Cells for shapes currently standing in for themselves.
    cells: HashMap<Shape, Cell>,
    /// Number of cells not yet set. While non-zero, completed builds may
    /// capture an unresolved stand-in and must not be memoized.
    open_cells: usize,
    /// Whether the depth bound cut off at least one branch.
    clipped: bool,
    /// Longest goal path attempted before a dead end, for diagnostics.
    deepest: Vec<Shape>,
    stats: PassMetrics,
}

impl SearchState {
    fn new(limit: Option<usize>) -> Self {
        SearchState {
            path: Vec::new(),
            scoped: Vec::new(),
            cells: HashMap::new(),
            open_cells: 0,
            clipped: false,
            deepest: Vec::new(),
            stats: PassMetrics { limit, ..PassMetrics::default() },
        }
    }

    fn note_dead_end(&mut self, goal: &Shape) {
        if self.path.len() + 1 > self.deepest.len() {
            self.deepest = self.path.iter().cloned().chain(std::iter::once(goal.clone())).collect();
        }
    }
}

impl<'a> Search<'a> {
    pub(crate) fn new(book: &'a RuleBook, memo: &'a MemoStore, max_depth: usize) -> Self {
        Search { book, memo, max_depth, trace: trace::active() }
    }

    /// Iterative-deepening driver: retry the whole goal with a growing depth
    /// bound until a derivation fits or the budget is exhausted. Budget
    /// exhaustion is reported as `NoDerivation`; the engine cannot
    /// distinguish "needs more depth" from "truly impossible".
    pub(crate) fn run_deepening(&self, goal: &Shape) -> RunOutcome {
        let total_start = Instant::now();
        let mut metrics = RunMetrics::default();
        let mut deepest: Vec<Shape> = Vec::new();

        for limit in 1..=self.max_depth {
            let pass_start = Instant::now();
            let mut st = SearchState::new(Some(limit));
            let result = self.solve(goal, Some(limit), &mut st);

            let mut stats = std::mem::take(&mut st.stats);
            stats.duration = pass_start.elapsed();
            stats.clipped = st.clipped;
            metrics.passes.push(stats);
            if st.deepest.len() > deepest.len() {
                deepest = std::mem::take(&mut st.deepest);
            }

            match result {
                Ok(built) => {
                    metrics.total = total_start.elapsed();
                    return RunOutcome { result: Ok(built.value), metrics };
                }
                Err(err) if !st.clipped => {
                    // Nothing was cut by the bound: deepening cannot help.
                    metrics.total = total_start.elapsed();
                    return RunOutcome { result: Err(attach_deepest(err, deepest)), metrics };
                }
                Err(_) => {}
            }
        }

        metrics.total = total_start.elapsed();
        let err = ResolveError::NoDerivation { goal: goal.clone(), deepest };
        RunOutcome { result: Err(err), metrics }
    }

    /// Plain depth-first driver: a single unbounded pass, committing to the
    /// first fully successful derivation.
    pub(crate) fn run_depth_first(&self, goal: &Shape) -> RunOutcome {
        let total_start = Instant::now();
        let mut st = SearchState::new(None);
        let result = self.solve(goal, None, &mut st);

        let mut stats = std::mem::take(&mut st.stats);
        stats.duration = total_start.elapsed();
        let deepest = std::mem::take(&mut st.deepest);
        let metrics = RunMetrics { total: total_start.elapsed(), passes: vec![stats] };

        RunOutcome {
            result: result.map(|built| built.value).map_err(|err| attach_deepest(err, deepest)),
            metrics,
        }
    }

    /// Resolve one goal. The order of checks matters:
    ///
    /// 1. ancestor check: an in-flight goal must not recurse and must not
    ///    touch its own (locked) memo slot;
    /// 2. memo lookup, holding the per-shape gate across the build;
    /// 3. depth bound;
    /// 4. candidate exploration.
    fn solve(
        &self,
        goal: &Shape,
        limit: Option<usize>,
        st: &mut SearchState,
    ) -> Result<Built, ResolveError> {
        if self.trace.contains(TraceMask::GOALS) {
            eprintln!("[solve:goal] depth={} goal={}", st.path.len(), goal);
        }

        if st.path.contains(goal) {
            return self.close_cycle(goal, limit, st);
        }

        let slot = self.memo.slot(goal);
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(built) = entry.as_ref() {
            st.stats.memo_hits += 1;
            if self.trace.contains(TraceMask::MEMO) {
                eprintln!("[solve:memo] hit goal={goal}");
            }
            return Ok(built.clone());
        }

        if let Some(l) = limit {
            if st.path.len() >= l {
                st.clipped = true;
                st.note_dead_end(goal);
                return Err(ResolveError::NoDerivation { goal: goal.clone(), deepest: Vec::new() });
            }
        }

        let built = match self.try_candidates(goal, limit, st) {
            Ok(built) => built,
            Err(err) => {
                // Discard the pending cell for this goal, if a descendant
                // allocated one: its stand-ins die with the failed subtree.
                if let Some(cell) = st.cells.remove(goal) {
                    if cell.get().is_none() {
                        st.open_cells -= 1;
                    }
                }
                return Err(err);
            }
        };

        // Close the cycle before unwinding past the frame that introduced
        // it: every handle allocated for this goal now reads the real value.
        if let Some(cell) = st.cells.get(goal) {
            if cell.set(built.value.clone()).is_ok() {
                st.open_cells -= 1;
                if self.trace.contains(TraceMask::CYCLE) {
                    eprintln!("[solve:cycle_closed] goal={goal}");
                }
            }
        }

        // First success wins: the entry is written once and never replaced.
        // Builds committed through a scoped rule are only valid under the
        // injecting frame; builds completed under an open cell may capture
        // an unresolved stand-in. Neither is recorded.
        if !built.scoped && st.open_cells == 0 {
            *entry = Some(built.clone());
        } else if self.trace.contains(TraceMask::MEMO) {
            eprintln!(
                "[solve:memo] skip goal={goal} scoped={} open_cells={}",
                built.scoped, st.open_cells
            );
        }

        Ok(built)
    }

    /// Try every candidate for `goal` in order; first success wins. When all
    /// fail, a build or cycle failure outranks a bare no-derivation in the
    /// reported error.
    fn try_candidates(
        &self,
        goal: &Shape,
        limit: Option<usize>,
        st: &mut SearchState,
    ) -> Result<Built, ResolveError> {
        let candidates = self.book.candidates(goal, &st.scoped);
        st.stats.goals += 1;
        if self.trace.contains(TraceMask::CANDIDATES) {
            eprintln!("[solve:candidates] goal={} count={}", goal, candidates.len());
        }

        let mut best: Option<ResolveError> = None;
        for cand in &candidates {
            st.stats.candidates += 1;
            match self.try_candidate(goal, cand, limit, st) {
                Ok(built) => return Ok(built),
                Err(err) => {
                    if self.trace.contains(TraceMask::CANDIDATES) {
                        eprintln!(
                            "[solve:candidate_failed] rule=\"{}\" goal={}: {}",
                            cand.rule.name, goal, err
                        );
                    }
                    remember(&mut best, err);
                }
            }
        }

        st.note_dead_end(goal);
        Err(match best {
            Some(err @ (ResolveError::Build { .. } | ResolveError::CycleUnsupported { .. })) => err,
            _ => ResolveError::NoDerivation { goal: goal.clone(), deepest: Vec::new() },
        })
    }

    /// One candidate frame: push the goal on the ancestor stack, resolve and
    /// build, and restore the scoped-rule stack on the way out regardless of
    /// the outcome.
    fn try_candidate(
        &self,
        goal: &Shape,
        cand: &Candidate,
        limit: Option<usize>,
        st: &mut SearchState,
    ) -> Result<Built, ResolveError> {
        st.path.push(goal.clone());
        let scope_mark = st.scoped.len();

        let result = self.apply_rule(goal, cand, limit, st);

        if st.scoped.len() > scope_mark && self.trace.contains(TraceMask::SCOPE) {
            eprintln!("[solve:scope] -{} rules leaving goal={}", st.scoped.len() - scope_mark, goal);
        }
        st.scoped.truncate(scope_mark);
        st.path.pop();
        result
    }

    fn apply_rule(
        &self,
        goal: &Shape,
        cand: &Candidate,
        limit: Option<usize>,
        st: &mut SearchState,
    ) -> Result<Built, ResolveError> {
        let rule = &cand.rule;
        let mut args: Vec<Value> = Vec::with_capacity(rule.antecedents.len());

        for ante in &rule.antecedents {
            let need = cand.subst.apply(ante);
            if !need.is_monomorphic() {
                // The goal did not determine all of this rule's parameters.
                st.note_dead_end(&need);
                return Err(ResolveError::NoDerivation { goal: need, deepest: Vec::new() });
            }

            let built = self.solve(&need, limit, st)?;
            if !built.rules.is_empty() {
                if self.trace.contains(TraceMask::SCOPE) {
                    eprintln!("[solve:scope] +{} rules from {}", built.rules.len(), need);
                }
                st.scoped.extend(built.rules.iter().cloned());
            }
            args.push(built.value);
        }

        st.stats.invocations += 1;
        let derived = (rule.build)(&args).map_err(|source| ResolveError::Build {
            rule: rule.name,
            goal: goal.clone(),
            source,
        })?;

        Ok(Built {
            value: derived.value,
            rules: derived.rules.into_iter().map(Arc::new).collect(),
            scoped: cand.scoped,
        })
    }

    /// Resolve a structurally recursive need for `goal` without recursing:
    /// allocate (or reuse) the in-progress cell for it and stand in with a
    /// handle built by a registered deferred-handle rule.
    fn close_cycle(
        &self,
        goal: &Shape,
        limit: Option<usize>,
        st: &mut SearchState,
    ) -> Result<Built, ResolveError> {
        if let Some(l) = limit {
            if st.path.len() >= l {
                st.clipped = true;
                st.note_dead_end(goal);
                return Err(ResolveError::NoDerivation { goal: goal.clone(), deepest: Vec::new() });
            }
        }

        let proxy_goal = Shape::deferred(goal.clone());
        let Some(cand) = self.book.candidates(&proxy_goal, &st.scoped).into_iter().next() else {
            if self.trace.contains(TraceMask::CYCLE) {
                eprintln!("[solve:cycle] goal={goal} has no deferred-handle rule");
            }
            st.note_dead_end(&proxy_goal);
            return Err(ResolveError::CycleUnsupported { goal: goal.clone() });
        };

        let cell = match st.cells.get(goal) {
            Some(cell) => cell.clone(),
            None => {
                let cell: Cell = Arc::new(OnceCell::new());
                st.cells.insert(goal.clone(), cell.clone());
                st.open_cells += 1;
                cell
            }
        };
        if self.trace.contains(TraceMask::CYCLE) {
            eprintln!("[solve:cycle] goal={} handled by rule=\"{}\"", goal, cand.rule.name);
        }

        let handle: Value = Arc::new(Deferred::new(goal.clone(), cell));
        st.stats.candidates += 1;
        st.stats.invocations += 1;
        let derived =
            (cand.rule.build)(std::slice::from_ref(&handle)).map_err(|source| {
                ResolveError::Build { rule: cand.rule.name, goal: proxy_goal, source }
            })?;

        Ok(Built {
            value: derived.value,
            rules: derived.rules.into_iter().map(Arc::new).collect(),
            scoped: cand.scoped,
        })
    }
}

/// Keep the first build/cycle failure seen; otherwise the latest failure.
fn remember(best: &mut Option<ResolveError>, err: ResolveError) {
    let keep = matches!(
        best,
        Some(ResolveError::Build { .. } | ResolveError::CycleUnsupported { .. })
    );
    if !keep {
        *best = Some(err);
    }
}

/// Attach the diagnostic path to a terminal no-derivation error.
fn attach_deepest(err: ResolveError, deepest: Vec<Shape>) -> ResolveError {
    match err {
        ResolveError::NoDerivation { goal, .. } => ResolveError::NoDerivation { goal, deepest },
        other => other,
    }
}
