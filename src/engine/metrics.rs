//! Search run metrics.
//!
//! A small set of structs used to observe and debug engine behavior.
//!
//! The intended usage is:
//!
//! - `Engine::generate` / `Engine::generate_dfs` for normal operation.
//! - The `*_verbose` variants for profiling, debugging regressions, and
//!   inspecting what each depth pass did.
//!
//! Metrics are intentionally simple and *opt-in*: the hot path collects only
//! counters, and callers choose the level of visibility they want through
//! the facade in `src/api.rs`.

use crate::{ResolveError, Value};
use std::time::Duration;

/// Timings and counters for a whole run (one driver invocation).
#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time for the run.
    pub total: Duration,
    /// One entry per search pass. DFS runs a single unbounded pass;
    /// iterative deepening runs one pass per depth bound tried.
    pub passes: Vec<PassMetrics>,
}

/// Timing and counts for a single bounded (or unbounded) pass.
#[derive(Debug, Default, Clone)]
pub struct PassMetrics {
    /// Depth bound for the pass; `None` for plain DFS.
    pub limit: Option<usize>,
    /// Elapsed time for the pass.
    pub duration: Duration,
    /// Number of goals expanded (candidate lists enumerated).
    pub goals: usize,
    /// Number of candidate rules attempted.
    pub candidates: usize,
    /// Number of build closures invoked.
    pub invocations: usize,
    /// Number of goals answered from the memo store.
    pub memo_hits: usize,
    /// Whether the depth bound cut off at least one branch. An unclipped
    /// failed pass is final: deepening cannot change the outcome.
    pub clipped: bool,
}

/// Solver output bundled with timing information.
pub(crate) struct RunOutcome {
    pub(crate) result: Result<Value, ResolveError>,
    pub(crate) metrics: RunMetrics,
}
