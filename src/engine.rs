//! Backward-chaining resolution engine.
//!
//! This module is the *internal core* behind the public [`crate::Engine`]
//! facade. It is split into focused submodules under `src/engine/` while the
//! facade in `src/api.rs` keeps the public paths stable.
//!
//! ## How the parts work together
//!
//! Resolving a goal is a recursive, goal-directed search:
//!
//! ```text
//! rules (all)  ──┐
//!               │  RuleBook::new                 (registry.rs)
//!               └───────────────┬──────────────
//!                               │
//! goal ── Search::run_* ────────┼─ ancestor check ──▶ cycle cell (cycle.rs)
//!        (solver.rs)            │
//!                               ▼
//!                     memo slot lookup            (memo.rs)
//!                       - hit: cached value
//!                       - miss: hold the per-shape gate
//!                               │
//!                               ▼
//!                     candidates for goal         (registry.rs)
//!                       - consequent matching     (signature.rs)
//!                       - antecedents, depth-first, recursively
//!                       - scoped rules visible to later antecedents
//!                               │
//!                               ▼
//!                     build closure ──▶ memoize ──▶ Value
//! ```
//!
//! Two drivers run this loop: a plain depth-first pass (commit to the first
//! fully successful derivation, no depth bound) and an iterative-deepening
//! driver that retries the whole goal with a growing bound until a
//! derivation fits, so the surfaced derivation has minimal depth.
//!
//! ## Responsibilities by module
//!
//! - `signature.rs`: one-way matching of rule consequents against goals and
//!   substitution-based specialization of antecedents.
//! - `registry.rs`: derives a `RuleBook` from `Rule`s and builds a cheap
//!   head-symbol index; enumerates candidates over base + scoped rules.
//! - `memo.rs`: shape-keyed permanent cache with a per-shape gate so a value
//!   is built at most once per engine, including under concurrent callers.
//! - `cycle.rs`: two-phase deferred handles that stand in for values still
//!   under construction, closing self-referential builds.
//! - `solver.rs`: the search core tying the above together.
//! - `metrics.rs`: opt-in timing/count data for runs and depth passes.
//! - `trace.rs`: env-var-gated diagnostics (`DERIVON_TRACE`).
//!
//! ## Debugging
//!
//! Set `DERIVON_TRACE=all` (or a comma-separated subset of `goals`,
//! `candidates`, `memo`, `cycle`, `scope`) to print resolution traces.

#[path = "engine/cycle.rs"]
mod cycle;
#[path = "engine/memo.rs"]
mod memo;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/registry.rs"]
mod registry;
#[path = "engine/signature.rs"]
mod signature;
#[path = "engine/solver.rs"]
mod solver;
#[path = "engine/trace.rs"]
mod trace;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use cycle::Deferred;
pub(crate) use memo::MemoStore;
pub(crate) use metrics::{RunMetrics, RunOutcome};
pub(crate) use registry::RuleBook;
pub(crate) use solver::Search;
pub use trace::TraceMask;
