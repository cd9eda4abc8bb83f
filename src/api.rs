use crate::engine::{MemoStore, RuleBook, RunMetrics, RunOutcome, Search};
use crate::error::ResolveError;
use crate::{Rule, Shape, Value};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default depth cutoff for [`Engine::generate`].
///
/// Deep enough for any rule set a person would plausibly write by hand;
/// raise it through [`Options`] for generated rule sets with long chains.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Options that affect search behavior.
///
/// This is intentionally minimal today and will grow as more engine
/// configuration is surfaced.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum derivation-tree depth explored by iterative deepening before
    /// the goal is reported unsatisfiable. Plain DFS ignores this.
    pub max_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options { max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// A resolution engine instance: an immutable rule set plus the memo store
/// caching every value it has built.
///
/// The engine is `Send + Sync`; concurrent callers resolving the same goal
/// are serialized per shape so at most one build occurs (see
/// `src/engine/memo.rs`).
#[derive(Debug)]
pub struct Engine {
    book: RuleBook,
    memo: MemoStore,
    options: Options,
}

impl Engine {
    /// Create an engine over `rules` with default [`Options`].
    ///
    /// Registration order is significant: in DFS mode rules are tried in
    /// this order and the first success wins.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self::with_options(rules, Options::default())
    }

    pub fn with_options(rules: Vec<Rule>, options: Options) -> Self {
        Engine { book: RuleBook::new(rules), memo: MemoStore::default(), options }
    }

    /// Number of rules in the base set.
    pub fn rule_count(&self) -> usize {
        self.book.len()
    }

    /// Build a value for `goal` using iterative-deepening depth-first
    /// search.
    ///
    /// Among all successful derivations this surfaces one of minimal
    /// derivation-tree depth, and it tolerates rule sets with infinite
    /// unproductive branches as long as a finite-depth derivation exists.
    /// An exhausted depth budget is reported as
    /// [`ResolveError::NoDerivation`].
    ///
    /// # Example
    /// ```
    /// use derivon::{Engine, fact};
    ///
    /// let engine = Engine::new(vec![fact! {
    ///     name: "answer",
    ///     shape: derivon::shape!(answer),
    ///     value: 42_u32,
    /// }]);
    ///
    /// let built = engine.generate(&derivon::shape!(answer)).unwrap();
    /// assert_eq!(built.downcast_ref::<u32>(), Some(&42));
    /// ```
    pub fn generate(&self, goal: &Shape) -> Result<Value, ResolveError> {
        self.check_goal(goal)?;
        self.search().run_deepening(goal).result
    }

    /// Build a value for `goal` using plain depth-first search.
    ///
    /// Candidates are tried in registration order and the first fully
    /// successful derivation is committed to; it is not necessarily the
    /// shallowest one. A rule set admitting an infinite unproductive
    /// derivation chain will not terminate under this strategy; that is a
    /// property of the rule set, not something the engine guards against.
    /// Use [`Engine::generate`] for such rule sets.
    pub fn generate_dfs(&self, goal: &Shape) -> Result<Value, ResolveError> {
        self.check_goal(goal)?;
        self.search().run_depth_first(goal).result
    }

    /// [`Engine::generate`], downcast to a concrete value type.
    pub fn generate_as<T: Any + Send + Sync>(&self, goal: &Shape) -> Result<Arc<T>, ResolveError> {
        self.generate(goal)?
            .downcast::<T>()
            .map_err(|_| ResolveError::WrongType { goal: goal.clone() })
    }

    /// [`Engine::generate_dfs`], downcast to a concrete value type.
    pub fn generate_dfs_as<T: Any + Send + Sync>(
        &self,
        goal: &Shape,
    ) -> Result<Arc<T>, ResolveError> {
        self.generate_dfs(goal)?
            .downcast::<T>()
            .map_err(|_| ResolveError::WrongType { goal: goal.clone() })
    }

    /// [`Engine::generate`] with extra (compact) search details.
    ///
    /// Useful for profiling and rule debugging. The plain [`generate`]
    /// path does not allocate these extra traces.
    ///
    /// [`generate`]: Engine::generate
    pub fn generate_verbose(&self, goal: &Shape) -> Result<Resolution, ResolveError> {
        self.check_goal(goal)?;
        resolution_from(self.search().run_deepening(goal))
    }

    /// [`Engine::generate_dfs`] with extra (compact) search details.
    pub fn generate_dfs_verbose(&self, goal: &Shape) -> Result<Resolution, ResolveError> {
        self.check_goal(goal)?;
        resolution_from(self.search().run_depth_first(goal))
    }

    fn search(&self) -> Search<'_> {
        Search::new(&self.book, &self.memo, self.options.max_depth)
    }

    fn check_goal(&self, goal: &Shape) -> Result<(), ResolveError> {
        if goal.is_monomorphic() {
            Ok(())
        } else {
            Err(ResolveError::PolymorphicGoal { goal: goal.clone() })
        }
    }
}

/// Result from the `*_verbose` entry points.
pub struct Resolution {
    /// The built value.
    pub value: Value,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Per-pass search details.
    pub details: SearchDetails,
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("value", &"<value>")
            .field("elapsed", &self.elapsed)
            .field("details", &self.details)
            .finish()
    }
}

/// Additional details returned by the `*_verbose` entry points.
///
/// This is intentionally compact: it is meant for debugging and performance
/// inspection without dumping the entire internal state.
#[derive(Debug, Clone)]
pub struct SearchDetails {
    /// Total elapsed time.
    pub total: Duration,
    /// One entry per search pass (a single entry for DFS).
    pub passes: Vec<PassSummary>,
}

/// A compact per-pass trace.
#[derive(Debug, Clone)]
pub struct PassSummary {
    /// Depth bound of the pass; `None` for plain DFS.
    pub limit: Option<usize>,
    pub duration: Duration,
    /// Goals expanded.
    pub goals: usize,
    /// Candidate rules attempted.
    pub candidates: usize,
    /// Build closures invoked.
    pub invocations: usize,
    /// Goals answered from the memo store.
    pub memo_hits: usize,
    /// Whether the depth bound cut off at least one branch.
    pub clipped: bool,
}

fn resolution_from(outcome: RunOutcome) -> Result<Resolution, ResolveError> {
    let details = details_from(&outcome.metrics);
    let value = outcome.result?;
    Ok(Resolution { value, elapsed: details.total, details })
}

fn details_from(metrics: &RunMetrics) -> SearchDetails {
    SearchDetails {
        total: metrics.total,
        passes: metrics
            .passes
            .iter()
            .map(|pass| PassSummary {
                limit: pass.limit,
                duration: pass.duration,
                goals: pass.goals,
                candidates: pass.candidates,
                invocations: pass.invocations,
                memo_hits: pass.memo_hits,
                clipped: pass.clipped,
            })
            .collect(),
    }
}
