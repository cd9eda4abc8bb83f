//! Debug tracing.
//!
//! Diagnostics are printed with `eprintln!` and gated by the `DERIVON_TRACE`
//! environment variable, read once per process. The variable holds a
//! comma-separated list of sections, e.g. `DERIVON_TRACE=goals,memo`;
//! `all` (or `1`) enables everything. Unknown sections are reported once
//! and ignored rather than failing the run.

use once_cell::sync::Lazy;

bitflags::bitflags! {
    /// Sections of engine tracing selectable via `DERIVON_TRACE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraceMask: u32 {
        /// Goal entry/exit lines.
        const GOALS      = 1 << 0;
        /// Candidate enumeration and per-candidate failures.
        const CANDIDATES = 1 << 1;
        /// Memo hits and skipped recordings.
        const MEMO       = 1 << 2;
        /// Cycle detection and cell closing.
        const CYCLE      = 1 << 3;
        /// Scoped rule injection and removal.
        const SCOPE      = 1 << 4;
    }
}

static ACTIVE: Lazy<TraceMask> = Lazy::new(|| match std::env::var("DERIVON_TRACE") {
    Ok(spec) => parse_spec(&spec),
    Err(_) => TraceMask::empty(),
});

/// Trace sections enabled for this process.
pub(crate) fn active() -> TraceMask {
    *ACTIVE
}

fn parse_spec(spec: &str) -> TraceMask {
    let mut mask = TraceMask::empty();
    for part in spec.split(',') {
        match part.trim() {
            "" => {}
            "all" | "1" => mask = TraceMask::all(),
            "goals" => mask |= TraceMask::GOALS,
            "candidates" => mask |= TraceMask::CANDIDATES,
            "memo" => mask |= TraceMask::MEMO,
            "cycle" => mask |= TraceMask::CYCLE,
            "scope" => mask |= TraceMask::SCOPE,
            other => eprintln!("[trace] unknown DERIVON_TRACE section '{other}'"),
        }
    }
    mask
}
