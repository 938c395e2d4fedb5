use serde::Serialize;
use std::{cell::RefCell, collections::BTreeMap};

///
/// CompileCounters
/// Ephemeral, per-worker counters for compilation activity.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CompileCounters {
    // Compile entrypoint
    pub compiles_started: u64,
    pub compiles_finished: u64,
    pub compiles_failed: u64,
    pub clauses_emitted: u64,

    // Rewrite pipeline
    pub rewrite_runs: u64,
    pub rewrite_rounds_total: u64,
    pub rewrite_rounds_max: u64,

    // Cache
    pub compilers_built: u64,

    /// Failures keyed by error class label.
    pub failures: BTreeMap<String, u64>,
}

thread_local! {
    static COUNTERS: RefCell<CompileCounters> = RefCell::new(CompileCounters::default());
}

/// Borrow counters immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&CompileCounters) -> R) -> R {
    COUNTERS.with(|m| f(&m.borrow()))
}

/// Borrow counters mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut CompileCounters) -> R) -> R {
    COUNTERS.with(|m| f(&mut m.borrow_mut()))
}

pub(crate) fn reset_all() {
    with_state_mut(|m| *m = CompileCounters::default());
}
