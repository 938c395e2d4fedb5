//! Metrics sink boundary.
//!
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`; this
//! module is the only bridge between compiler logic and counter state.

use crate::{error::ErrorClass, obs::metrics};
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    CompileStart,
    CompileFinish { clauses: u64 },
    CompileFailed { class: ErrorClass },
    RewriteRounds { rounds: usize },
    CompilerBuilt,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

///
/// GlobalMetricsSink
/// Default sink writing into the worker's counter state.
///

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::CompileStart => {
                m.compiles_started = m.compiles_started.saturating_add(1);
            }
            MetricsEvent::CompileFinish { clauses } => {
                m.compiles_finished = m.compiles_finished.saturating_add(1);
                m.clauses_emitted = m.clauses_emitted.saturating_add(clauses);
            }
            MetricsEvent::CompileFailed { class } => {
                m.compiles_failed = m.compiles_failed.saturating_add(1);
                let entry = m.failures.entry(class.to_string()).or_default();
                *entry = entry.saturating_add(1);
            }
            MetricsEvent::RewriteRounds { rounds } => {
                let rounds = u64::try_from(rounds).unwrap_or(u64::MAX);
                m.rewrite_runs = m.rewrite_runs.saturating_add(1);
                m.rewrite_rounds_total = m.rewrite_rounds_total.saturating_add(rounds);
                m.rewrite_rounds_max = m.rewrite_rounds_max.max(rounds);
            }
            MetricsEvent::CompilerBuilt => {
                m.compilers_built = m.compilers_built.saturating_add(1);
            }
        });
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the current worker's counters.
#[must_use]
pub fn metrics_report() -> metrics::CompileCounters {
    metrics::with_state(Clone::clone)
}

/// Reset the current worker's counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this worker.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

///
/// Span
/// RAII guard that emits start/finish events for one compile call.
/// A span dropped without an outcome (unwind) counts as an invariant failure.
///

pub(crate) struct Span {
    finished: bool,
}

impl Span {
    #[must_use]
    pub(crate) fn new() -> Self {
        record(MetricsEvent::CompileStart);

        Self { finished: false }
    }

    pub(crate) fn success(mut self, clauses: usize) {
        self.finished = true;
        record(MetricsEvent::CompileFinish {
            clauses: u64::try_from(clauses).unwrap_or(u64::MAX),
        });
    }

    pub(crate) fn failure(mut self, class: ErrorClass) {
        self.finished = true;
        record(MetricsEvent::CompileFailed { class });
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if !self.finished {
            self.finished = true;
            record(MetricsEvent::CompileFailed {
                class: ErrorClass::InvariantViolation,
            });
        }
    }
}
