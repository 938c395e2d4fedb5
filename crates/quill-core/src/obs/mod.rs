//! Observability: compile telemetry and the sink it flows through.
//!
//! Compiler code never touches the counter state directly; every event goes
//! through [`sink::record`].

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::CompileCounters;
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
