//! Observability (C14, §4.14): run logs, per-source error/perf logs, and
//! the source health rollup.

pub mod error_log;
pub mod health;
pub mod perf_log;
pub mod retention;
pub mod run_log;

pub use error_log::{ErrorLog, ErrorLogEntry};
pub use health::{HealthRollup, HealthStatus, SourceHealth, HEALTHY_MIN_RECORDS};
pub use perf_log::{PerfLog, PerfLogEntry, PerfMetrics};
pub use retention::prune_old_logs;
pub use run_log::{RunKind, RunLog, RunLogDocument};
