//! Source health rollup (§4.14): `healthy` if the last run succeeded and
//! produced at least `HEALTHY_MIN_RECORDS`, `degraded` if it produced fewer
//! than that but still something, `failed` otherwise.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gigsignal_ingest::RunStats;
use serde::Serialize;

/// Default minimum records for a `healthy` verdict (§4.14).
pub const HEALTHY_MIN_RECORDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub source: String,
    pub status: HealthStatus,
    pub last_run_at: DateTime<Utc>,
    pub last_run_succeeded: bool,
    pub produced_records: usize,
}

impl SourceHealth {
    pub fn from_stats(stats: &RunStats) -> Self {
        let produced = stats.new_count + stats.updated_count + stats.unchanged_count;
        let status = if stats.succeeded && produced >= HEALTHY_MIN_RECORDS {
            HealthStatus::Healthy
        } else if stats.succeeded && produced >= 1 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Failed
        };
        Self {
            source: stats.source.clone(),
            status,
            last_run_at: Utc::now(),
            last_run_succeeded: stats.succeeded,
            produced_records: produced,
        }
    }
}

/// A process-wide rollup of the latest health verdict per source, so the
/// CLI's `validate`/`compare` can report degraded sources without
/// re-reading every snapshot (§9 supplement).
#[derive(Debug, Default, Clone, Serialize)]
pub struct HealthRollup {
    per_source: HashMap<String, SourceHealth>,
}

impl HealthRollup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stats: &RunStats) {
        let health = SourceHealth::from_stats(stats);
        self.per_source.insert(health.source.clone(), health);
    }

    pub fn get(&self, source: &str) -> Option<&SourceHealth> {
        self.per_source.get(source)
    }

    pub fn degraded_or_failed(&self) -> Vec<&SourceHealth> {
        let mut out: Vec<&SourceHealth> = self
            .per_source
            .values()
            .filter(|h| h.status != HealthStatus::Healthy)
            .collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }

    pub fn all(&self) -> Vec<&SourceHealth> {
        let mut out: Vec<&SourceHealth> = self.per_source.values().collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }
}
