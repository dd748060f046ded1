//! Run log (§4.14, §6): a persisted JSON timeline of one invocation,
//! appended to as the run progresses rather than assembled only at the end.
//!
//! Grounded in `rootsignal-scout::run_log::RunLog` — a sequenced,
//! timestamped, tagged-enum event list written to one file per run. This
//! supplements §4.14's aggregate run-log *document shape* (§6:
//! `{type, timestamp, results[], summary}`) with that append-as-you-go
//! writer, used by the Ingestion Worker and Catalog Generator.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gigsignal_ingest::RunStats;
use serde::Serialize;
use tracing::info;

/// One timestamped, sequenced action taken during a run.
#[derive(Debug, Serialize)]
struct RunEvent {
    seq: u32,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    kind: RunEventKind,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventKind {
    SourceStarted { source: String },
    SourceCompleted { source: String, succeeded: bool, new: usize, updated: usize, unchanged: usize },
    SourceSkipped { source: String, reason: String },
    CatalogGenerated { version: u64, gig_count: usize, duplicates_removed: usize },
}

/// §6: `"ingest_all"` covers a whole scheduler tick; a per-source run's
/// `type` is the source's own name (set via `RunLog::for_source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    IngestAll,
    Source,
}

impl RunKind {
    fn as_str(&self) -> &'static str {
        match self {
            RunKind::IngestAll => "ingest_all",
            RunKind::Source => "source",
        }
    }
}

/// Append-as-you-go run log. `label` doubles as the document's `type` field
/// and the `{log_dir}/runs/{label}/` subdirectory `save` writes into —
/// mirroring the teacher's per-region `scout-runs/{region}/{run_id}.json`
/// convention, with `source` standing in for `region` (§6, supplemented
/// features).
pub struct RunLog {
    kind: RunKind,
    label: String,
    run_id: String,
    started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
    results: Vec<RunStats>,
}

/// §6 run-log document: `{type, timestamp, results[], summary}`.
#[derive(Debug, Serialize)]
pub struct RunLogDocument<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub timestamp: DateTime<Utc>,
    pub run_id: &'a str,
    pub results: Vec<RunResultSummary>,
    pub summary: RunSummary,
}

#[derive(Debug, Serialize)]
pub struct RunResultSummary {
    pub source: String,
    pub succeeded: bool,
    pub new_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
    pub invalid_records: usize,
    pub total_ms: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub sources_run: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub total_new: usize,
    pub total_updated: usize,
    pub total_unchanged: usize,
}

impl RunLog {
    /// The process-wide aggregate covering every source run in one
    /// scheduler tick; saved under `{log_dir}/runs/ingest_all/`.
    pub fn new(kind: RunKind, run_id: impl Into<String>) -> Self {
        Self::scoped(kind, kind.as_str().to_string(), run_id)
    }

    /// A single source's own run, saved under `{log_dir}/runs/{source}/`
    /// (§6 "per-source" document; supplemented features' per-region
    /// convention with `source` in place of `region`).
    pub fn for_source(source: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::scoped(RunKind::Source, source.into(), run_id)
    }

    fn scoped(kind: RunKind, label: String, run_id: impl Into<String>) -> Self {
        Self {
            kind,
            label,
            run_id: run_id.into(),
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
            results: Vec::new(),
        }
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    fn log(&mut self, kind: RunEventKind) {
        self.events.push(RunEvent { seq: self.seq, ts: Utc::now(), kind });
        self.seq += 1;
    }

    pub fn source_started(&mut self, source: &str) {
        self.log(RunEventKind::SourceStarted { source: source.to_string() });
    }

    pub fn source_skipped(&mut self, source: &str, reason: &str) {
        self.log(RunEventKind::SourceSkipped { source: source.to_string(), reason: reason.to_string() });
    }

    /// Record one source's completed `run_once` outcome (§4.4 step 7).
    pub fn record(&mut self, stats: RunStats) {
        self.log(RunEventKind::SourceCompleted {
            source: stats.source.clone(),
            succeeded: stats.succeeded,
            new: stats.new_count,
            updated: stats.updated_count,
            unchanged: stats.unchanged_count,
        });
        self.results.push(stats);
    }

    pub fn catalog_generated(&mut self, version: u64, gig_count: usize, duplicates_removed: usize) {
        self.log(RunEventKind::CatalogGenerated { version, gig_count, duplicates_removed });
    }

    fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            sources_run: self.results.len(),
            ..Default::default()
        };
        for r in &self.results {
            if r.succeeded {
                summary.sources_succeeded += 1;
            } else {
                summary.sources_failed += 1;
            }
            summary.total_new += r.new_count;
            summary.total_updated += r.updated_count;
            summary.total_unchanged += r.unchanged_count;
        }
        summary
    }

    pub fn document(&self) -> RunLogDocument<'_> {
        RunLogDocument {
            kind: self.label.as_str(),
            timestamp: self.started_at,
            run_id: &self.run_id,
            results: self
                .results
                .iter()
                .map(|r| RunResultSummary {
                    source: r.source.clone(),
                    succeeded: r.succeeded,
                    new_count: r.new_count,
                    updated_count: r.updated_count,
                    unchanged_count: r.unchanged_count,
                    invalid_records: r.invalid_records,
                    total_ms: r.total_ms,
                })
                .collect(),
            summary: self.summary(),
        }
    }

    /// Write the full timeline plus the §6 document shape to
    /// `{log_dir}/runs/{label}/{run_id}.json`, where `label` is
    /// `"ingest_all"` for the aggregate or the source name for a
    /// `for_source` log.
    pub async fn save(&self, log_dir: impl AsRef<Path>) -> anyhow::Result<PathBuf> {
        let dir = log_dir.as_ref().join("runs").join(&self.label);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", self.run_id));

        #[derive(Serialize)]
        struct Full<'a> {
            #[serde(flatten)]
            document: RunLogDocument<'a>,
            events: &'a [RunEvent],
        }
        let full = Full { document: self.document(), events: &self.events };

        let json = serde_json::to_string_pretty(&full)?;
        tokio::fs::write(&path, json).await?;
        info!(path = %path.display(), events = self.events.len(), "run log saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(source: &str, succeeded: bool) -> RunStats {
        let mut s = RunStats::new(source);
        s.succeeded = succeeded;
        s.new_count = 1;
        s
    }

    #[test]
    fn summary_counts_successes_and_failures() {
        let mut log = RunLog::new(RunKind::IngestAll, "run-1");
        log.record(stats("ra", true));
        log.record(stats("blog", false));

        let summary = log.summary();
        assert_eq!(summary.sources_run, 2);
        assert_eq!(summary.sources_succeeded, 1);
        assert_eq!(summary.sources_failed, 1);
        assert_eq!(summary.total_new, 2);
    }

    #[tokio::test]
    async fn save_writes_a_json_file_named_after_the_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(RunKind::IngestAll, "run-42");
        log.source_started("ra");
        log.record(stats("ra", true));

        let path = log.save(dir.path()).await.unwrap();
        assert!(path.ends_with("run-42.json"));
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("\"run_id\": \"run-42\""));
    }

    #[tokio::test]
    async fn save_writes_under_a_per_source_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::for_source("resident-advisor", "run-7");
        log.source_started("resident-advisor");
        log.record(stats("resident-advisor", true));

        let path = log.save(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("runs").join("resident-advisor").join("run-7.json"));
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("\"type\": \"resident-advisor\""));
    }

    #[tokio::test]
    async fn aggregate_log_is_saved_under_the_ingest_all_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(RunKind::IngestAll, "run-8");

        let path = log.save(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("runs").join("ingest_all").join("run-8.json"));
    }
}
