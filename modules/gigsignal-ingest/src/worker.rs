//! Ingestion Worker (§4.4): one run of one source, as seven independently
//! timed steps.
//!
//! Grounded in `rootsignal-scout::scout::Scout::run`'s shape of
//! admit-rate-limit → fetch → persist → extract → dedup → store → stats,
//! generalized here to the plugin contract in `gigsignal-plugin`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gigsignal_common::types::{Event, SnapshotMetadata, SourceSnapshot};
use gigsignal_common::Severity;
use gigsignal_plugin::{PluginError, ScraperPlugin};
use gigsignal_ratelimit::RateLimiter;
use gigsignal_store::{DocumentStore, SnapshotStore};
use gigsignal_validate::Sanitizer;
use tracing::{error, info, warn};

use crate::change;
use crate::stats::RunStats;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one `run_once` call. `snapshot` is the previous snapshot,
/// untouched, when the run failed fatally (§4.4 "Failure semantics").
pub struct RunOutcome {
    pub snapshot: SourceSnapshot,
    pub stats: RunStats,
}

pub struct IngestionWorker {
    pub plugin: Arc<dyn ScraperPlugin>,
    pub limiter: Arc<RateLimiter>,
    pub sanitizer: Sanitizer,
    pub snapshot_store: Option<Arc<dyn SnapshotStore>>,
    pub document_store: Option<Arc<dyn DocumentStore>>,
    /// Directory raw, pre-normalization payloads are archived to (step 2).
    /// `None` skips raw archival.
    pub raw_archive_dir: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

impl IngestionWorker {
    pub fn new(plugin: Arc<dyn ScraperPlugin>, limiter: Arc<RateLimiter>, sanitizer: Sanitizer) -> Self {
        Self {
            plugin,
            limiter,
            sanitizer,
            snapshot_store: None,
            document_store: None,
            raw_archive_dir: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub async fn run_once(&self, source: &str, previous: Option<SourceSnapshot>) -> RunOutcome {
        let run_start = Instant::now();
        let mut stats = RunStats::new(source);
        let previous = previous.unwrap_or_else(|| empty_snapshot(source));

        // Step 1: acquire a rate-limit slot, fetch under a hard timeout.
        self.limiter.admit().await;
        let fetch_start = Instant::now();
        let raw = match tokio::time::timeout(self.fetch_timeout, self.plugin.fetch_raw()).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.abort(source, previous, stats, run_start, e).await,
            Err(_) => {
                return self
                    .abort(
                        source,
                        previous,
                        stats,
                        run_start,
                        PluginError::NetworkFailure(format!(
                            "fetch_raw exceeded {:?} timeout",
                            self.fetch_timeout
                        )),
                    )
                    .await
            }
        };
        stats.fetch_ms = fetch_start.elapsed().as_millis() as u64;
        stats.fetched_records = raw.len();
        self.limiter.on_success().await;

        // Step 2: persist the raw payload opaque for debugging/replay.
        if let Some(dir) = &self.raw_archive_dir {
            if let Err(e) = archive_raw(dir, source, &raw).await {
                warn!(source, error = %e, "failed to archive raw payload");
            }
        }

        // Step 3: normalize.
        let normalize_start = Instant::now();
        let raw_events = match self.plugin.normalize(raw).await {
            Ok(events) => events,
            Err(e) => return self.abort(source, previous, stats, run_start, e).await,
        };
        stats.normalize_ms = normalize_start.elapsed().as_millis() as u64;

        // Step 4: validate, drop invalid, classify run severity.
        let validate_start = Instant::now();
        let batch = self.sanitizer.validate_batch(&raw_events);
        stats.validate_ms = validate_start.elapsed().as_millis() as u64;
        stats.valid_records = batch.valid.len();
        stats.invalid_records = batch.invalid.len();

        let total = stats.valid_records + stats.invalid_records;
        stats.severity = if total > 0 && stats.invalid_records * 2 > total {
            Some(Severity::High)
        } else if stats.invalid_records > 0 {
            Some(Severity::Medium)
        } else {
            None
        };
        for invalid in &batch.invalid {
            stats.errors.extend(invalid.errors.iter().cloned());
        }

        // Step 5: diff against the previous snapshot, merge.
        let change_set = change::diff(batch.valid, &previous.gigs);
        stats.new_count = change_set.new_count;
        stats.updated_count = change_set.updated_count;
        stats.unchanged_count = change_set.unchanged_count;

        let snapshot = SourceSnapshot {
            source: source.to_string(),
            gigs: change_set.merged,
            metadata: SnapshotMetadata {
                last_run: Utc::now(),
                source: source.to_string(),
                errors: stats.errors.clone(),
            },
        };

        // Step 6: persist the snapshot atomically; write through both
        // back ends when enabled (§4.13).
        let save_start = Instant::now();
        if let Some(store) = &self.snapshot_store {
            if let Err(e) = store.save_snapshot(&snapshot).await {
                error!(source, error = %e, "failed to persist snapshot");
                stats.errors.push(format!("snapshot persistence failed: {e}"));
            }
        }
        if let Some(store) = &self.document_store {
            for event in &snapshot.gigs {
                if let Err(e) = store.upsert(event).await {
                    warn!(source, gig_id = %event.id, error = %e, "failed to upsert gig document");
                }
            }
        }
        stats.save_ms = save_start.elapsed().as_millis() as u64;

        // Step 7: finalize run stats.
        stats.total_ms = run_start.elapsed().as_millis() as u64;
        stats.succeeded = true;
        info!(source, stats = %stats, "ingestion run complete");

        RunOutcome { snapshot, stats }
    }

    /// Network/parse failures abort the run: record a critical error,
    /// leave the prior snapshot untouched, raise backoff (§4.4).
    async fn abort(
        &self,
        source: &str,
        previous: SourceSnapshot,
        mut stats: RunStats,
        run_start: Instant,
        err: PluginError,
    ) -> RunOutcome {
        self.limiter.on_failure().await;
        stats.severity = Some(Severity::Critical);
        stats.errors.push(err.to_string());
        stats.total_ms = run_start.elapsed().as_millis() as u64;
        stats.succeeded = false;
        error!(source, error = %err, "ingestion run aborted");
        RunOutcome {
            snapshot: previous,
            stats,
        }
    }
}

fn empty_snapshot(source: &str) -> SourceSnapshot {
    SourceSnapshot {
        source: source.to_string(),
        gigs: Vec::<Event>::new(),
        metadata: SnapshotMetadata {
            last_run: Utc::now(),
            source: source.to_string(),
            errors: Vec::new(),
        },
    }
}

async fn archive_raw(
    dir: &std::path::Path,
    source: &str,
    raw: &[gigsignal_plugin::RawRecord],
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{source}-{}.json", Utc::now().timestamp_millis()));
    let json = serde_json::to_vec_pretty(raw)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigsignal_plugin::fixtures::{sample_raw_event, FixturePlugin};

    fn sanitizer() -> Sanitizer {
        Sanitizer::new(true)
    }

    #[tokio::test]
    async fn first_run_classifies_everything_as_new() {
        let events = vec![sample_raw_event("ra", "Show One"), sample_raw_event("ra", "Show Two")];
        let plugin = Arc::new(FixturePlugin::new("ra", events));
        let limiter = Arc::new(RateLimiter::new(60));
        let worker = IngestionWorker::new(plugin, limiter, sanitizer());

        let outcome = worker.run_once("ra", None).await;
        assert!(outcome.stats.succeeded);
        assert_eq!(outcome.stats.new_count, 2);
        assert_eq!(outcome.snapshot.gigs.len(), 2);
    }

    #[tokio::test]
    async fn second_run_with_identical_data_is_unchanged() {
        let events = vec![sample_raw_event("ra", "Show One")];
        let plugin = Arc::new(FixturePlugin::new("ra", events));
        let limiter = Arc::new(RateLimiter::new(60));
        let worker = IngestionWorker::new(plugin, limiter, sanitizer());

        let first = worker.run_once("ra", None).await;
        let second = worker.run_once("ra", Some(first.snapshot)).await;

        assert_eq!(second.stats.unchanged_count, 1);
        assert_eq!(second.stats.new_count, 0);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_and_preserves_previous_snapshot() {
        let events = vec![sample_raw_event("ra", "Show One")];
        let plugin = Arc::new(FixturePlugin::new("ra", events));
        let limiter = Arc::new(RateLimiter::new(60));
        let worker = IngestionWorker::new(plugin, limiter.clone(), sanitizer());
        let first = worker.run_once("ra", None).await;

        let failing_plugin = Arc::new(FixturePlugin::failing("ra"));
        let failing_worker = IngestionWorker::new(failing_plugin, limiter, sanitizer());
        let second = failing_worker.run_once("ra", Some(first.snapshot.clone())).await;

        assert!(!second.stats.succeeded);
        assert_eq!(second.stats.severity, Some(Severity::Critical));
        assert_eq!(second.snapshot.gigs.len(), first.snapshot.gigs.len());
    }
}
