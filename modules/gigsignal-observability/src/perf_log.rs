//! Per-source performance log (§4.14, §6): `{timestamp, source,
//! metrics{...}}` — fetch/normalize/validate/save timings, a coarse memory
//! snapshot, and throughput, derived from a completed `RunStats`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gigsignal_ingest::RunStats;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PerfMetrics {
    pub fetch_ms: u64,
    pub normalize_ms: u64,
    pub validate_ms: u64,
    pub save_ms: u64,
    pub total_ms: u64,
    pub throughput_records_per_sec: f64,
    /// Resident set size in bytes at the time the entry was recorded, best
    /// effort (`None` on platforms without `/proc/self/statm`).
    pub memory_rss_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerfLogEntry {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub metrics: PerfMetrics,
}

impl PerfLogEntry {
    pub fn from_stats(stats: &RunStats) -> Self {
        Self {
            timestamp: Utc::now(),
            source: stats.source.clone(),
            metrics: PerfMetrics {
                fetch_ms: stats.fetch_ms,
                normalize_ms: stats.normalize_ms,
                validate_ms: stats.validate_ms,
                save_ms: stats.save_ms,
                total_ms: stats.total_ms,
                throughput_records_per_sec: stats.throughput(),
                memory_rss_bytes: current_rss_bytes(),
            },
        }
    }
}

/// Appends entries to `{log_dir}/perf/{YYYY-MM-DD}.jsonl`.
pub struct PerfLog {
    log_dir: PathBuf,
}

impl PerfLog {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub async fn append(&self, entry: &PerfLogEntry) -> anyhow::Result<()> {
        let dir = self.log_dir.join("perf");
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.jsonl", entry.timestamp.format("%Y-%m-%d")));

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn current_rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn current_rss_bytes() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_writes_a_perf_entry_with_timings() {
        let dir = tempfile::tempdir().unwrap();
        let log = PerfLog::new(dir.path());

        let mut stats = RunStats::new("ra");
        stats.fetch_ms = 120;
        stats.total_ms = 500;
        stats.valid_records = 10;

        log.append(&PerfLogEntry::from_stats(&stats)).await.unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let path = dir.path().join("perf").join(format!("{today}.jsonl"));
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        assert!(contents.contains("\"fetch_ms\":120"));
    }
}
