//! Per-run statistics (§4.4 step 7).
//!
//! Grounded in `rootsignal-scout::pipeline::stats::ScoutStats`'s plain
//! counters-plus-`Display` shape.

use gigsignal_common::Severity;

/// Timings and counts for one `IngestionWorker::run_once` invocation.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub source: String,
    pub fetch_ms: u64,
    pub normalize_ms: u64,
    pub validate_ms: u64,
    pub save_ms: u64,
    pub total_ms: u64,

    pub fetched_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub new_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,

    pub errors: Vec<String>,
    pub severity: Option<Severity>,
    pub succeeded: bool,
}

impl RunStats {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Throughput in records/sec over `total_ms` (§4.14 perf log).
    pub fn throughput(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        self.valid_records as f64 / (self.total_ms as f64 / 1000.0)
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingestion run: {} ===", self.source)?;
        writeln!(f, "fetched:    {}", self.fetched_records)?;
        writeln!(f, "valid:      {}", self.valid_records)?;
        writeln!(f, "invalid:    {}", self.invalid_records)?;
        writeln!(
            f,
            "new/updated/unchanged: {}/{}/{}",
            self.new_count, self.updated_count, self.unchanged_count
        )?;
        writeln!(
            f,
            "timings (ms): fetch={} normalize={} validate={} save={} total={}",
            self.fetch_ms, self.normalize_ms, self.validate_ms, self.save_ms, self.total_ms
        )?;
        if let Some(severity) = self.severity {
            writeln!(f, "severity: {severity}")?;
        }
        if !self.errors.is_empty() {
            writeln!(f, "errors:")?;
            for e in &self.errors {
                writeln!(f, "  - {e}")?;
            }
        }
        Ok(())
    }
}
