//! Per-source error log (§4.14, §6): `{timestamp, source, error, severity,
//! context, stack?}`, appended to a per-day file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gigsignal_common::Severity;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub error: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorLogEntry {
    pub fn new(source: impl Into<String>, error: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            error: error.into(),
            severity,
            context: None,
            stack: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Appends entries to `{log_dir}/errors/{YYYY-MM-DD}.jsonl`, one JSON
/// object per line — cheap to tail, cheap to append to concurrently from
/// independent source workers.
pub struct ErrorLog {
    log_dir: PathBuf,
}

impl ErrorLog {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self { log_dir: log_dir.into() }
    }

    pub async fn append(&self, entry: &ErrorLogEntry) -> anyhow::Result<()> {
        let dir = self.log_dir.join("errors");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_writes_one_jsonl_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let log = ErrorLog::new(dir.path());

        log.append(&ErrorLogEntry::new("ra", "timeout", Severity::Critical)).await.unwrap();
        log.append(&ErrorLogEntry::new("ra", "parse error", Severity::Medium)).await.unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let path = dir.path().join("errors").join(format!("{today}.jsonl"));
        let contents = tokio::fs::read_to_string(path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
