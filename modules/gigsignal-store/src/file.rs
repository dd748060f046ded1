//! Per-source snapshot file back end (§4.13).
//!
//! Grounded in `simweb::snapshot::RunLog::save/load`'s
//! serde_json-to-disk convention, made atomic with a `tempfile`
//! write-new-then-rename (the teacher already depends on `tempfile`
//! for scratch directories in `rootsignal-scout::pipeline::scraper`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use gigsignal_common::types::SourceSnapshot;
use gigsignal_common::{Error, Result};
use tokio::sync::Mutex;

/// Refresh window for the in-memory mtime cache (§4.13).
const CACHE_REFRESH_WINDOW: Duration = Duration::from_secs(5 * 60);

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save_snapshot(&self, snapshot: &SourceSnapshot) -> Result<()>;
    async fn load_snapshot(&self, source: &str) -> Result<Option<SourceSnapshot>>;
    async fn list_sources(&self) -> Result<Vec<String>>;
}

struct CacheEntry {
    mtime: SystemTime,
    snapshot: SourceSnapshot,
}

/// File-backed `SnapshotStore`: one JSON file per source under `base_dir`,
/// named `<source>.normalized.json`. Reads are served from an in-memory
/// cache keyed by file modification time, refreshed at most every five
/// minutes (§4.13).
pub struct FileSnapshotStore {
    base_dir: PathBuf,
    cache: Mutex<HashMap<String, (SystemTime, CacheEntry)>>,
}

impl FileSnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, source: &str) -> PathBuf {
        self.base_dir.join(format!("{source}.normalized.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save_snapshot(&self, snapshot: &SourceSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.source);
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
        write_atomic(&path, json.as_bytes())
            .await
            .map_err(Error::Anyhow)?;
        self.cache.lock().await.remove(&snapshot.source);
        Ok(())
    }

    async fn load_snapshot(&self, source: &str) -> Result<Option<SourceSnapshot>> {
        let path = self.path_for(source);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Anyhow(e.into())),
        };
        let mtime = meta.modified().map_err(|e| Error::Anyhow(e.into()))?;

        {
            let cache = self.cache.lock().await;
            if let Some((checked_at, entry)) = cache.get(source) {
                let fresh_enough = checked_at.elapsed().unwrap_or(Duration::MAX) < CACHE_REFRESH_WINDOW;
                if fresh_enough && entry.mtime == mtime {
                    return Ok(Some(entry.snapshot.clone()));
                }
            }
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| Error::Anyhow(e.into()))?;
        let snapshot: SourceSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CorruptSnapshot(e.to_string()))?;

        let mut cache = self.cache.lock().await;
        cache.insert(
            source.to_string(),
            (
                SystemTime::now(),
                CacheEntry {
                    mtime,
                    snapshot: snapshot.clone(),
                },
            ),
        );
        Ok(Some(snapshot))
    }

    async fn list_sources(&self) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sources),
            Err(e) => return Err(Error::Anyhow(e.into())),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::Anyhow(e.into()))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Some(source) = stem.strip_suffix(".normalized") {
                        sources.push(source.to_string());
                    }
                }
            }
        }
        sources.sort();
        Ok(sources)
    }
}

/// Write `bytes` to `path` atomically: stage in a temp file in the same
/// directory, then rename over the destination (§4.13, §5 ordering
/// guarantees — readers never observe a half-written file).
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;

    let dir = dir.to_path_buf();
    let bytes = bytes.to_vec();
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        std::io::Write::write_all(&mut tmp, &bytes)?;
        tmp.persist(&path)?;
        Ok(())
    })
    .await??;

    Ok(())
}
