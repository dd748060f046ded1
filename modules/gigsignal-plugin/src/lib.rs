//! Scraper plugin contract (§6, §4.3).
//!
//! Grounded in `taproot-core::ingestor::Ingestor` — a small `#[async_trait]`
//! interface the Ingestion Worker (C4) drives uniformly across sources.

use async_trait::async_trait;
use gigsignal_validate::RawEvent;
use thiserror::Error;

/// Opaque raw payload returned by `fetch_raw` — the worker persists this
/// as-is for debugging/replay before anything is normalized (§4.4 step 2).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawRecord {
    pub payload: serde_json::Value,
}

/// Metadata a plugin advertises about its upstream (§4.3).
#[derive(Debug, Clone)]
pub struct UpstreamMeta {
    pub name: String,
    pub rate_limit_per_min: u32,
    /// 5-field cron expression, e.g. `"0 */6 * * *"`.
    pub default_schedule: String,
}

/// Failures a plugin's `fetch_raw` may surface; these map onto the
/// Dependency kinds in §7 and abort the Ingestion Worker's run (§4.4).
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("parse failure: {0}")]
    ParseFailure(String),
}

/// Uniform interface every scraper implements (§6).
#[async_trait]
pub trait ScraperPlugin: Send + Sync {
    fn upstream_meta(&self) -> UpstreamMeta;

    /// Fetch raw, unnormalized records from the upstream source.
    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, PluginError>;

    /// Normalize raw records into the looser pre-validation `RawEvent`
    /// shape; must set `source`. Hash/id generation happens downstream in
    /// `gigsignal-validate`/`gigsignal-common` unless the plugin already
    /// populated them (§4.3).
    async fn normalize(&self, raw: Vec<RawRecord>) -> Result<Vec<RawEvent>, PluginError>;

    /// Optional teardown (connection pools, temp files, …).
    async fn cleanup(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub mod registry;
pub use registry::PluginRegistry;
