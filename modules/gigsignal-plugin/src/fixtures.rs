//! In-memory test plugin, grounded in the teacher's `scout::fixtures`/
//! `scout::testing` convention of hand-rolled in-memory stand-ins for
//! external adapters.

use async_trait::async_trait;
use chrono::Utc;
use gigsignal_validate::RawEvent;

use crate::{PluginError, RawRecord, ScraperPlugin, UpstreamMeta};

/// A plugin that always returns a fixed list of `RawEvent`s (already
/// normalized), for exercising the Ingestion Worker without network I/O.
pub struct FixturePlugin {
    pub name: String,
    pub rate_limit_per_min: u32,
    pub events: Vec<RawEvent>,
    pub fail_fetch: bool,
}

impl FixturePlugin {
    pub fn new(name: impl Into<String>, events: Vec<RawEvent>) -> Self {
        Self {
            name: name.into(),
            rate_limit_per_min: 60,
            events,
            fail_fetch: false,
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate_limit_per_min: 60,
            events: Vec::new(),
            fail_fetch: true,
        }
    }
}

#[async_trait]
impl ScraperPlugin for FixturePlugin {
    fn upstream_meta(&self) -> UpstreamMeta {
        UpstreamMeta {
            name: self.name.clone(),
            rate_limit_per_min: self.rate_limit_per_min,
            default_schedule: "0 */6 * * *".to_string(),
        }
    }

    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, PluginError> {
        if self.fail_fetch {
            return Err(PluginError::NetworkFailure("fixture configured to fail".into()));
        }
        Ok(self
            .events
            .iter()
            .map(|e| RawRecord {
                payload: serde_json::to_value(e).unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }

    async fn normalize(&self, raw: Vec<RawRecord>) -> Result<Vec<RawEvent>, PluginError> {
        raw.into_iter()
            .map(|r| {
                serde_json::from_value::<RawEvent>(r.payload)
                    .map_err(|e| PluginError::ParseFailure(e.to_string()))
            })
            .collect()
    }
}

/// Build a minimal valid `RawEvent` for tests.
pub fn sample_raw_event(source: &str, title: &str) -> RawEvent {
    RawEvent {
        source: source.to_string(),
        title: Some(title.to_string()),
        venue_name: Some("Test Venue".to_string()),
        venue_city: Some("Bristol".to_string()),
        date_start: Some(Utc::now()),
        ..Default::default()
    }
}
