use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a scheduled performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Cancelled,
    Postponed,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Scheduled => write!(f, "scheduled"),
            EventStatus::Cancelled => write!(f, "cancelled"),
            EventStatus::Postponed => write!(f, "postponed"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "cancelled" => Ok(Self::Cancelled),
            "postponed" => Ok(Self::Postponed),
            other => Err(format!("unknown EventStatus: {other}")),
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::Scheduled
    }
}

/// The venue a performance takes place at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Venue {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Ticket price range. `min`/`max` of `None` means unknown, not free.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Price {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Canonical event record (§3 of the platform specification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub date_start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    pub venue: Venue,
    #[serde(default)]
    pub price: Price,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_restriction: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,

    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub hash: String,

    /// Set by the Change Detector for the lifetime of one ingestion run;
    /// never persisted across runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_updated: Option<bool>,
}

impl Event {
    /// Arrays are deduplicated after normalization (§3 invariant).
    pub fn dedupe_arrays(&mut self) {
        dedupe_preserve_order(&mut self.artists);
        dedupe_preserve_order(&mut self.tags);
        dedupe_preserve_order(&mut self.images);
    }
}

pub fn dedupe_preserve_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// The set of validated, change-classified records produced by the latest
/// ingestion run for one source (§3 "Per-source snapshot").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceSnapshot {
    pub source: String,
    pub gigs: Vec<Event>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SnapshotMetadata {
    pub last_run: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// The deduplicated union over all snapshots (§3 "Catalog").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Catalog {
    pub gigs: Vec<Event>,
    pub source_stats: SourceStats,
    pub metadata: CatalogMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SourceStats {
    pub per_source: std::collections::BTreeMap<String, PerSourceCounters>,
    pub totals: PerSourceCounters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PerSourceCounters {
    pub original: usize,
    pub after_dedup: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CatalogMetadata {
    pub version: u64,
    pub generated_at: DateTime<Utc>,
    pub dedup_counters: PerSourceCounters,
    pub processing_time_ms: u64,
    pub source_count: usize,
    pub total_processed: usize,
}

/// A catalog-to-catalog diff, computed independent of snapshot presence
/// (§4.8): a record can be `removed` here even though the per-source Change
/// Detector never emits deletions (§4.5, §9 open question).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CatalogDiff {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}
