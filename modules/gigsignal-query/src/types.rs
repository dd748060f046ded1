//! List/detail query shapes served to the (external) HTTP shell (§4.11).

use gigsignal_cache::CacheHit;
use gigsignal_common::types::Event;
use gigsignal_common::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    Today,
    Week,
    Month,
    All,
}

impl TimeRange {
    /// Hour windows for each preset (§4.10): `24 / 168 / 720 / 8760`.
    pub fn hours(self) -> u64 {
        match self {
            TimeRange::Today => 24,
            TimeRange::Week => 168,
            TimeRange::Month => 720,
            TimeRange::All => 8760,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, Error> {
        match raw {
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            other => Err(Error::InvalidQuery(format!(
                "timeRange must be one of today|week|month|all, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    Date,
    Name,
    Venue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilters {
    pub genres: Option<Vec<String>>,
    pub venues: Option<Vec<String>>,
    pub price_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOptions {
    pub page: usize,
    pub limit: usize,
    pub time_range: TimeRange,
    pub sort_by: SortBy,
    pub filters: ListFilters,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 50,
            time_range: TimeRange::All,
            sort_by: SortBy::Date,
            filters: ListFilters::default(),
        }
    }
}

impl ListOptions {
    /// Validate and clamp per §4.11: `timeRange` must already be a parsed
    /// `TimeRange` (callers validate the raw string via `TimeRange::parse`
    /// before any fetch); page/limit are clamped rather than rejected.
    pub fn normalize(mut self) -> Self {
        if self.page < 1 {
            self.page = 1;
        }
        self.limit = self.limit.clamp(1, 100);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub data: Vec<Event>,
    pub total_count: usize,
    pub has_more: bool,
    pub cache_hit: CacheHit,
}
