use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a scraper plugin's `normalize()` actually produces before validation:
/// looser than `gigsignal_common::Event` because upstream data is messy.
/// Required-by-the-canonical-model fields are `Option` here on purpose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    pub source: String,
    pub source_id: Option<String>,

    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub timezone: Option<String>,

    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub venue_city: Option<String>,
    pub venue_country: Option<String>,
    pub venue_lat: Option<f64>,
    pub venue_lng: Option<f64>,

    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub price_currency: Option<String>,

    pub age_restriction: Option<String>,
    pub status: Option<String>,
    pub tickets_url: Option<String>,
    pub event_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}
