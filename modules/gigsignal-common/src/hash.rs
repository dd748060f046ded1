//! Content hashing and identity derivation (§4.1).
//!
//! All three functions are pure and deterministic: byte-identical inputs
//! produce byte-identical outputs, which is what lets the Change Detector
//! (C5) and Deduplicator (C7) compare records across ingestion runs.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::text::normalize_text;
use crate::types::Event;

/// SHA-256 over a canonical serialization of the content-bearing fields only
/// (§3, §4.1). Keys are sorted (via `BTreeMap`) and arrays keep their order.
/// Optional fields that are absent are omitted entirely rather than encoded
/// as `null`, so filling in an optional field later does not look like a
/// field going from null to non-null in the hash input — it looks like a key
/// appearing, which is exactly the semantic we want: absence is not content.
pub fn content_hash(event: &Event) -> String {
    let mut fields: BTreeMap<&'static str, serde_json::Value> = BTreeMap::new();

    fields.insert("title", serde_json::Value::String(event.title.clone()));
    fields.insert(
        "artists",
        serde_json::Value::Array(
            event
                .artists
                .iter()
                .map(|a| serde_json::Value::String(a.clone()))
                .collect(),
        ),
    );
    fields.insert(
        "tags",
        serde_json::Value::Array(
            event
                .tags
                .iter()
                .map(|t| serde_json::Value::String(t.clone()))
                .collect(),
        ),
    );
    fields.insert(
        "date_start",
        serde_json::Value::String(event.date_start.to_rfc3339()),
    );
    if let Some(end) = event.date_end {
        fields.insert("date_end", serde_json::Value::String(end.to_rfc3339()));
    }

    let mut venue = BTreeMap::new();
    venue.insert("name", serde_json::Value::String(event.venue.name.clone()));
    if let Some(addr) = &event.venue.address {
        venue.insert("address", serde_json::Value::String(addr.clone()));
    }
    if let Some(city) = &event.venue.city {
        venue.insert("city", serde_json::Value::String(city.clone()));
    }
    if let Some(country) = &event.venue.country {
        venue.insert("country", serde_json::Value::String(country.clone()));
    }
    if let Some(lat) = event.venue.lat {
        venue.insert(
            "lat",
            serde_json::Number::from_f64(lat)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
    }
    if let Some(lng) = event.venue.lng {
        venue.insert(
            "lng",
            serde_json::Number::from_f64(lng)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
    }
    fields.insert("venue", serde_json::to_value(venue).unwrap_or_default());

    let mut price = BTreeMap::new();
    if let Some(min) = event.price.min {
        price.insert(
            "min",
            serde_json::Number::from_f64(min)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
    }
    if let Some(max) = event.price.max {
        price.insert(
            "max",
            serde_json::Number::from_f64(max)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        );
    }
    if let Some(currency) = &event.price.currency {
        price.insert("currency", serde_json::Value::String(currency.clone()));
    }
    if !price.is_empty() {
        fields.insert("price", serde_json::to_value(price).unwrap_or_default());
    }

    if let Some(age) = &event.age_restriction {
        fields.insert("age_restriction", serde_json::Value::String(age.clone()));
    }
    fields.insert(
        "status",
        serde_json::Value::String(event.status.to_string()),
    );
    if let Some(url) = &event.tickets_url {
        fields.insert("tickets_url", serde_json::Value::String(url.clone()));
    }
    if let Some(url) = &event.event_url {
        fields.insert("event_url", serde_json::Value::String(url.clone()));
    }
    fields.insert(
        "images",
        serde_json::Value::Array(
            event
                .images
                .iter()
                .map(|i| serde_json::Value::String(i.clone()))
                .collect(),
        ),
    );

    let canonical = match serde_json::to_string(&fields) {
        Ok(s) => s,
        // Non-serializable input (e.g. a NaN float slipped through field
        // construction) is treated downstream as "non-hashable" (§4.1 edge
        // case): return the sentinel empty string rather than panicking.
        Err(_) => return String::new(),
    };

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable opaque identifier, derived from
/// `slug(venue.name + title + dateStart + city)` (§3, §4.1).
///
/// Byte-identical for byte-identical `(venue.name, title, dateStart, city)`.
pub fn stable_id(venue_name: &str, title: &str, date_start_iso: &str, city: Option<&str>) -> String {
    slug(&format!(
        "{}-{}-{}-{}",
        venue_name,
        title,
        date_start_iso,
        city.unwrap_or("")
    ))
}

pub fn stable_id_for(event: &Event) -> String {
    stable_id(
        &event.venue.name,
        &event.title,
        &event.date_start.to_rfc3339(),
        event.venue.city.as_deref(),
    )
}

/// Lower-cased, whitespace-collapsed, non-alphanumeric-stripped slug.
fn slug(input: &str) -> String {
    let lowered = input.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_sep = false;
    for ch in lowered.chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('-');
            last_was_sep = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Five normalized components used to bucket candidates for cross-source
/// matching (§3 "Fuzzy key", §4.1). Not stored — recomputed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuzzyKey {
    pub venue_token: String,
    pub title_token: String,
    pub city_token: String,
    /// Date rounded to the hour, formatted `YYYY-MM-DDTHH`, or empty when the
    /// event carries no usable date (§4.1 edge case).
    pub date_hour: String,
    pub main_artist_token: String,
}

impl FuzzyKey {
    /// SHA-256 digest of the five components joined with `|`, used as a
    /// quick equality/comparison hash.
    pub fn digest(&self) -> String {
        let joined = format!(
            "{}|{}|{}|{}|{}",
            self.venue_token, self.title_token, self.city_token, self.date_hour, self.main_artist_token
        );
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Bucket key over venue + calendar day — coarser than the full fuzzy
    /// key, used by the Deduplicator's first bucketing pass (§4.7).
    pub fn venue_day_bucket(&self) -> String {
        format!("{}|{}", self.venue_token, &self.date_hour.get(..10).unwrap_or(&self.date_hour))
    }

    /// Bucket key over city + calendar day.
    pub fn city_day_bucket(&self) -> String {
        format!("{}|{}", self.city_token, &self.date_hour.get(..10).unwrap_or(&self.date_hour))
    }
}

pub fn fuzzy_key(event: &Event) -> FuzzyKey {
    let date_hour = event.date_start.format("%Y-%m-%dT%H").to_string();
    let main_artist = event.artists.first().map(|s| s.as_str()).unwrap_or("");

    FuzzyKey {
        venue_token: normalize_text(&event.venue.name, crate::text::NormalizeMode::Venue),
        title_token: normalize_text(&event.title, crate::text::NormalizeMode::Title),
        city_token: normalize_text(event.venue.city.as_deref().unwrap_or(""), crate::text::NormalizeMode::Plain),
        date_hour,
        main_artist_token: normalize_text(main_artist, crate::text::NormalizeMode::Plain),
    }
}

/// SHA-256 over `{norm(venue)|norm(title)|dateStart|norm(city)}`, used as a
/// regenerated `id` after a merge when original IDs are not preserved
/// (§4.1, §4.6).
pub fn composite_key(event: &Event) -> String {
    let norm_venue = normalize_text(&event.venue.name, crate::text::NormalizeMode::Venue);
    let norm_title = normalize_text(&event.title, crate::text::NormalizeMode::Title);
    let norm_city = normalize_text(event.venue.city.as_deref().unwrap_or(""), crate::text::NormalizeMode::Plain);
    let joined = format!(
        "{}|{}|{}|{}",
        norm_venue,
        norm_title,
        event.date_start.to_rfc3339(),
        norm_city
    );
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}
