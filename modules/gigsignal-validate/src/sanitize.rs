//! Per-record sanitization and batch validation (§4.12).
//!
//! Grounded in `rootsignal-common::safety`'s regex/`LazyLock` style, applied
//! here to schema validity instead of PII detection.

use std::sync::LazyLock;

use chrono::Utc;
use gigsignal_common::{dedupe_preserve_order, normalize_currency, Event, EventStatus, Price, Venue};
use regex::Regex;

use crate::raw::RawEvent;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://[^\s]+$").unwrap());

/// One validation problem, tagged with the §4.12 error kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    InvalidGigData,
    MissingRequiredField,
    InvalidDateFormat,
    InvalidVenueData,
    InvalidPriceData,
    InvalidUrlFormat,
}

impl Issue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Sanitizes and validates `RawEvent`s into canonical `Event`s.
pub struct Sanitizer {
    pub auto_fix: bool,
}

impl Sanitizer {
    pub fn new(auto_fix: bool) -> Self {
        Self { auto_fix }
    }

    /// Validate (and, if `auto_fix` is set, repair) one record.
    ///
    /// Returns `Ok(event)` when the record is usable (possibly after
    /// autofix), alongside any warnings recorded along the way, or `Err`
    /// with the accumulated errors when the record must be dropped.
    pub fn sanitize(&self, raw: &RawEvent) -> (Result<Event, Vec<Issue>>, Vec<Issue>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let title = match &raw.title {
            Some(t) if !t.trim().is_empty() => t.clone(),
            _ if self.auto_fix => {
                warnings.push(Issue::new(IssueKind::MissingRequiredField, "title missing, defaulted"));
                "Untitled Event".to_string()
            }
            _ => {
                errors.push(Issue::new(IssueKind::MissingRequiredField, "title is required"));
                String::new()
            }
        };

        let venue_name = match &raw.venue_name {
            Some(v) if !v.trim().is_empty() => v.clone(),
            _ if self.auto_fix => {
                warnings.push(Issue::new(IssueKind::InvalidVenueData, "venue.name missing, defaulted"));
                "Unknown Venue".to_string()
            }
            _ => {
                errors.push(Issue::new(IssueKind::InvalidVenueData, "venue.name is required"));
                String::new()
            }
        };

        let date_start = match raw.date_start {
            Some(d) => d,
            None => {
                errors.push(Issue::new(IssueKind::InvalidDateFormat, "date_start is required and was unparseable"));
                Utc::now()
            }
        };

        if let Some(end) = raw.date_end {
            if end < date_start {
                errors.push(Issue::new(
                    IssueKind::InvalidDateFormat,
                    "date_end precedes date_start",
                ));
            }
        }

        let currency = match (&raw.price_currency, normalize_currency(raw.price_currency.as_deref())) {
            (Some(_), None) if self.auto_fix => {
                warnings.push(Issue::new(IssueKind::InvalidPriceData, "currency not a 3-letter code, dropped"));
                None
            }
            (Some(_), None) => {
                errors.push(Issue::new(IssueKind::InvalidPriceData, "currency is not a 3-letter code"));
                None
            }
            (_, normalized) => normalized,
        };

        if let (Some(min), Some(max)) = (raw.price_min, raw.price_max) {
            if min > max {
                errors.push(Issue::new(IssueKind::InvalidPriceData, "price.min exceeds price.max"));
            }
        }

        let tickets_url = sanitize_url(raw.tickets_url.as_deref(), self.auto_fix, &mut errors, &mut warnings);
        let event_url = sanitize_url(raw.event_url.as_deref(), self.auto_fix, &mut errors, &mut warnings);

        let status = match &raw.status {
            Some(s) => match s.parse::<EventStatus>() {
                Ok(st) => st,
                Err(_) if self.auto_fix => {
                    warnings.push(Issue::new(IssueKind::InvalidGigData, "unknown status, defaulted to scheduled"));
                    EventStatus::Scheduled
                }
                Err(_) => {
                    errors.push(Issue::new(IssueKind::InvalidGigData, "unknown status value"));
                    EventStatus::Scheduled
                }
            },
            None => EventStatus::Scheduled,
        };

        if !errors.is_empty() {
            return (Err(errors), warnings);
        }

        let mut artists = raw.artists.clone();
        let mut tags = raw.tags.clone();
        let mut images = raw.images.clone();
        dedupe_preserve_order(&mut artists);
        dedupe_preserve_order(&mut tags);
        dedupe_preserve_order(&mut images);

        let now = Utc::now();
        let mut event = Event {
            id: String::new(),
            source: raw.source.clone(),
            source_id: raw.source_id.clone(),
            title,
            artists,
            tags,
            date_start,
            date_end: raw.date_end,
            timezone: raw.timezone.clone(),
            venue: Venue {
                name: venue_name,
                address: raw.venue_address.clone(),
                city: raw.venue_city.clone(),
                country: raw.venue_country.clone(),
                lat: raw.venue_lat,
                lng: raw.venue_lng,
            },
            price: Price {
                min: raw.price_min,
                max: raw.price_max,
                currency,
            },
            age_restriction: raw.age_restriction.clone(),
            status,
            tickets_url,
            event_url,
            images,
            updated_at: now,
            first_seen_at: None,
            last_seen_at: None,
            hash: String::new(),
            is_new: None,
            is_updated: None,
        };

        event.id = gigsignal_common::stable_id_for(&event);
        event.hash = gigsignal_common::content_hash(&event);

        (Ok(event), warnings)
    }

    pub fn validate_batch(&self, raws: &[RawEvent]) -> BatchValidation {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        let mut total_errors = 0;
        let mut total_warnings = 0;

        for raw in raws {
            let (outcome, warnings) = self.sanitize(raw);
            total_warnings += warnings.len();
            match outcome {
                Ok(event) => valid.push(event),
                Err(errors) => {
                    total_errors += errors.len();
                    invalid.push(InvalidRecord {
                        record: serde_json::to_value(raw).unwrap_or(serde_json::Value::Null),
                        errors: errors.into_iter().map(|i| i.message).collect(),
                        warnings: warnings.into_iter().map(|i| i.message).collect(),
                    });
                }
            }
        }

        BatchValidation {
            valid,
            invalid,
            total_errors,
            total_warnings,
        }
    }
}

fn sanitize_url(
    url: Option<&str>,
    auto_fix: bool,
    errors: &mut Vec<Issue>,
    warnings: &mut Vec<Issue>,
) -> Option<String> {
    let raw = url?;
    if URL_RE.is_match(raw) {
        return Some(raw.to_string());
    }
    if auto_fix {
        warnings.push(Issue::new(IssueKind::InvalidUrlFormat, format!("dropped invalid url: {raw}")));
        None
    } else {
        errors.push(Issue::new(IssueKind::InvalidUrlFormat, format!("invalid url: {raw}")));
        None
    }
}

#[derive(Debug, Clone)]
pub struct InvalidRecord {
    pub record: serde_json::Value,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchValidation {
    pub valid: Vec<Event>,
    pub invalid: Vec<InvalidRecord>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawEvent {
        RawEvent {
            source: "test-source".into(),
            title: Some("Rock Concert".into()),
            venue_name: Some("The Venue".into()),
            date_start: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_record_passes_through() {
        let sanitizer = Sanitizer::new(false);
        let (outcome, warnings) = sanitizer.sanitize(&minimal_raw());
        assert!(outcome.is_ok());
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_title_without_autofix_is_an_error() {
        let mut raw = minimal_raw();
        raw.title = None;
        let sanitizer = Sanitizer::new(false);
        let (outcome, _) = sanitizer.sanitize(&raw);
        assert!(outcome.is_err());
    }

    #[test]
    fn missing_title_with_autofix_defaults() {
        let mut raw = minimal_raw();
        raw.title = None;
        let sanitizer = Sanitizer::new(true);
        let (outcome, warnings) = sanitizer.sanitize(&raw);
        let event = outcome.expect("autofix should repair missing title");
        assert_eq!(event.title, "Untitled Event");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn invalid_url_is_dropped_with_autofix() {
        let mut raw = minimal_raw();
        raw.tickets_url = Some("not-a-url".into());
        let sanitizer = Sanitizer::new(true);
        let (outcome, warnings) = sanitizer.sanitize(&raw);
        let event = outcome.unwrap();
        assert!(event.tickets_url.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn currency_is_uppercased() {
        let mut raw = minimal_raw();
        raw.price_currency = Some("usd".into());
        let sanitizer = Sanitizer::new(false);
        let (outcome, _) = sanitizer.sanitize(&raw);
        assert_eq!(outcome.unwrap().price.currency, Some("USD".to_string()));
    }

    #[test]
    fn batch_validation_counts_errors_and_warnings() {
        let sanitizer = Sanitizer::new(true);
        let mut bad = minimal_raw();
        bad.title = None;
        bad.venue_name = None;
        let batch = sanitizer.validate_batch(&[minimal_raw(), bad]);
        assert_eq!(batch.valid.len(), 2);
        assert_eq!(batch.invalid.len(), 0);
        assert_eq!(batch.total_warnings, 2);
    }

    #[test]
    fn batch_validation_without_autofix_rejects_bad_records() {
        let sanitizer = Sanitizer::new(false);
        let mut bad = minimal_raw();
        bad.title = None;
        let batch = sanitizer.validate_batch(&[minimal_raw(), bad]);
        assert_eq!(batch.valid.len(), 1);
        assert_eq!(batch.invalid.len(), 1);
        assert_eq!(batch.total_errors, 1);
    }
}
