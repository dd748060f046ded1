//! Trust & Merge (§4.6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gigsignal_common::types::Event;
use gigsignal_common::{composite_key, content_hash, dedupe_preserve_order};

const DEFAULT_TRUST_SCORE: u8 = 50;

/// Per-source trust scores in `[0, 100]` (§4.6). Falls back to a neutral
/// default for unregistered sources.
#[derive(Debug, Clone, Default)]
pub struct TrustRegistry {
    scores: HashMap<String, u8>,
}

impl TrustRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(scores: HashMap<String, u8>) -> Self {
        Self { scores }
    }

    pub fn set(&mut self, source: impl Into<String>, score: u8) {
        self.scores.insert(source.into(), score.min(100));
    }

    /// Resolve a source's trust score, honoring a per-call override map
    /// ahead of the registry's configured defaults (§4.6).
    pub fn score(&self, source: &str, overrides: Option<&HashMap<String, u8>>) -> u8 {
        overrides
            .and_then(|o| o.get(source))
            .copied()
            .or_else(|| self.scores.get(source).copied())
            .unwrap_or(DEFAULT_TRUST_SCORE)
    }
}

/// Rank `events` by trust score descending, `updatedAt` descending, then
/// `source` ascending — the order both `most_trusted` and `merge` use
/// (§4.6).
fn rank<'a>(
    events: &'a [Event],
    registry: &TrustRegistry,
    overrides: Option<&HashMap<String, u8>>,
) -> Vec<&'a Event> {
    let mut ranked: Vec<&Event> = events.iter().collect();
    ranked.sort_by(|a, b| {
        let score_a = registry.score(&a.source, overrides);
        let score_b = registry.score(&b.source, overrides);
        score_b
            .cmp(&score_a)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.source.cmp(&b.source))
    });
    ranked
}

/// The event whose source has the highest trust score; ties broken by
/// `updatedAt` (latest wins), then lexicographic source (§4.6).
pub fn most_trusted<'a>(
    events: &'a [Event],
    registry: &TrustRegistry,
    overrides: Option<&HashMap<String, u8>>,
) -> Option<&'a Event> {
    rank(events, registry, overrides).into_iter().next()
}

/// Merge a group of events representing the same real-world gig (§4.6).
/// Scalar fields come from the most-trusted source, falling back through
/// the trust ranking for any field the top source leaves empty. Set-valued
/// fields union across all events, preserving order of first occurrence by
/// trust rank. `id`/`hash` are recomputed from the merged result.
pub fn merge(events: &[Event], registry: &TrustRegistry, overrides: Option<&HashMap<String, u8>>) -> Option<Event> {
    let ranked = rank(events, registry, overrides);
    let mut iter = ranked.into_iter();
    let top = iter.next()?;
    let rest: Vec<&Event> = iter.collect();

    let mut merged = top.clone();

    macro_rules! fill_scalar {
        ($field:ident) => {
            if merged.$field.is_none() {
                merged.$field = rest.iter().find_map(|e| e.$field.clone());
            }
        };
    }
    fill_scalar!(source_id);
    fill_scalar!(timezone);
    fill_scalar!(date_end);
    fill_scalar!(age_restriction);
    fill_scalar!(tickets_url);
    fill_scalar!(event_url);

    if merged.venue.address.is_none() {
        merged.venue.address = rest.iter().find_map(|e| e.venue.address.clone());
    }
    if merged.venue.city.is_none() {
        merged.venue.city = rest.iter().find_map(|e| e.venue.city.clone());
    }
    if merged.venue.country.is_none() {
        merged.venue.country = rest.iter().find_map(|e| e.venue.country.clone());
    }
    if merged.venue.lat.is_none() {
        merged.venue.lat = rest.iter().find_map(|e| e.venue.lat);
    }
    if merged.venue.lng.is_none() {
        merged.venue.lng = rest.iter().find_map(|e| e.venue.lng);
    }
    if merged.price.min.is_none() {
        merged.price.min = rest.iter().find_map(|e| e.price.min);
    }
    if merged.price.max.is_none() {
        merged.price.max = rest.iter().find_map(|e| e.price.max);
    }
    if merged.price.currency.is_none() {
        merged.price.currency = rest.iter().find_map(|e| e.price.currency.clone());
    }

    let mut artists = top.artists.clone();
    let mut tags = top.tags.clone();
    let mut images = top.images.clone();
    for e in &rest {
        artists.extend(e.artists.iter().cloned());
        tags.extend(e.tags.iter().cloned());
        images.extend(e.images.iter().cloned());
    }
    dedupe_preserve_order(&mut artists);
    dedupe_preserve_order(&mut tags);
    dedupe_preserve_order(&mut images);
    merged.artists = artists;
    merged.tags = tags;
    merged.images = images;

    let all = std::iter::once(top).chain(rest.iter().copied());
    merged.first_seen_at = min_option(all.clone().filter_map(|e| e.first_seen_at));
    merged.last_seen_at = max_option(all.clone().filter_map(|e| e.last_seen_at));
    merged.updated_at = max_option(all.map(|e| e.updated_at)).unwrap_or(merged.updated_at);

    merged.id = composite_key(&merged);
    merged.hash = content_hash(&merged);
    merged.is_new = None;
    merged.is_updated = None;

    Some(merged)
}

fn min_option(iter: impl Iterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    iter.min()
}

fn max_option(iter: impl Iterator<Item = DateTime<Utc>>) -> Option<DateTime<Utc>> {
    iter.max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigsignal_common::types::{EventStatus, Price, Venue};
    use chrono::TimeZone;

    fn event(source: &str, updated_at: DateTime<Utc>) -> Event {
        Event {
            id: format!("{source}-id"),
            source: source.to_string(),
            source_id: None,
            title: "Rock Night".to_string(),
            artists: vec!["Band A".to_string()],
            tags: vec!["rock".to_string()],
            date_start: Utc.with_ymd_and_hms(2026, 8, 1, 20, 0, 0).unwrap(),
            date_end: None,
            timezone: None,
            venue: Venue {
                name: "The Venue".to_string(),
                address: None,
                city: Some("Bristol".to_string()),
                country: None,
                lat: None,
                lng: None,
            },
            price: Price::default(),
            age_restriction: None,
            status: EventStatus::Scheduled,
            tickets_url: None,
            event_url: None,
            images: vec![],
            updated_at,
            first_seen_at: Some(updated_at),
            last_seen_at: Some(updated_at),
            hash: String::new(),
            is_new: None,
            is_updated: None,
        }
    }

    #[test]
    fn most_trusted_picks_highest_score() {
        let mut registry = TrustRegistry::new();
        registry.set("ticketmaster", 90);
        registry.set("scraped-blog", 20);
        let now = Utc::now();
        let events = vec![event("scraped-blog", now), event("ticketmaster", now)];

        let winner = most_trusted(&events, &registry, None).unwrap();
        assert_eq!(winner.source, "ticketmaster");
    }

    #[test]
    fn ties_broken_by_latest_updated_at_then_source() {
        let registry = TrustRegistry::new();
        let older = Utc::now() - chrono::Duration::hours(2);
        let newer = Utc::now();
        let events = vec![event("zzz-source", older), event("aaa-source", newer)];

        let winner = most_trusted(&events, &registry, None).unwrap();
        assert_eq!(winner.source, "aaa-source");
    }

    #[test]
    fn merge_unions_set_valued_fields_preserving_first_occurrence() {
        let mut registry = TrustRegistry::new();
        registry.set("a", 90);
        registry.set("b", 10);
        let now = Utc::now();
        let mut a = event("a", now);
        a.tags = vec!["rock".to_string(), "live".to_string()];
        let mut b = event("b", now);
        b.tags = vec!["live".to_string(), "indie".to_string()];

        let merged = merge(&[a, b], &registry, None).unwrap();
        assert_eq!(merged.tags, vec!["rock", "live", "indie"]);
    }

    #[test]
    fn merge_fills_missing_scalar_from_next_trusted() {
        let mut registry = TrustRegistry::new();
        registry.set("a", 90);
        registry.set("b", 10);
        let now = Utc::now();
        let a = event("a", now);
        let mut b = event("b", now);
        b.tickets_url = Some("https://tickets.example/b".to_string());

        let merged = merge(&[a, b], &registry, None).unwrap();
        assert_eq!(merged.tickets_url, Some("https://tickets.example/b".to_string()));
    }

    #[test]
    fn merge_recomputes_id_and_hash() {
        let registry = TrustRegistry::new();
        let now = Utc::now();
        let a = event("a", now);
        let merged = merge(&[a.clone()], &registry, None).unwrap();
        assert_eq!(merged.id, composite_key(&merged));
        assert_eq!(merged.hash, content_hash(&merged));
    }

    #[test]
    fn merge_timestamps_take_min_first_seen_and_max_last_seen() {
        let registry = TrustRegistry::new();
        let early = Utc::now() - chrono::Duration::days(5);
        let late = Utc::now();
        let mut a = event("a", late);
        a.first_seen_at = Some(early);
        a.last_seen_at = Some(early);
        let mut b = event("b", late);
        b.first_seen_at = Some(late);
        b.last_seen_at = Some(late);

        let merged = merge(&[a, b], &registry, None).unwrap();
        assert_eq!(merged.first_seen_at, Some(early));
        assert_eq!(merged.last_seen_at, Some(late));
    }
}
