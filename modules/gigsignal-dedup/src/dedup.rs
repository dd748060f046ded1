//! Deduplicator (§4.7): exact-id collapse, then fuzzy cross-source matching.
//!
//! Bucketing/scoring style grounded in
//! `taproot-domains::clustering::activities::cluster_listings`'s composite,
//! weighted match score over independent sub-scores; string similarity here
//! uses `strsim::jaro_winkler` directly rather than a reimplementation,
//! since its prefix-boost algorithm already matches §4.7's description.

use std::collections::{BTreeMap, HashMap};

use gigsignal_common::types::{Event, PerSourceCounters};
use gigsignal_common::{fuzzy_key, normalize_text, NormalizeMode};

use crate::trust::{self, TrustRegistry};

#[derive(Debug, Clone, Copy)]
pub struct DedupOptions {
    pub min_confidence: f64,
    pub date_tolerance_hours: i64,
    pub require_same_day: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            date_tolerance_hours: 2,
            require_same_day: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    pub deduped_gigs: Vec<Event>,
    pub duplicates_removed: usize,
    pub merged_groups: usize,
    pub per_source: BTreeMap<String, PerSourceCounters>,
}

pub struct Deduplicator {
    pub registry: TrustRegistry,
    pub overrides: Option<HashMap<String, u8>>,
    pub options: DedupOptions,
}

impl Deduplicator {
    pub fn new(registry: TrustRegistry, options: DedupOptions) -> Self {
        Self {
            registry,
            overrides: None,
            options,
        }
    }

    pub fn dedupe(&self, events: Vec<Event>) -> DedupResult {
        let mut per_source: BTreeMap<String, PerSourceCounters> = BTreeMap::new();
        for e in &events {
            per_source.entry(e.source.clone()).or_default().original += 1;
        }

        let exact_pass = self.exact_id_pass(events);
        let mut merged_groups = exact_pass.merged_groups;

        let fuzzy_pass = self.fuzzy_pass(exact_pass.events);
        merged_groups += fuzzy_pass.merged_groups;

        for e in &fuzzy_pass.events {
            per_source.entry(e.source.clone()).or_default().after_dedup += 1;
        }
        for counters in per_source.values_mut() {
            counters.duplicates_removed = counters.original.saturating_sub(counters.after_dedup);
        }

        let original_total: usize = per_source.values().map(|c| c.original).sum();
        let duplicates_removed = original_total.saturating_sub(fuzzy_pass.events.len());

        DedupResult {
            deduped_gigs: fuzzy_pass.events,
            duplicates_removed,
            merged_groups,
            per_source,
        }
    }

    /// §4.7 step 1: group by `id`; every group with >1 members collapses.
    fn exact_id_pass(&self, events: Vec<Event>) -> PassResult {
        let mut groups: HashMap<String, Vec<Event>> = HashMap::new();
        for event in events {
            groups.entry(event.id.clone()).or_default().push(event);
        }

        let mut out = Vec::new();
        let mut merged_groups = 0;
        for (_, group) in groups {
            if group.len() > 1 {
                merged_groups += 1;
                if let Some(merged) = trust::merge(&group, &self.registry, self.overrides.as_ref()) {
                    out.push(merged);
                }
            } else {
                out.extend(group);
            }
        }
        PassResult {
            events: out,
            merged_groups,
        }
    }

    /// §4.7 step 2: bucket survivors by fuzzy sub-keys, score pairwise
    /// within a bucket, merge matched groups.
    fn fuzzy_pass(&self, events: Vec<Event>) -> PassResult {
        let n = events.len();
        let keys: Vec<_> = events.iter().map(fuzzy_key).collect();

        let mut venue_day: HashMap<String, Vec<usize>> = HashMap::new();
        let mut city_day: HashMap<String, Vec<usize>> = HashMap::new();
        let mut full_digest: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            venue_day.entry(key.venue_day_bucket()).or_default().push(i);
            city_day.entry(key.city_day_bucket()).or_default().push(i);
            full_digest.entry(key.digest()).or_default().push(i);
        }

        let mut processed = vec![false; n];
        let mut out = Vec::new();
        let mut merged_groups = 0;

        for i in 0..n {
            if processed[i] {
                continue;
            }

            let mut candidates: Vec<usize> = venue_day[&keys[i].venue_day_bucket()]
                .iter()
                .chain(city_day[&keys[i].city_day_bucket()].iter())
                .chain(full_digest[&keys[i].digest()].iter())
                .copied()
                .filter(|&j| j != i && !processed[j])
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            let mut group_indices = vec![i];
            for j in candidates {
                if self.is_match(&events[i], &events[j]) {
                    group_indices.push(j);
                }
            }

            for &idx in &group_indices {
                processed[idx] = true;
            }

            if group_indices.len() > 1 {
                merged_groups += 1;
                let group: Vec<Event> = group_indices.iter().map(|&idx| events[idx].clone()).collect();
                if let Some(merged) = trust::merge(&group, &self.registry, self.overrides.as_ref()) {
                    out.push(merged);
                }
            } else {
                out.push(events[i].clone());
            }
        }

        PassResult {
            events: out,
            merged_groups,
        }
    }

    fn is_match(&self, a: &Event, b: &Event) -> bool {
        if let (Some(a_sid), Some(b_sid)) = (&a.source_id, &b.source_id) {
            if a.source == b.source && a_sid == b_sid && !a_sid.is_empty() {
                return true;
            }
        }

        let same_day = a.date_start.date_naive() == b.date_start.date_naive();
        if self.options.require_same_day && !same_day {
            return false;
        }

        score(a, b, self.options.date_tolerance_hours) >= self.options.min_confidence
    }
}

struct PassResult {
    events: Vec<Event>,
    merged_groups: usize,
}

/// Weighted overall score per §4.7: `0.3*venue + 0.3*title + 0.2*location + 0.2*date`.
fn score(a: &Event, b: &Event, date_tolerance_hours: i64) -> f64 {
    let venue_a = normalize_text(&a.venue.name, NormalizeMode::Venue);
    let venue_b = normalize_text(&b.venue.name, NormalizeMode::Venue);
    let venue_score = strsim::jaro_winkler(&venue_a, &venue_b);

    let title_a = normalize_text(&a.title, NormalizeMode::Title);
    let title_b = normalize_text(&b.title, NormalizeMode::Title);
    let title_score = strsim::jaro_winkler(&title_a, &title_b);

    let location_score = location_score(a, b);
    let date_score = date_score(a, b, date_tolerance_hours);

    0.3 * venue_score + 0.3 * title_score + 0.2 * location_score + 0.2 * date_score
}

fn location_score(a: &Event, b: &Event) -> f64 {
    match (&a.venue.city, &b.venue.city) {
        (Some(ca), Some(cb)) => {
            strsim::jaro_winkler(&normalize_text(ca, NormalizeMode::Plain), &normalize_text(cb, NormalizeMode::Plain))
        }
        _ => {
            let fallback_a = a.venue.address.as_deref().or(a.venue.country.as_deref()).unwrap_or("");
            let fallback_b = b.venue.address.as_deref().or(b.venue.country.as_deref()).unwrap_or("");
            if fallback_a.is_empty() || fallback_b.is_empty() {
                0.0
            } else {
                strsim::jaro_winkler(
                    &normalize_text(fallback_a, NormalizeMode::Plain),
                    &normalize_text(fallback_b, NormalizeMode::Plain),
                )
            }
        }
    }
}

fn date_score(a: &Event, b: &Event, tolerance_hours: i64) -> f64 {
    if a.date_start.date_naive() == b.date_start.date_naive() {
        return 1.0;
    }
    let diff_hours = (a.date_start - b.date_start).num_hours().abs();
    if diff_hours <= tolerance_hours {
        0.8
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigsignal_common::types::{EventStatus, Price, Venue};
    use chrono::{TimeZone, Utc};

    fn event(id: &str, source: &str, title: &str, venue: &str, city: &str) -> Event {
        let now = Utc.with_ymd_and_hms(2026, 9, 1, 20, 0, 0).unwrap();
        Event {
            id: id.to_string(),
            source: source.to_string(),
            source_id: None,
            title: title.to_string(),
            artists: vec![],
            tags: vec![],
            date_start: now,
            date_end: None,
            timezone: None,
            venue: Venue {
                name: venue.to_string(),
                address: None,
                city: Some(city.to_string()),
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
            updated_at: now,
            first_seen_at: Some(now),
            last_seen_at: Some(now),
            hash: String::new(),
            is_new: None,
            is_updated: None,
        }
    }

    #[test]
    fn exact_id_duplicates_collapse_to_one() {
        let mut registry = TrustRegistry::new();
        registry.set("a", 80);
        registry.set("b", 20);
        let dedup = Deduplicator::new(registry, DedupOptions::default());

        let a = event("same-id", "a", "Show", "Venue One", "Bristol");
        let mut b = event("same-id", "b", "Show", "Venue One", "Bristol");
        b.hash = "different".to_string();

        let result = dedup.dedupe(vec![a, b]);
        assert_eq!(result.deduped_gigs.len(), 1);
        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.merged_groups, 1);
    }

    #[test]
    fn fuzzy_pass_merges_near_identical_cross_source_records() {
        let mut registry = TrustRegistry::new();
        registry.set("ra", 80);
        registry.set("blog", 20);
        let dedup = Deduplicator::new(registry, DedupOptions::default());

        let a = event("id-a", "ra", "Friday Night Live", "The Garage", "Bristol");
        let b = event("id-b", "blog", "Friday Night Live Show", "The Garage Club", "Bristol");

        let result = dedup.dedupe(vec![a, b]);
        assert_eq!(result.deduped_gigs.len(), 1);
        assert_eq!(result.merged_groups, 1);
    }

    #[test]
    fn distinct_events_are_not_merged() {
        let registry = TrustRegistry::new();
        let dedup = Deduplicator::new(registry, DedupOptions::default());

        let a = event("id-a", "ra", "Jazz Night", "Blue Room", "Bristol");
        let b = event("id-b", "blog", "Metal Mayhem", "The Pit", "Leeds");

        let result = dedup.dedupe(vec![a, b]);
        assert_eq!(result.deduped_gigs.len(), 2);
        assert_eq!(result.merged_groups, 0);
    }

    #[test]
    fn require_same_day_blocks_cross_day_matches_regardless_of_score() {
        let mut registry = TrustRegistry::new();
        registry.set("ra", 80);
        registry.set("blog", 20);
        let mut options = DedupOptions::default();
        options.require_same_day = true;
        let dedup = Deduplicator::new(registry, options);

        let a = event("id-a", "ra", "Friday Night Live", "The Garage", "Bristol");
        let mut b = event("id-b", "blog", "Friday Night Live", "The Garage", "Bristol");
        b.date_start = a.date_start + chrono::Duration::days(1);

        let result = dedup.dedupe(vec![a, b]);
        assert_eq!(result.deduped_gigs.len(), 2);
    }

    #[test]
    fn shared_source_id_is_an_automatic_match() {
        let mut registry = TrustRegistry::new();
        registry.set("ra", 80);
        let dedup = Deduplicator::new(registry, DedupOptions::default());

        let mut a = event("id-a", "ra", "Totally Different Title", "Venue X", "Bristol");
        a.source_id = Some("upstream-123".to_string());
        let mut b = event("id-b", "ra", "Completely Other Name", "Venue Y", "Bristol");
        b.source_id = Some("upstream-123".to_string());

        let result = dedup.dedupe(vec![a, b]);
        assert_eq!(result.deduped_gigs.len(), 1);
    }
}
