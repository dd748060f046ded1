//! Change Detector (§4.5): classifies current records against a previous
//! snapshot and merges them, preserving `firstSeenAt`.

use std::collections::HashMap;

use chrono::Utc;
use gigsignal_common::types::Event;

/// Result of diffing `current` against `previous` (§4.5).
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub merged: Vec<Event>,
    pub new_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
}

/// Absence of a previous `id` in `current` is not a deletion at this layer
/// (§4.5) — the caller simply stops seeing it in `merged`.
pub fn diff(current: Vec<Event>, previous: &[Event]) -> ChangeSet {
    let prev_by_id: HashMap<&str, &Event> =
        previous.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut set = ChangeSet::default();
    let now = Utc::now();

    for mut event in current {
        match prev_by_id.get(event.id.as_str()) {
            None => {
                event.first_seen_at = Some(now);
                event.last_seen_at = Some(now);
                event.is_new = Some(true);
                event.is_updated = Some(false);
                set.new_count += 1;
            }
            Some(prev) if prev.hash != event.hash => {
                event.first_seen_at = prev.first_seen_at.or(Some(now));
                event.last_seen_at = Some(now);
                event.is_new = Some(false);
                event.is_updated = Some(true);
                set.updated_count += 1;
            }
            Some(prev) => {
                event.first_seen_at = prev.first_seen_at;
                event.last_seen_at = Some(now);
                event.updated_at = prev.updated_at;
                event.is_new = Some(false);
                event.is_updated = Some(false);
                set.unchanged_count += 1;
            }
        }
        set.merged.push(event);
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigsignal_common::types::{EventStatus, Price, Venue};

    fn event(id: &str, hash: &str) -> Event {
        Event {
            id: id.to_string(),
            source: "test-source".to_string(),
            source_id: None,
            title: "Test Gig".to_string(),
            artists: vec![],
            tags: vec![],
            date_start: Utc::now(),
            date_end: None,
            timezone: None,
            venue: Venue::default(),
            price: Price::default(),
            age_restriction: None,
            status: EventStatus::Scheduled,
            tickets_url: None,
            event_url: None,
            images: vec![],
            updated_at: Utc::now(),
            first_seen_at: None,
            last_seen_at: None,
            hash: hash.to_string(),
            is_new: None,
            is_updated: None,
        }
    }

    #[test]
    fn record_absent_from_previous_is_new() {
        let current = vec![event("a", "h1")];
        let set = diff(current, &[]);
        assert_eq!(set.new_count, 1);
        assert_eq!(set.merged[0].is_new, Some(true));
        assert!(set.merged[0].first_seen_at.is_some());
    }

    #[test]
    fn record_with_differing_hash_is_updated_and_keeps_first_seen_at() {
        let mut prev = event("a", "h1");
        let first_seen = Utc::now() - chrono::Duration::days(10);
        prev.first_seen_at = Some(first_seen);

        let current = vec![event("a", "h2")];
        let set = diff(current, &[prev]);

        assert_eq!(set.updated_count, 1);
        assert_eq!(set.merged[0].is_updated, Some(true));
        assert_eq!(set.merged[0].first_seen_at, Some(first_seen));
    }

    #[test]
    fn record_with_same_hash_is_unchanged_and_keeps_updated_at() {
        let mut prev = event("a", "h1");
        let original_updated_at = Utc::now() - chrono::Duration::days(3);
        prev.updated_at = original_updated_at;
        prev.first_seen_at = Some(original_updated_at);

        let current = vec![event("a", "h1")];
        let set = diff(current, &[prev]);

        assert_eq!(set.unchanged_count, 1);
        assert_eq!(set.merged[0].is_new, Some(false));
        assert_eq!(set.merged[0].is_updated, Some(false));
        assert_eq!(set.merged[0].updated_at, original_updated_at);
    }

    #[test]
    fn missing_from_current_is_not_recorded_as_a_deletion() {
        let prev = event("gone", "h1");
        let set = diff(vec![], &[prev]);
        assert!(set.merged.is_empty());
        assert_eq!(set.new_count + set.updated_count + set.unchanged_count, 0);
    }
}
