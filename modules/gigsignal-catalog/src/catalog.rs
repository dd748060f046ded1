//! Catalog Generator (§4.8): union eligible snapshots, dedupe, sort, emit
//! the single catalog document, diff against the previous version.

use std::time::{Duration, Instant};

use chrono::Utc;
use gigsignal_common::types::{Catalog, CatalogDiff, CatalogMetadata, SourceSnapshot, SourceStats};
use gigsignal_dedup::{DedupOptions, Deduplicator, TrustRegistry};
use tracing::warn;

const DEFAULT_MAX_SNAPSHOT_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub dedup: DedupOptions,
    pub max_snapshot_age: Duration,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            dedup: DedupOptions::default(),
            max_snapshot_age: DEFAULT_MAX_SNAPSHOT_AGE,
        }
    }
}

pub struct CatalogGenerator {
    pub registry: TrustRegistry,
    pub options: CatalogOptions,
    pub version: u64,
}

impl CatalogGenerator {
    pub fn new(registry: TrustRegistry, options: CatalogOptions, version: u64) -> Self {
        Self {
            registry,
            options,
            version,
        }
    }

    /// Union `snapshots` that are within `max_snapshot_age`, dedupe, sort by
    /// `dateStart` ascending, and emit a catalog document (§4.8).
    pub fn generate(&self, snapshots: Vec<SourceSnapshot>) -> Catalog {
        let start = Instant::now();
        let now = Utc::now();

        let mut total_processed = 0usize;
        let mut eligible_gigs = Vec::new();
        let mut source_count = 0usize;

        for snapshot in snapshots {
            let age = now.signed_duration_since(snapshot.metadata.last_run);
            let age_std = age.to_std().unwrap_or(Duration::ZERO);
            if age_std > self.options.max_snapshot_age {
                warn!(
                    source = %snapshot.source,
                    age_secs = age_std.as_secs(),
                    "skipping stale snapshot"
                );
                continue;
            }
            source_count += 1;
            total_processed += snapshot.gigs.len();
            eligible_gigs.extend(snapshot.gigs);
        }

        let deduplicator = Deduplicator::new(self.registry.clone(), self.options.dedup);
        let dedup_result = deduplicator.dedupe(eligible_gigs);

        let mut gigs = dedup_result.deduped_gigs;
        gigs.sort_by(|a, b| a.date_start.cmp(&b.date_start));

        let totals = dedup_result
            .per_source
            .values()
            .fold(Default::default(), |mut acc: gigsignal_common::types::PerSourceCounters, c| {
                acc.original += c.original;
                acc.after_dedup += c.after_dedup;
                acc.duplicates_removed += c.duplicates_removed;
                acc
            });

        Catalog {
            gigs,
            source_stats: SourceStats {
                per_source: dedup_result.per_source,
                totals: totals.clone(),
            },
            metadata: CatalogMetadata {
                version: self.version,
                generated_at: Utc::now(),
                dedup_counters: totals,
                processing_time_ms: start.elapsed().as_millis() as u64,
                source_count,
                total_processed,
            },
        }
    }

    /// Diff two catalogs by `id`/`hash` comparison, independent of snapshot
    /// presence (§4.8): a record absent from every source disappears here
    /// and is reported as removed.
    pub fn diff(previous: &Catalog, current: &Catalog) -> CatalogDiff {
        use std::collections::HashMap;

        let prev_by_id: HashMap<&str, &str> =
            previous.gigs.iter().map(|e| (e.id.as_str(), e.hash.as_str())).collect();
        let curr_ids: std::collections::HashSet<&str> =
            current.gigs.iter().map(|e| e.id.as_str()).collect();

        let mut diff = CatalogDiff::default();
        for event in &current.gigs {
            match prev_by_id.get(event.id.as_str()) {
                None => diff.added.push(event.id.clone()),
                Some(prev_hash) if *prev_hash != event.hash => diff.updated.push(event.id.clone()),
                Some(_) => diff.unchanged.push(event.id.clone()),
            }
        }
        for event in &previous.gigs {
            if !curr_ids.contains(event.id.as_str()) {
                diff.removed.push(event.id.clone());
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigsignal_common::types::{EventStatus, Price, SnapshotMetadata, Venue};
    use chrono::TimeZone;

    fn event(id: &str, source: &str, hash: &str, date_start: chrono::DateTime<Utc>) -> gigsignal_common::types::Event {
        gigsignal_common::types::Event {
            id: id.to_string(),
            source: source.to_string(),
            source_id: None,
            title: "Gig".to_string(),
            artists: vec![],
            tags: vec![],
            date_start,
            date_end: None,
            timezone: None,
            venue: Venue {
                name: "Venue".to_string(),
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
            updated_at: date_start,
            first_seen_at: Some(date_start),
            last_seen_at: Some(date_start),
            hash: hash.to_string(),
            is_new: None,
            is_updated: None,
        }
    }

    fn snapshot(source: &str, gigs: Vec<gigsignal_common::types::Event>, last_run: chrono::DateTime<Utc>) -> SourceSnapshot {
        SourceSnapshot {
            source: source.to_string(),
            gigs,
            metadata: SnapshotMetadata {
                last_run,
                source: source.to_string(),
                errors: vec![],
            },
        }
    }

    #[test]
    fn generate_sorts_by_date_start_ascending() {
        let later = Utc.with_ymd_and_hms(2026, 9, 10, 20, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 9, 1, 20, 0, 0).unwrap();
        let now = Utc::now();

        let snap = snapshot(
            "ra",
            vec![event("b", "ra", "h1", later), event("a", "ra", "h2", earlier)],
            now,
        );

        let generator = CatalogGenerator::new(TrustRegistry::new(), CatalogOptions::default(), 1);
        let catalog = generator.generate(vec![snap]);

        assert_eq!(catalog.gigs[0].id, "a");
        assert_eq!(catalog.gigs[1].id, "b");
    }

    #[test]
    fn stale_snapshots_are_skipped() {
        let now = Utc::now();
        let stale = now - chrono::Duration::hours(48);
        let date_start = Utc.with_ymd_and_hms(2026, 9, 1, 20, 0, 0).unwrap();

        let snap = snapshot("ra", vec![event("a", "ra", "h1", date_start)], stale);

        let generator = CatalogGenerator::new(TrustRegistry::new(), CatalogOptions::default(), 1);
        let catalog = generator.generate(vec![snap]);

        assert!(catalog.gigs.is_empty());
        assert_eq!(catalog.metadata.source_count, 0);
    }

    #[test]
    fn diff_detects_added_updated_removed_unchanged() {
        let date_start = Utc.with_ymd_and_hms(2026, 9, 1, 20, 0, 0).unwrap();
        let previous = Catalog {
            gigs: vec![
                event("keep", "ra", "h1", date_start),
                event("change", "ra", "h2", date_start),
                event("gone", "ra", "h3", date_start),
            ],
            source_stats: SourceStats::default(),
            metadata: CatalogMetadata {
                version: 1,
                generated_at: Utc::now(),
                dedup_counters: Default::default(),
                processing_time_ms: 0,
                source_count: 1,
                total_processed: 3,
            },
        };
        let current = Catalog {
            gigs: vec![
                event("keep", "ra", "h1", date_start),
                event("change", "ra", "h2-new", date_start),
                event("fresh", "ra", "h4", date_start),
            ],
            source_stats: SourceStats::default(),
            metadata: previous.metadata.clone(),
        };

        let diff = CatalogGenerator::diff(&previous, &current);
        assert_eq!(diff.added, vec!["fresh".to_string()]);
        assert_eq!(diff.updated, vec!["change".to_string()]);
        assert_eq!(diff.removed, vec!["gone".to_string()]);
        assert_eq!(diff.unchanged, vec!["keep".to_string()]);
    }
}
