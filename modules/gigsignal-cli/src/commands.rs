use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use gigsignal_catalog::{CatalogGenerator, CatalogOptions};
use gigsignal_common::types::{Catalog, Event, SourceSnapshot};
use gigsignal_dedup::{DedupOptions, TrustRegistry};
use gigsignal_store::{CatalogStore, FileSnapshotStore, SnapshotStore};
use gigsignal_validate::{RawEvent, Sanitizer};
use tracing::{info, warn};

use crate::{CatalogArgs, CompareArgs, ValidateArgs};

pub async fn generate(args: CatalogArgs) -> Result<bool> {
    let (catalog, errors) = build_catalog(&args).await?;
    report_catalog(&catalog, args.verbose);

    if !args.dry_run {
        CatalogStore::new(&args.output).save(&catalog).await.context("writing catalog")?;
        info!(path = %args.output.display(), "catalog written");
    } else {
        info!("dry run: catalog not written");
    }

    Ok(errors == 0)
}

pub async fn update(args: CatalogArgs) -> Result<bool> {
    let previous = if let Some(path) = &args.old_catalog {
        load_catalog(path).await?
    } else {
        CatalogStore::new(&args.output).load().await.context("loading existing catalog")?
    };

    let (catalog, errors) = build_catalog(&args).await?;
    report_catalog(&catalog, args.verbose);

    if let Some(previous) = previous {
        let diff = CatalogGenerator::diff(&previous, &catalog);
        println!(
            "diff: +{} added, {} updated, -{} removed, {} unchanged",
            diff.added.len(),
            diff.updated.len(),
            diff.removed.len(),
            diff.unchanged.len()
        );
        if args.verbose {
            print_ids("added", &diff.added);
            print_ids("updated", &diff.updated);
            print_ids("removed", &diff.removed);
        }
    } else {
        println!("no previous catalog to diff against");
    }

    if !args.dry_run {
        CatalogStore::new(&args.output).save(&catalog).await.context("writing catalog")?;
        info!(path = %args.output.display(), "catalog written");
    } else {
        info!("dry run: catalog not written");
    }

    Ok(errors == 0)
}

pub async fn validate(args: ValidateArgs) -> Result<bool> {
    if args.no_validate {
        println!("validation skipped (--no-validate)");
        return Ok(true);
    }

    let snapshots = load_snapshots(&args.sources_dir).await?;
    if snapshots.is_empty() {
        println!("no snapshots found under {}", args.sources_dir.display());
        return Ok(true);
    }

    let sanitizer = Sanitizer::new(false);
    let mut total_events = 0usize;
    let mut total_errors = 0usize;

    for snapshot in &snapshots {
        let raws: Vec<RawEvent> = snapshot.gigs.iter().map(event_to_raw).collect();
        let batch = sanitizer.validate_batch(&raws);
        total_events += snapshot.gigs.len();
        total_errors += batch.invalid.len();

        println!(
            "{}: {} valid, {} invalid, {} warnings",
            snapshot.source,
            batch.valid.len(),
            batch.invalid.len(),
            batch.total_warnings
        );
        if args.verbose {
            for invalid in &batch.invalid {
                for error in &invalid.errors {
                    println!("  error: {error}");
                }
            }
        }
    }

    println!("{total_events} records checked, {total_errors} invalid");
    Ok(total_errors == 0)
}

pub async fn compare(args: CompareArgs) -> Result<bool> {
    let old = load_catalog(&args.old_catalog)
        .await?
        .with_context(|| format!("{} has no catalog document", args.old_catalog.display()))?;
    let new = load_catalog(&args.output)
        .await?
        .with_context(|| format!("{} has no catalog document", args.output.display()))?;

    let diff = CatalogGenerator::diff(&old, &new);
    println!(
        "diff: +{} added, {} updated, -{} removed, {} unchanged",
        diff.added.len(),
        diff.updated.len(),
        diff.removed.len(),
        diff.unchanged.len()
    );
    if args.verbose {
        print_ids("added", &diff.added);
        print_ids("updated", &diff.updated);
        print_ids("removed", &diff.removed);
    }

    Ok(true)
}

async fn build_catalog(args: &CatalogArgs) -> Result<(Catalog, usize)> {
    let mut snapshots = load_snapshots(&args.sources_dir).await?;
    let mut invalid_count = 0usize;

    if !args.no_validate {
        let sanitizer = Sanitizer::new(false);
        for snapshot in &mut snapshots {
            let raws: Vec<RawEvent> = snapshot.gigs.iter().map(event_to_raw).collect();
            let batch = sanitizer.validate_batch(&raws);
            if !batch.invalid.is_empty() {
                warn!(source = %snapshot.source, invalid = batch.invalid.len(), "dropping invalid records before catalog generation");
            }
            invalid_count += batch.invalid.len();
            snapshot.gigs = batch.valid;
        }
    }

    let registry = match &args.trust_scores {
        Some(path) => TrustRegistry::with_defaults(load_trust_scores(path).await?),
        None => TrustRegistry::new(),
    };

    let options = CatalogOptions {
        dedup: DedupOptions {
            min_confidence: args.min_confidence,
            date_tolerance_hours: args.date_tolerance,
            require_same_day: args.same_day,
        },
        max_snapshot_age: Duration::from_secs(args.max_age.max(1) * 3600),
    };

    let existing_version = CatalogStore::new(&args.output).load().await.ok().flatten().map(|c| c.metadata.version);
    let version = existing_version.unwrap_or(0) + 1;

    let generator = CatalogGenerator::new(registry, options, version);
    let catalog = generator.generate(snapshots);

    Ok((catalog, invalid_count))
}

async fn load_snapshots(dir: &Path) -> Result<Vec<SourceSnapshot>> {
    let store = FileSnapshotStore::new(dir);
    let mut snapshots = Vec::new();
    for source in store.list_sources().await.context("listing source snapshots")? {
        if let Some(snapshot) = store.load_snapshot(&source).await.with_context(|| format!("loading snapshot for {source}"))? {
            snapshots.push(snapshot);
        }
    }
    Ok(snapshots)
}

async fn load_catalog(path: &Path) -> Result<Option<Catalog>> {
    CatalogStore::new(path).load().await.with_context(|| format!("loading catalog at {}", path.display()))
}

async fn load_trust_scores(path: &Path) -> Result<HashMap<String, u8>> {
    let bytes = tokio::fs::read(path).await.with_context(|| format!("reading trust scores from {}", path.display()))?;
    serde_json::from_slice(&bytes).context("parsing trust scores JSON")
}

/// Round-trips a validated `Event` back through the looser pre-validation
/// shape so it can pass through `Sanitizer` again (§4.12 re-validation).
fn event_to_raw(event: &Event) -> RawEvent {
    RawEvent {
        source: event.source.clone(),
        source_id: event.source_id.clone(),
        title: Some(event.title.clone()),
        artists: event.artists.clone(),
        tags: event.tags.clone(),
        date_start: Some(event.date_start),
        date_end: event.date_end,
        timezone: event.timezone.clone(),
        venue_name: Some(event.venue.name.clone()),
        venue_address: event.venue.address.clone(),
        venue_city: event.venue.city.clone(),
        venue_country: event.venue.country.clone(),
        venue_lat: event.venue.lat,
        venue_lng: event.venue.lng,
        price_min: event.price.min,
        price_max: event.price.max,
        price_currency: event.price.currency.clone(),
        age_restriction: event.age_restriction.clone(),
        status: Some(event.status.to_string()),
        tickets_url: event.tickets_url.clone(),
        event_url: event.event_url.clone(),
        images: event.images.clone(),
    }
}

fn report_catalog(catalog: &Catalog, verbose: bool) {
    println!(
        "catalog v{}: {} gigs from {} sources ({} processed, {} duplicates removed, {}ms)",
        catalog.metadata.version,
        catalog.gigs.len(),
        catalog.metadata.source_count,
        catalog.metadata.total_processed,
        catalog.metadata.dedup_counters.duplicates_removed,
        catalog.metadata.processing_time_ms
    );
    if verbose {
        for (source, counters) in &catalog.source_stats.per_source {
            println!(
                "  {source}: {} original, {} after dedup, {} removed",
                counters.original, counters.after_dedup, counters.duplicates_removed
            );
        }
    }
}

fn print_ids(label: &str, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    println!("  {label}:");
    for id in ids {
        println!("    {id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gigsignal_common::types::{EventStatus, Price, SnapshotMetadata, Venue};

    fn event(source: &str) -> Event {
        Event {
            id: "abc".to_string(),
            source: source.to_string(),
            source_id: None,
            title: "Show".to_string(),
            artists: vec![],
            tags: vec![],
            date_start: Utc::now(),
            date_end: None,
            timezone: None,
            venue: Venue { name: "Venue".to_string(), address: None, city: None, country: None, lat: None, lng: None },
            price: Price::default(),
            age_restriction: None,
            status: EventStatus::Scheduled,
            tickets_url: None,
            event_url: None,
            images: vec![],
            updated_at: Utc::now(),
            first_seen_at: None,
            last_seen_at: None,
            hash: "h".to_string(),
            is_new: None,
            is_updated: None,
        }
    }

    #[test]
    fn event_to_raw_preserves_status_as_a_parseable_string() {
        let raw = event_to_raw(&event("ra"));
        assert_eq!(raw.status.as_deref(), Some("scheduled"));
    }

    #[tokio::test]
    async fn build_catalog_generates_from_snapshot_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let snapshot = SourceSnapshot {
            source: "ra".to_string(),
            gigs: vec![event("ra")],
            metadata: SnapshotMetadata { last_run: Utc::now(), source: "ra".to_string(), errors: vec![] },
        };
        store.save_snapshot(&snapshot).await.unwrap();

        let args = CatalogArgs {
            sources_dir: dir.path().to_path_buf(),
            output: dir.path().join("catalog.json"),
            old_catalog: None,
            min_confidence: 0.7,
            date_tolerance: 2,
            same_day: false,
            no_validate: false,
            max_age: 24,
            trust_scores: None,
            verbose: false,
            dry_run: true,
        };

        let (catalog, errors) = build_catalog(&args).await.unwrap();
        assert_eq!(errors, 0);
        assert_eq!(catalog.gigs.len(), 1);
    }

    #[tokio::test]
    async fn validate_reports_no_errors_for_a_clean_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        let snapshot = SourceSnapshot {
            source: "ra".to_string(),
            gigs: vec![event("ra")],
            metadata: SnapshotMetadata { last_run: Utc::now(), source: "ra".to_string(), errors: vec![] },
        };
        store.save_snapshot(&snapshot).await.unwrap();

        let ok = validate(ValidateArgs { sources_dir: dir.path().to_path_buf(), no_validate: false, verbose: false })
            .await
            .unwrap();
        assert!(ok);
    }
}
