//! Query Surface (§4.11): validated list/detail reads in front of the
//! Tiered Cache, plus prefetch and cache-warming helpers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gigsignal_cache::{CacheHit, TieredCache};
use gigsignal_common::types::Event;
use gigsignal_common::Error;
use tracing::warn;

use crate::key::list_query_key;
use crate::types::{ListOptions, ListResult, SortBy};

/// Where list/detail reads ultimately come from: the catalog document or
/// the document store, per §4.11 ("reads the catalog (or the document
/// store)"). The Query Surface doesn't care which.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn events_for_city(&self, city: &str) -> Result<Vec<Event>, Error>;
    async fn event_by_id(&self, id: &str) -> Result<Option<Event>, Error>;
}

const PREFETCH_DEBOUNCE: Duration = Duration::from_millis(100);
const WARM_INTER_REQUEST_DELAY: Duration = Duration::from_millis(50);
/// §4.10 warming: at most this many cities per warming pass.
const MAX_WARM_CITIES: usize = 10;

pub struct QuerySurface {
    source: Arc<dyn EventSource>,
    cache: Arc<TieredCache<String, ListResult>>,
}

impl QuerySurface {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            cache: Arc::new(TieredCache::new()),
        }
    }

    /// `(city, options)` → `{data, totalCount, hasMore, cacheHit}` (§4.11).
    /// Filtering/sorting/pagination happen in the miss path only.
    pub async fn list(&self, city: &str, raw_time_range: &str, options: ListOptions) -> Result<ListResult, Error> {
        let time_range = crate::types::TimeRange::parse(raw_time_range)?;
        let mut options = options.normalize();
        options.time_range = time_range;

        let key = list_query_key(city, &options);
        let source = self.source.clone();
        let city_owned = city.to_string();
        let opts = options.clone_for_fetch();

        let (mut result, hit) = self
            .cache
            .get_or_fetch(key, options.page, move || {
                let source = source.clone();
                let city = city_owned.clone();
                let opts = opts.clone();
                async move { fetch_and_paginate(source.as_ref(), &city, &opts).await }
            })
            .await;
        result.cache_hit = hit;

        self.schedule_prefetch(city, &options);

        Ok(result)
    }

    /// `(id)` → `Event | null` (§4.11). Detail reads bypass the tiered
    /// cache; a single gig lookup is cheap enough not to warrant it.
    pub async fn detail(&self, id: &str) -> Result<Option<Event>, Error> {
        self.source.event_by_id(id).await
    }

    fn schedule_prefetch(&self, city: &str, options: &ListOptions) {
        if options.page > 9 {
            return; // next page would exceed MAX_CACHED_PAGE
        }
        let mut next = options.clone_for_fetch();
        next.page += 1;
        let key = list_query_key(city, &next);
        let source = self.source.clone();
        let cache = self.cache.clone();
        let city = city.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(PREFETCH_DEBOUNCE).await;
            cache
                .get_or_fetch(key, next.page, move || {
                    let source = source.clone();
                    let city = city.clone();
                    let next = next.clone();
                    async move {
                        fetch_and_paginate(source.as_ref(), &city, &next)
                            .await
                            .unwrap_or_else(|e| {
                                warn!(error = %e, "prefetch failed");
                                ListResult { data: vec![], total_count: 0, has_more: false, cache_hit: CacheHit::Miss }
                            })
                    }
                })
                .await;
        });
    }

    /// Warm pages 1-3 for `today/week/month` for up to 10 cities (§4.10).
    pub async fn warm(&self, cities: &[String]) {
        for city in cities.iter().take(MAX_WARM_CITIES) {
            for range in ["today", "week", "month"] {
                for page in 1..=3 {
                    let mut options = ListOptions { page, ..ListOptions::default() };
                    options.sort_by = SortBy::Date;
                    if let Err(e) = self.list(city, range, options).await {
                        warn!(city = %city, range, page, error = %e, "cache warming request failed");
                    }
                    tokio::time::sleep(WARM_INTER_REQUEST_DELAY).await;
                }
            }
        }
    }

    pub async fn invalidate_city(&self, city: &str, partial: bool) {
        self.cache.invalidate_prefix(&city.to_lowercase(), partial).await;
    }

    pub async fn stats(&self) -> gigsignal_cache::CacheStats {
        self.cache.stats().await
    }
}

impl ListOptions {
    /// A cheap `Clone`-like helper kept distinct from `derive(Clone)` to
    /// make its use at fetch/prefetch boundaries explicit.
    fn clone_for_fetch(&self) -> Self {
        self.clone()
    }
}

async fn fetch_and_paginate(source: &dyn EventSource, city: &str, options: &ListOptions) -> Result<ListResult, Error> {
    let mut events = source.events_for_city(city).await?;

    let now_cutoff = chrono::Utc::now() + chrono::Duration::hours(options.time_range.hours() as i64);
    events.retain(|e| e.date_start <= now_cutoff);

    if let Some(genres) = &options.filters.genres {
        events.retain(|e| e.tags.iter().any(|t| genres.contains(t)));
    }
    if let Some(venues) = &options.filters.venues {
        events.retain(|e| venues.iter().any(|v| v.eq_ignore_ascii_case(&e.venue.name)));
    }
    if let Some((lo, hi)) = options.filters.price_range {
        events.retain(|e| match e.price.min {
            Some(min) => min >= lo && min <= hi,
            None => true,
        });
    }

    match options.sort_by {
        SortBy::Date => events.sort_by(|a, b| a.date_start.cmp(&b.date_start)),
        SortBy::Name => events.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase())),
        SortBy::Venue => events.sort_by(|a, b| a.venue.name.to_lowercase().cmp(&b.venue.name.to_lowercase())),
    }

    let total_count = events.len();
    let start = (options.page - 1) * options.limit;
    let page_data: Vec<Event> = events.into_iter().skip(start).take(options.limit).collect();
    let has_more = start + page_data.len() < total_count;

    Ok(ListResult {
        data: page_data,
        total_count,
        has_more,
        cache_hit: CacheHit::Miss,
    })
}

/// Cache-control hint for the (external) HTTP shell: max-age ramps with the
/// hit tier, `stale-while-revalidate` is 2× the max-age (§6).
pub struct CacheControl {
    pub max_age_secs: u64,
    pub stale_while_revalidate_secs: u64,
}

impl CacheControl {
    pub fn for_hit(hit: CacheHit) -> Self {
        let max_age_secs = match hit {
            CacheHit::Hot => 5 * 60,
            CacheHit::Warm => 30 * 60,
            CacheHit::Miss => 60 * 60,
        };
        Self {
            max_age_secs,
            stale_while_revalidate_secs: max_age_secs * 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigsignal_common::types::{EventStatus, Price, Venue};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct FixtureSource {
        events: Vec<Event>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl EventSource for FixtureSource {
        async fn events_for_city(&self, _city: &str) -> Result<Vec<Event>, Error> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.events.clone())
        }
        async fn event_by_id(&self, id: &str) -> Result<Option<Event>, Error> {
            Ok(self.events.iter().find(|e| e.id == id).cloned())
        }
    }

    fn event(id: &str, title: &str, date_start: chrono::DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            source: "ra".to_string(),
            source_id: None,
            title: title.to_string(),
            artists: vec![],
            tags: vec!["rock".to_string()],
            date_start,
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
            updated_at: date_start,
            first_seen_at: Some(date_start),
            last_seen_at: Some(date_start),
            hash: format!("hash-{id}"),
            is_new: None,
            is_updated: None,
        }
    }

    #[tokio::test]
    async fn list_validates_time_range_before_any_fetch() {
        let source = Arc::new(FixtureSource { events: vec![], calls: Mutex::new(0) });
        let surface = QuerySurface::new(source.clone());

        let err = surface.list("bristol", "decade", ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
        assert_eq!(*source.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn list_sorts_by_date_ascending_by_default() {
        let soon = Utc.with_ymd_and_hms(2026, 8, 1, 20, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 8, 2, 20, 0, 0).unwrap();
        let source = Arc::new(FixtureSource {
            events: vec![event("b", "Later Gig", later), event("a", "Sooner Gig", soon)],
            calls: Mutex::new(0),
        });
        let surface = QuerySurface::new(source);

        let result = surface.list("bristol", "all", ListOptions::default()).await.unwrap();
        assert_eq!(result.data[0].id, "a");
        assert_eq!(result.data[1].id, "b");
    }

    #[tokio::test]
    async fn detail_bypasses_cache_and_returns_none_for_unknown_id() {
        let source = Arc::new(FixtureSource { events: vec![], calls: Mutex::new(0) });
        let surface = QuerySurface::new(source);
        assert!(surface.detail("missing").await.unwrap().is_none());
    }

    #[test]
    fn cache_control_ramps_with_tier() {
        let hot = CacheControl::for_hit(CacheHit::Hot);
        let warm = CacheControl::for_hit(CacheHit::Warm);
        let miss = CacheControl::for_hit(CacheHit::Miss);
        assert!(hot.max_age_secs < warm.max_age_secs);
        assert!(warm.max_age_secs < miss.max_age_secs);
        assert_eq!(hot.stale_while_revalidate_secs, hot.max_age_secs * 2);
    }
}
