//! Deterministic cache key serialization for a list query (§4.10: "Key =
//! deterministic serialization of `{city, page, limit, timeRange, sortBy,
//! filters}`").

use crate::types::{ListFilters, ListOptions, SortBy, TimeRange};

pub fn list_query_key(city: &str, options: &ListOptions) -> String {
    let sort = match options.sort_by {
        SortBy::Date => "date",
        SortBy::Name => "name",
        SortBy::Venue => "venue",
    };
    let range = match options.time_range {
        TimeRange::Today => "today",
        TimeRange::Week => "week",
        TimeRange::Month => "month",
        TimeRange::All => "all",
    };
    format!(
        "{}|page={}|limit={}|range={}|sort={}|{}",
        city.to_lowercase(),
        options.page,
        options.limit,
        range,
        sort,
        filters_fragment(&options.filters),
    )
}

fn filters_fragment(filters: &ListFilters) -> String {
    let mut genres = filters.genres.clone().unwrap_or_default();
    genres.sort();
    let mut venues = filters.venues.clone().unwrap_or_default();
    venues.sort();
    let price = filters
        .price_range
        .map(|(lo, hi)| format!("{lo}-{hi}"))
        .unwrap_or_default();
    format!("genres={}|venues={}|price={}", genres.join(","), venues.join(","), price)
}
