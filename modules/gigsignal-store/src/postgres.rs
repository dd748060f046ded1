//! JSONB-backed document store (§4.13).
//!
//! Grounded in `rootsignal-archive::store::ArchiveStore`: a thin wrapper
//! around a `PgPool`, runtime-checked `sqlx::query`/`query_as` (no
//! compile-time `query!` macros, since there is no live database at build
//! time), warn-and-continue on non-fatal write failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gigsignal_common::types::Event;
use gigsignal_common::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::warn;

/// How to order a query's results (§4.11's sort options, reused here since
/// the document store performs its own sort/paginate per §4.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Date,
    Name,
    Venue,
}

/// The predicate set the document store must support (§4.13).
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub city: Option<String>,
    pub tag: Option<String>,
    pub venue_name: Option<String>,
    pub source: Option<String>,
    pub text: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Default `true`: only events whose `date_start` is in the future.
    pub future_only: bool,
    pub sort_by: Option<SortBy>,
    pub page: u32,
    pub limit: u32,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self {
            future_only: true,
            page: 1,
            limit: 50,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert(&self, event: &Event) -> Result<()>;
    async fn get(&self, gig_id: &str) -> Result<Option<Event>>;
    async fn query(&self, query: &DocumentQuery) -> Result<(Vec<Event>, usize)>;
    /// Connection-health probe; a failed probe should force the caller to
    /// reconnect rather than reuse this instance (§4.13).
    async fn health_check(&self) -> Result<bool>;
}

pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// `max_connections` bounds the pool per §5's resource policy.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| Error::Anyhow(e.into()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Anyhow(e.into()))?;
        Ok(())
    }
}

fn search_text(event: &Event) -> String {
    let mut parts = vec![event.title.clone(), event.venue.name.clone()];
    parts.extend(event.artists.iter().cloned());
    parts.extend(event.tags.iter().cloned());
    parts.join(" ").to_lowercase()
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn upsert(&self, event: &Event) -> Result<()> {
        let document = serde_json::to_value(event).map_err(|e| Error::InvalidGigData(e.to_string()))?;
        let result = sqlx::query(
            r#"
            INSERT INTO gigs
                (gig_id, source, city, venue_name, tags, date_start, search_text, document, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (gig_id) DO UPDATE SET
                source = EXCLUDED.source,
                city = EXCLUDED.city,
                venue_name = EXCLUDED.venue_name,
                tags = EXCLUDED.tags,
                date_start = EXCLUDED.date_start,
                search_text = EXCLUDED.search_text,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&event.id)
        .bind(&event.source)
        .bind(&event.venue.city)
        .bind(&event.venue.name)
        .bind(&event.tags)
        .bind(event.date_start)
        .bind(search_text(event))
        .bind(&document)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = &result {
            warn!(gig_id = %event.id, error = %e, "failed to upsert gig document");
        }
        result.map(|_| ()).map_err(|e| Error::Anyhow(e.into()))
    }

    async fn get(&self, gig_id: &str) -> Result<Option<Event>> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT document FROM gigs WHERE gig_id = $1")
                .bind(gig_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Anyhow(e.into()))?;

        row.map(|(document,)| {
            serde_json::from_value(document).map_err(|e| Error::CorruptCatalog(e.to_string()))
        })
        .transpose()
    }

    async fn query(&self, query: &DocumentQuery) -> Result<(Vec<Event>, usize)> {
        let mut clauses: Vec<String> = Vec::new();
        if query.city.is_some() {
            clauses.push("lower(city) = lower($city)".to_string());
        }
        if query.venue_name.is_some() {
            clauses.push("lower(venue_name) = lower($venue_name)".to_string());
        }
        if query.source.is_some() {
            clauses.push("source = $source".to_string());
        }
        if query.tag.is_some() {
            clauses.push("$tag = ANY(tags)".to_string());
        }
        if query.text.is_some() {
            clauses.push("search_text LIKE $text".to_string());
        }
        if query.future_only && query.date_from.is_none() {
            clauses.push("date_start >= now()".to_string());
        }
        if query.date_from.is_some() {
            clauses.push("date_start >= $date_from".to_string());
        }
        if query.date_to.is_some() {
            clauses.push("date_start <= $date_to".to_string());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let order_sql = match query.sort_by {
            Some(SortBy::Name) => "ORDER BY search_text ASC",
            Some(SortBy::Venue) => "ORDER BY venue_name ASC",
            Some(SortBy::Date) | None => "ORDER BY date_start ASC",
        };

        // Runtime-built SQL (named placeholders resolved to positional below)
        // mirrors the teacher's preference for `sqlx::query_as` over the
        // compile-time macro, since predicates here are optional.
        let sql = build_positional_sql(&where_sql, order_sql, query.page, query.limit);
        let count_sql = build_count_sql(&where_sql);

        let mut q = sqlx::query_as::<_, (serde_json::Value,)>(&sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);

        if let Some(city) = &query.city {
            q = q.bind(city);
            count_q = count_q.bind(city);
        }
        if let Some(venue) = &query.venue_name {
            q = q.bind(venue);
            count_q = count_q.bind(venue);
        }
        if let Some(source) = &query.source {
            q = q.bind(source);
            count_q = count_q.bind(source);
        }
        if let Some(tag) = &query.tag {
            q = q.bind(tag);
            count_q = count_q.bind(tag);
        }
        if let Some(text) = &query.text {
            let pattern = format!("%{}%", text.to_lowercase());
            q = q.bind(pattern.clone());
            count_q = count_q.bind(pattern);
        }
        if let Some(from) = query.date_from {
            q = q.bind(from);
            count_q = count_q.bind(from);
        }
        if let Some(to) = query.date_to {
            q = q.bind(to);
            count_q = count_q.bind(to);
        }

        let total: i64 = count_q.fetch_one(&self.pool).await.map_err(|e| Error::Anyhow(e.into()))?;
        let rows = q.fetch_all(&self.pool).await.map_err(|e| Error::Anyhow(e.into()))?;

        let events = rows
            .into_iter()
            .map(|(document,)| {
                serde_json::from_value(document).map_err(|e| Error::CorruptCatalog(e.to_string()))
            })
            .collect::<Result<Vec<Event>>>()?;

        Ok((events, total.max(0) as usize))
    }

    async fn health_check(&self) -> Result<bool> {
        match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(error = %e, "document store health probe failed");
                Ok(false)
            }
        }
    }
}

fn build_positional_sql(where_sql: &str, order_sql: &str, page: u32, limit: u32) -> String {
    let offset = (page.saturating_sub(1) as i64) * (limit as i64);
    let sql = format!(
        "SELECT document FROM gigs {where_sql} {order_sql} LIMIT {limit} OFFSET {offset}"
    );
    rename_placeholders(&sql)
}

fn build_count_sql(where_sql: &str) -> String {
    let sql = format!("SELECT count(*) FROM gigs {where_sql}");
    rename_placeholders(&sql)
}

/// Rewrite `$name` placeholders into positional `$1, $2, ...` in first-seen
/// order, matching the bind order callers build up above.
fn rename_placeholders(sql: &str) -> String {
    let names = ["$city", "$venue_name", "$source", "$tag", "$text", "$date_from", "$date_to"];
    let mut out = sql.to_string();
    let mut next = 1;
    for name in names {
        if out.contains(name) {
            out = out.replace(name, &format!("${next}"));
            next += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_placeholders_is_stable_order() {
        let sql = "WHERE lower(city) = lower($city) AND source = $source";
        assert_eq!(
            rename_placeholders(sql),
            "WHERE lower(city) = lower($1) AND source = $2"
        );
    }

    #[test]
    fn default_query_is_future_only_with_page_one() {
        let q = DocumentQuery::new();
        assert!(q.future_only);
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 50);
    }
}
