//! Query Surface (§4.11): validated, paginated list/detail reads backed by
//! the Tiered Cache (C10), plus the cache-control hint for the (external)
//! HTTP shell.

pub mod key;
pub mod surface;
pub mod types;

pub use key::list_query_key;
pub use surface::{CacheControl, EventSource, QuerySurface};
pub use types::{ListFilters, ListOptions, ListResult, SortBy, TimeRange};
