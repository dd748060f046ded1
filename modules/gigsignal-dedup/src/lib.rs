//! Trust & Merge and the Deduplicator (§4.6, §4.7).

pub mod dedup;
pub mod trust;

pub use dedup::{DedupOptions, DedupResult, Deduplicator};
pub use trust::{merge, most_trusted, TrustRegistry};
