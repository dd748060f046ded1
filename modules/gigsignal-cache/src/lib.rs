//! Tiered in-process cache (§4.10) sitting in front of the Query Surface.

pub mod tiered;

pub use tiered::{CacheHit, CacheStats, TieredCache};
