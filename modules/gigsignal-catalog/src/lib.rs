//! Catalog Generator (§4.8): union of eligible per-source snapshots, dedup,
//! sort, emit the catalog document, diff against a previous catalog.

pub mod catalog;

pub use catalog::{CatalogGenerator, CatalogOptions};
