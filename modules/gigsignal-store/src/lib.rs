//! Persistence adapters (§4.13): two interchangeable back ends behind
//! trait-based query contracts, plus the single catalog document.

pub mod catalog;
pub mod file;
pub mod postgres;

pub use catalog::CatalogStore;
pub use file::{FileSnapshotStore, SnapshotStore};
pub use postgres::{DocumentQuery, DocumentStore, PostgresDocumentStore, SortBy};
