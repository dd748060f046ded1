//! Ingestion Worker and Change Detector (§4.4, §4.5).

pub mod change;
pub mod stats;
pub mod worker;

pub use change::{diff, ChangeSet};
pub use stats::RunStats;
pub use worker::{IngestionWorker, RunOutcome};
