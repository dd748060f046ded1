//! Scheduler (§4.9): cron-style per-source triggers, stagger, PID lifecycle,
//! and graceful SIGTERM/SIGINT drain.

pub mod config;
pub mod pidfile;
pub mod runner;

pub use config::{ScheduleConfig, SourceSchedule};
pub use pidfile::PidFile;
pub use runner::{InFlightGuard, Scheduler};
