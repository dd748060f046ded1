//! Worker daemon configuration (§6 "Environment variables"), loaded from
//! process environment, grounded in `taproot-core::config::AppConfig::from_env`'s
//! `std::env::var` + defaulted-parse style.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub mode: Mode,
    pub default_schedule: String,
    pub stagger_minutes: u32,
    pub enabled_sources: Vec<String>,
    pub disabled_sources: Vec<String>,
    pub rate_limit_per_min: u32,
    pub timeout: Duration,

    pub raw_data_dir: String,
    pub normalized_data_dir: String,
    pub log_dir: String,
    pub pid_file: String,
    pub log_retention_days: u32,

    pub use_database: bool,
    pub use_file_storage: bool,
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    pub pool_min: u32,
    pub pool_max: u32,

    pub catalog_interval_minutes: u32,
    pub shutdown_grace_period: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let enabled_sources = comma_list("INGESTOR_ENABLED_SOURCES");
        let disabled_sources = comma_list("INGESTOR_DISABLED_SOURCES");
        let overlap: HashSet<&String> =
            enabled_sources.iter().collect::<HashSet<_>>().intersection(&disabled_sources.iter().collect()).copied().collect();
        anyhow::ensure!(
            overlap.is_empty(),
            "INGESTOR_ENABLED_SOURCES and INGESTOR_DISABLED_SOURCES must be disjoint, overlap: {overlap:?}"
        );

        Ok(Self {
            mode: match env_or("INGESTOR_MODE", "development").as_str() {
                "production" => Mode::Production,
                _ => Mode::Development,
            },
            default_schedule: env_or("INGESTOR_DEFAULT_SCHEDULE", "0 */6 * * *"),
            stagger_minutes: env_parse_or("INGESTOR_STAGGER_MINUTES", 2)?,
            enabled_sources,
            disabled_sources,
            rate_limit_per_min: env_parse_or("INGESTOR_RATE_LIMIT_PER_MIN", 60)?,
            timeout: Duration::from_millis(env_parse_or("INGESTOR_TIMEOUT_MS", 30_000)?),

            raw_data_dir: env_or("INGESTOR_RAW_DATA_DIR", "data/raw"),
            normalized_data_dir: env_or("INGESTOR_NORMALIZED_DATA_DIR", "data/normalized"),
            log_dir: env_or("INGESTOR_LOG_DIR", "data/logs"),
            pid_file: env_or("INGESTOR_PID_FILE", "data/gigsignal-worker.pid"),
            log_retention_days: env_parse_or("INGESTOR_LOG_RETENTION_DAYS", 14)?,

            use_database: env_parse_or("INGESTOR_USE_DATABASE", false)?,
            use_file_storage: env_parse_or("INGESTOR_USE_FILE_STORAGE", true)?,
            database_url: std::env::var("DATABASE_URL").ok(),
            database_name: std::env::var("INGESTOR_DATABASE_NAME").ok(),
            pool_min: env_parse_or("INGESTOR_DB_POOL_MIN", 2)?,
            pool_max: env_parse_or("INGESTOR_DB_POOL_MAX", 10)?,

            catalog_interval_minutes: env_parse_or("INGESTOR_CATALOG_INTERVAL_MINUTES", 15)?,
            shutdown_grace_period: Duration::from_secs(env_parse_or("INGESTOR_SHUTDOWN_GRACE_SECS", 30)?),
        })
    }

    /// Startup banner: log char-counts of secret-shaped env vars, never
    /// their values (§9 supplement, grounded in
    /// `rootsignal-common::config::log_redacted`).
    pub fn log_redacted(&self) {
        let vars: [(&str, Option<&String>); 2] =
            [("DATABASE_URL", self.database_url.as_ref()), ("INGESTOR_DATABASE_NAME", self.database_name.as_ref())];
        for (name, value) in vars {
            match value {
                Some(v) if !v.is_empty() => tracing::info!("{name} = ({} chars)", v.len()),
                _ => tracing::info!("{name} = (empty)"),
            }
        }
        tracing::info!(
            mode = ?self.mode,
            default_schedule = %self.default_schedule,
            stagger_minutes = self.stagger_minutes,
            enabled_sources = ?self.enabled_sources,
            disabled_sources = ?self.disabled_sources,
            use_database = self.use_database,
            use_file_storage = self.use_file_storage,
            "worker config loaded"
        );
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn comma_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
    .with_context(|| format!("parsing {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_list_filters_blanks_and_trims() {
        std::env::set_var("TEST_GIGSIGNAL_LIST", " a, b ,,c");
        assert_eq!(comma_list("TEST_GIGSIGNAL_LIST"), vec!["a", "b", "c"]);
        std::env::remove_var("TEST_GIGSIGNAL_LIST");
    }

    #[test]
    fn env_parse_or_falls_back_on_missing_var() {
        std::env::remove_var("TEST_GIGSIGNAL_MISSING");
        let v: u32 = env_parse_or("TEST_GIGSIGNAL_MISSING", 42).unwrap();
        assert_eq!(v, 42);
    }
}
