//! Long-running ingestion daemon (C9 entrypoint): loads config, starts the
//! Scheduler, drives one `IngestionWorker` run per due source, persists
//! run/error/perf logs and the source health rollup, and periodically
//! regenerates the catalog.
//!
//! Grounded in `rootsignal-scout::main`'s shape: init logging, load
//! config, connect stores, build the driver, run it, log the summary.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gigsignal_catalog::{CatalogGenerator, CatalogOptions};
use gigsignal_dedup::TrustRegistry;
use gigsignal_ingest::IngestionWorker;
use gigsignal_observability::{
    prune_old_logs, ErrorLog, ErrorLogEntry, HealthRollup, PerfLog, PerfLogEntry, RunKind, RunLog,
};
use gigsignal_plugin::PluginRegistry;
use gigsignal_ratelimit::RateLimiterRegistry;
use gigsignal_scheduler::{PidFile, ScheduleConfig, Scheduler, SourceSchedule};
use gigsignal_store::{CatalogStore, FileSnapshotStore, PostgresDocumentStore, SnapshotStore};
use gigsignal_validate::Sanitizer;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gigsignal=info".parse()?))
        .init();

    info!("gigsignal worker starting");

    let config = WorkerConfig::from_env()?;
    config.log_redacted();

    let _pid_lock = PidFile::acquire(&config.pid_file)?;

    // §9: the per-site scraper implementation is an external collaborator;
    // this registry is the seam a deployment wires concrete plugins into.
    // A bare daemon boots with an empty registry and simply has nothing to
    // schedule, which is surfaced below rather than treated as an error.
    let plugins = Arc::new(PluginRegistry::new());
    if plugins.sources().is_empty() {
        warn!("no scraper plugins registered; the scheduler will have nothing to dispatch");
    }

    let snapshot_store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(&config.normalized_data_dir));
    let catalog_store = Arc::new(CatalogStore::new(format!("{}/catalog.json", config.normalized_data_dir)));

    let document_store = if config.use_database {
        match &config.database_url {
            Some(url) => match PostgresDocumentStore::connect(url, config.pool_max).await {
                Ok(store) => {
                    if let Err(e) = store.migrate().await {
                        warn!(error = %e, "document store migration failed");
                    }
                    Some(Arc::new(store))
                }
                Err(e) => {
                    error!(error = %e, "failed to connect document store, continuing file-only");
                    None
                }
            },
            None => {
                warn!("INGESTOR_USE_DATABASE set but DATABASE_URL is unset; continuing file-only");
                None
            }
        }
    } else {
        None
    };

    let limiters = Arc::new(RateLimiterRegistry::new());
    let run_log = Arc::new(Mutex::new(RunLog::new(RunKind::IngestAll, run_id())));
    let error_log = Arc::new(ErrorLog::new(&config.log_dir));
    let perf_log = Arc::new(PerfLog::new(&config.log_dir));
    let health = Arc::new(Mutex::new(HealthRollup::new()));

    let schedule_config = ScheduleConfig {
        default_schedule: config.default_schedule.clone(),
        per_source: config
            .enabled_sources
            .iter()
            .chain(config.disabled_sources.iter())
            .map(|s| (s.clone(), SourceSchedule { cron: None, stagger_minutes: config.stagger_minutes }))
            .collect(),
        enabled: config.enabled_sources.clone(),
        disabled: config.disabled_sources.clone(),
    };
    let scheduler = Scheduler::new(schedule_config)?;

    let catalog_task = spawn_catalog_loop(
        config.clone(),
        snapshot_store.clone(),
        catalog_store.clone(),
        plugins.clone(),
        run_log.clone(),
    );
    let run_log_flush_task = spawn_run_log_flush_loop(config.clone(), run_log.clone());

    let sources = plugins.sources();
    let dispatch_config = config.clone();
    scheduler
        .run(
            &sources,
            move |source| {
                let plugins = plugins.clone();
                let limiters = limiters.clone();
                let snapshot_store = snapshot_store.clone();
                let document_store = document_store.clone();
                let run_log = run_log.clone();
                let error_log = error_log.clone();
                let perf_log = perf_log.clone();
                let health = health.clone();
                let config = dispatch_config.clone();
                async move {
                    run_source(
                        source, plugins, limiters, snapshot_store, document_store, run_log, error_log, perf_log,
                        health, config,
                    )
                    .await;
                }
            },
            config.shutdown_grace_period,
        )
        .await;

    catalog_task.abort();
    run_log_flush_task.abort();
    if let Err(e) = run_log.lock().await.save(&config.log_dir).await {
        error!(error = %e, "failed to flush run log on shutdown");
    }
    info!("gigsignal worker shut down");
    Ok(())
}

/// Periodically flush the in-memory run log timeline to disk (§4.14, §6),
/// and prune dated log files past `INGESTOR_LOG_RETENTION_DAYS` (§6), so a
/// long-lived daemon doesn't lose its run history between restarts or grow
/// its log directory unbounded.
fn spawn_run_log_flush_loop(config: WorkerConfig, run_log: Arc<Mutex<RunLog>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(config.catalog_interval_minutes.max(1) as u64 * 60);
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = run_log.lock().await.save(&config.log_dir).await {
                warn!(error = %e, "failed to flush run log");
            }
            match prune_old_logs(&config.log_dir, config.log_retention_days).await {
                Ok(removed) if removed > 0 => info!(removed, "pruned expired log files"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "log retention sweep failed"),
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
async fn run_source(
    source: String,
    plugins: Arc<PluginRegistry>,
    limiters: Arc<RateLimiterRegistry>,
    snapshot_store: Arc<dyn SnapshotStore>,
    document_store: Option<Arc<PostgresDocumentStore>>,
    run_log: Arc<Mutex<RunLog>>,
    error_log: Arc<ErrorLog>,
    perf_log: Arc<PerfLog>,
    health: Arc<Mutex<HealthRollup>>,
    config: WorkerConfig,
) {
    let Some(plugin) = plugins.get(&source) else {
        run_log.lock().await.source_skipped(&source, "no plugin registered");
        return;
    };

    run_log.lock().await.source_started(&source);

    let rate_limit = plugin.upstream_meta().rate_limit_per_min.max(config.rate_limit_per_min);
    let limiter = limiters.get_or_create(&source, rate_limit).await;

    let previous = match snapshot_store.load_snapshot(&source).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(source = %source, error = %e, "previous snapshot unreadable, treating as empty");
            let entry = ErrorLogEntry::new(&source, e.to_string(), gigsignal_common::Severity::Critical);
            let _ = error_log.append(&entry).await;
            None
        }
    };

    let mut worker = IngestionWorker::new(plugin, limiter, Sanitizer::new(true));
    worker.snapshot_store = Some(snapshot_store);
    worker.document_store = document_store.map(|s| -> Arc<dyn gigsignal_store::DocumentStore> { s });
    worker.raw_archive_dir = Some(config.raw_data_dir.clone().into());
    worker.fetch_timeout = config.timeout;

    let outcome = worker.run_once(&source, previous).await;

    if !outcome.stats.succeeded {
        let severity = outcome.stats.severity.unwrap_or(gigsignal_common::Severity::Critical);
        let message = outcome.stats.errors.join("; ");
        let _ = error_log.append(&ErrorLogEntry::new(&source, message, severity)).await;
    }
    let _ = perf_log.append(&PerfLogEntry::from_stats(&outcome.stats)).await;
    health.lock().await.record(&outcome.stats);

    let mut source_log = RunLog::for_source(&source, source_run_id(&source));
    source_log.source_started(&source);
    source_log.record(outcome.stats.clone());
    if let Err(e) = source_log.save(&config.log_dir).await {
        warn!(source = %source, error = %e, "failed to save per-source run log");
    }

    run_log.lock().await.record(outcome.stats);
}

fn spawn_catalog_loop(
    config: WorkerConfig,
    snapshot_store: Arc<dyn SnapshotStore>,
    catalog_store: Arc<CatalogStore>,
    plugins: Arc<PluginRegistry>,
    run_log: Arc<Mutex<RunLog>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut version = 0u64;
        let interval = Duration::from_secs(config.catalog_interval_minutes.max(1) as u64 * 60);
        loop {
            tokio::time::sleep(interval).await;

            let mut snapshots = Vec::new();
            for source in plugins.sources() {
                match snapshot_store.load_snapshot(&source).await {
                    Ok(Some(snapshot)) => snapshots.push(snapshot),
                    Ok(None) => {}
                    Err(e) => warn!(source = %source, error = %e, "skipping unreadable snapshot in catalog regeneration"),
                }
            }
            if snapshots.is_empty() {
                continue;
            }

            version += 1;
            let generator = CatalogGenerator::new(TrustRegistry::new(), CatalogOptions::default(), version);
            let catalog = generator.generate(snapshots);
            let gig_count = catalog.gigs.len();
            let duplicates_removed = catalog.metadata.dedup_counters.duplicates_removed;

            if let Err(e) = catalog_store.save(&catalog).await {
                error!(error = %e, "failed to persist regenerated catalog");
                continue;
            }
            run_log.lock().await.catalog_generated(version, gig_count, duplicates_removed);
            info!(version, gig_count, duplicates_removed, "catalog regenerated");
        }
    })
}

fn run_id() -> String {
    format!("worker-{}", Utc::now().format("%Y%m%dT%H%M%S"))
}

fn source_run_id(source: &str) -> String {
    format!("{source}-{}", Utc::now().format("%Y%m%dT%H%M%S"))
}
