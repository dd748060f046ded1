//! Scheduler loop: per-source cron triggers with stagger, re-entrancy
//! guard, and graceful SIGTERM/SIGINT drain (§4.9).

use std::collections::HashSet;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::ScheduleConfig;

/// A source eligible for scheduling, paired with its parsed cron schedule.
struct SourceTrigger {
    name: String,
    schedule: Schedule,
    stagger: Duration,
}

/// Tracks which sources currently have an in-flight run, so a new tick can
/// be skipped rather than queued (§4.9).
#[derive(Default, Clone)]
pub struct InFlightGuard {
    running: Arc<Mutex<HashSet<String>>>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to mark `source` as running. Returns `false` (and logs) if a
    /// run for this source is already in progress.
    fn try_start(&self, source: &str) -> bool {
        let mut running = self.running.lock().expect("in-flight guard poisoned");
        if running.contains(source) {
            false
        } else {
            running.insert(source.to_string());
            true
        }
    }

    fn finish(&self, source: &str) {
        self.running.lock().expect("in-flight guard poisoned").remove(source);
    }
}

/// Poll loop that evaluates each source's cron schedule once per minute and
/// fires `run` for any source that is due. `run` must itself be cheap to
/// spawn; the guard ensures overlapping ticks for the same source are
/// skipped, not queued.
pub struct Scheduler {
    config: ScheduleConfig,
    guard: InFlightGuard,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig) -> Result<Self, gigsignal_common::Error> {
        config.validate()?;
        Ok(Self {
            config,
            guard: InFlightGuard::new(),
            poll_interval: Duration::from_secs(60),
        })
    }

    /// Drive the scheduler until a shutdown signal arrives, draining
    /// in-flight work for up to `grace_period` before returning.
    pub async fn run<F, Fut>(&self, sources: &[String], mut dispatch: F, grace_period: Duration)
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let triggers = self.build_triggers(sources);
        let mut last_fired: std::collections::HashMap<String, chrono::DateTime<Utc>> =
            std::collections::HashMap::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let mut in_flight: Vec<tokio::task::JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = sleep(self.poll_interval) => {
                    let now = Utc::now();
                    for trigger in &triggers {
                        if !self.is_due(trigger, now, last_fired.get(&trigger.name)) {
                            continue;
                        }
                        last_fired.insert(trigger.name.clone(), now);

                        if !self.guard.try_start(&trigger.name) {
                            warn!(source = %trigger.name, "tick skipped: previous run still in progress");
                            continue;
                        }

                        let stagger = trigger.stagger;
                        let source = trigger.name.clone();
                        let guard = self.guard.clone();
                        let fut = dispatch(source.clone());
                        in_flight.push(tokio::spawn(async move {
                            if !stagger.is_zero() {
                                sleep(stagger).await;
                            }
                            fut.await;
                            guard.finish(&source);
                        }));
                    }
                    in_flight.retain(|h| !h.is_finished());
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received, draining in-flight runs");
                    break;
                }
            }
        }

        let drain = futures::future::join_all(in_flight.drain(..));
        if tokio::time::timeout(grace_period, drain).await.is_err() {
            warn!(grace_period_secs = grace_period.as_secs(), "grace period elapsed with runs still in flight");
        }
    }

    fn build_triggers(&self, sources: &[String]) -> Vec<SourceTrigger> {
        sources
            .iter()
            .filter(|s| self.config.is_enabled(s))
            .filter_map(|source| {
                let expr = self.config.cron_for(source);
                match Schedule::from_str(expr) {
                    Ok(schedule) => Some(SourceTrigger {
                        name: source.clone(),
                        schedule,
                        stagger: Duration::from_secs(self.config.stagger_minutes_for(source) as u64 * 60),
                    }),
                    Err(e) => {
                        warn!(source = %source, cron = %expr, error = %e, "invalid cron expression, source disabled");
                        None
                    }
                }
            })
            .collect()
    }

    fn is_due(&self, trigger: &SourceTrigger, now: chrono::DateTime<Utc>, last_fired: Option<&chrono::DateTime<Utc>>) -> bool {
        let window_start = last_fired.copied().unwrap_or(now - chrono::Duration::minutes(1));
        trigger.schedule.after(&window_start).next().map(|t| t <= now).unwrap_or(false)
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
