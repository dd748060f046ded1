//! Per-source rate limiting with exponential backoff (§4.2).
//!
//! Grounded in `rootsignal-scout::scheduling::budget::BudgetTracker`'s use
//! of a small internal state guarded by a single lock plus plain arithmetic
//! for admission/backoff policy — no external token-bucket crate.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod registry;
pub use registry::RateLimiterRegistry;

const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
const WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of a rate limiter's admission state (§4.2 "Status query").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterStatus {
    pub recent_requests: usize,
    pub remaining_requests: usize,
    pub backoff_delay: Duration,
    pub throttled: bool,
}

struct State {
    /// Rolling window of admitted request timestamps.
    timestamps: VecDeque<Instant>,
    backoff: Duration,
}

/// A single source's token-bucket-over-a-rolling-minute limiter.
pub struct RateLimiter {
    requests_per_minute: u32,
    burst_limit: u32,
    multiplier: f64,
    max_backoff: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_burst(requests_per_minute, requests_per_minute)
    }

    pub fn with_burst(requests_per_minute: u32, burst_limit: u32) -> Self {
        Self {
            requests_per_minute,
            burst_limit,
            multiplier: DEFAULT_MULTIPLIER,
            max_backoff: DEFAULT_MAX_BACKOFF,
            state: Mutex::new(State {
                timestamps: VecDeque::new(),
                backoff: Duration::ZERO,
            }),
        }
    }

    /// Block until admission is granted: evicts timestamps older than the
    /// rolling window, waits for a free slot if at capacity, then waits out
    /// any accrued backoff before returning.
    pub async fn admit(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            evict_expired(&mut state.timestamps, now);

            let cap = self.requests_per_minute.min(self.burst_limit).max(1) as usize;
            let wait_for_slot = if state.timestamps.len() >= cap {
                state
                    .timestamps
                    .front()
                    .map(|oldest| (*oldest + WINDOW).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            } else {
                Duration::ZERO
            };

            wait_for_slot.max(state.backoff)
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let mut state = self.state.lock().await;
        let now = Instant::now();
        evict_expired(&mut state.timestamps, now);
        state.timestamps.push_back(now);
    }

    /// Halve the current backoff (floor zero) after a successful fetch.
    pub async fn on_success(&self) {
        let mut state = self.state.lock().await;
        state.backoff = state.backoff / 2;
    }

    /// Raise backoff per §4.2: `min(maxBackoff, max(1s, backoff * multiplier))`.
    pub async fn on_failure(&self) {
        let mut state = self.state.lock().await;
        let bumped = state.backoff.mul_f64(self.multiplier).max(Duration::from_secs(1));
        state.backoff = bumped.min(self.max_backoff);
    }

    pub async fn status(&self) -> RateLimiterStatus {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        evict_expired(&mut state.timestamps, now);

        let recent = state.timestamps.len();
        let cap = self.requests_per_minute.min(self.burst_limit).max(1) as usize;
        RateLimiterStatus {
            recent_requests: recent,
            remaining_requests: cap.saturating_sub(recent),
            backoff_delay: state.backoff,
            throttled: state.backoff > Duration::ZERO || recent >= cap,
        }
    }
}

fn evict_expired(timestamps: &mut VecDeque<Instant>, now: Instant) {
    while let Some(front) = timestamps.front() {
        if now.duration_since(*front) > WINDOW {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
