//! Process-wide registry of per-source rate limiters (§5, §9: explicit
//! init/teardown, no module-load side effects).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::RateLimiter;

#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the limiter for a source. Only the owning Ingestion
    /// Worker for that source ever calls `admit`/`on_success`/`on_failure`
    /// on the returned handle (§5 "Shared resource policy").
    pub async fn get_or_create(&self, source: &str, requests_per_minute: u32) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(requests_per_minute)))
            .clone()
    }

    pub async fn remove(&self, source: &str) {
        self.limiters.lock().await.remove(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_returns_same_instance() {
        let registry = RateLimiterRegistry::new();
        let a = registry.get_or_create("ticketmaster", 60).await;
        let b = registry.get_or_create("ticketmaster", 60).await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
