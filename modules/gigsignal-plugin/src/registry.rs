//! Process-wide plugin registry (§9: explicit init/teardown, no
//! module-load side effects). Per-site scraper implementations are
//! external collaborators (§1 scope); this registry is the seam a
//! deployment wires concrete `ScraperPlugin`s into before starting the
//! scheduler.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ScraperPlugin;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, Arc<dyn ScraperPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source: impl Into<String>, plugin: Arc<dyn ScraperPlugin>) {
        self.plugins.write().expect("plugin registry poisoned").insert(source.into(), plugin);
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn ScraperPlugin>> {
        self.plugins.read().expect("plugin registry poisoned").get(source).cloned()
    }

    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> =
            self.plugins.read().expect("plugin registry poisoned").keys().cloned().collect();
        sources.sort();
        sources
    }
}
