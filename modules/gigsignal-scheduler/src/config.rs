//! Schedule configuration: default cron expression, per-source overrides,
//! stagger, and enable/disable lists (§4.9).

use std::collections::HashMap;

use gigsignal_common::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSchedule {
    pub cron: Option<String>,
    #[serde(default)]
    pub stagger_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub default_schedule: String,
    #[serde(default)]
    pub per_source: HashMap<String, SourceSchedule>,
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl ScheduleConfig {
    /// Overlap between `enabled` and `disabled` is a configuration error (§4.9).
    pub fn validate(&self) -> Result<(), Error> {
        for source in &self.enabled {
            if self.disabled.contains(source) {
                return Err(Error::InvalidQuery(format!(
                    "source {source} appears in both enabled and disabled lists"
                )));
            }
        }
        Ok(())
    }

    /// A source is eligible unless explicitly disabled, or an `enabled`
    /// allow-list is set and it is absent from it.
    pub fn is_enabled(&self, source: &str) -> bool {
        if self.disabled.iter().any(|s| s == source) {
            return false;
        }
        if !self.enabled.is_empty() {
            return self.enabled.iter().any(|s| s == source);
        }
        true
    }

    pub fn cron_for(&self, source: &str) -> &str {
        self.per_source
            .get(source)
            .and_then(|s| s.cron.as_deref())
            .unwrap_or(&self.default_schedule)
    }

    pub fn stagger_minutes_for(&self, source: &str) -> u32 {
        self.per_source.get(source).map(|s| s.stagger_minutes).unwrap_or(0)
    }
}
