use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synchronization and scene settings. Fixed for the lifetime of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Samples older than this are removed by the sweep (milliseconds)
    pub max_age_ms: i64,
    /// How often the staleness sweep runs (milliseconds)
    pub sweep_interval_ms: u64,
    /// Upper bound for a single sensor service call (milliseconds)
    pub poll_timeout_ms: u64,
    /// Poll the sensor data service every `update_interval_ms`
    pub poll_enabled: bool,
    /// Subscribe to the sensor push channel
    pub push_enabled: bool,
    /// Scene category enumerated for spaces
    pub space_category: String,
    /// Spaces whose name starts with this prefix are not addressable
    pub reserved_space_prefix: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_age_ms: 300_000,
            sweep_interval_ms: 30_000,
            poll_timeout_ms: 10_000,
            poll_enabled: true,
            push_enabled: true,
            space_category: "IfcSpace".to_string(),
            reserved_space_prefix: "Area".to_string(),
        }
    }
}

impl SyncSettings {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("HEATLAYER_MAX_AGE_MS") {
            if let Ok(n) = v.parse::<i64>() {
                cfg.max_age_ms = n;
            }
        }
        if let Ok(v) = std::env::var("HEATLAYER_SWEEP_INTERVAL_MS") {
            if let Ok(n) = v.parse::<u64>() {
                cfg.sweep_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("HEATLAYER_POLL_TIMEOUT_MS") {
            if let Ok(n) = v.parse::<u64>() {
                cfg.poll_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("HEATLAYER_POLL_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                cfg.poll_enabled = b;
            }
        }
        if let Ok(v) = std::env::var("HEATLAYER_PUSH_ENABLED") {
            if let Ok(b) = v.parse::<bool>() {
                cfg.push_enabled = b;
            }
        }

        cfg
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}
