use crate::association::Association;
use crate::config::HeatmapConfig;
use crate::error::HeatmapError;
use crate::persistence::{read_document, write_document};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: &str = "1";

/// Configuration and association table, handed to external persistence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSnapshot {
    /// Snapshot format version (for future schema evolution)
    pub snapshot_version: String,

    /// Timestamp when snapshot was created
    pub created_at: DateTime<Utc>,

    pub config: HeatmapConfig,

    #[serde(default)]
    pub associations: Vec<Association>,
}

impl HeatmapSnapshot {
    pub fn new(config: HeatmapConfig, associations: Vec<Association>) -> Self {
        Self {
            snapshot_version: SNAPSHOT_VERSION.to_string(),
            created_at: Utc::now(),
            config,
            associations,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize snapshot to JSON")
    }

    /// Parse and validate a snapshot document.
    ///
    /// Rejects unknown versions and associations without sensor id or guid.
    pub fn from_json(json: &str) -> Result<Self, HeatmapError> {
        let mut snapshot: HeatmapSnapshot = serde_json::from_str(json)
            .map_err(|e| HeatmapError::InvalidSnapshot(e.to_string()))?;

        if snapshot.snapshot_version != SNAPSHOT_VERSION {
            return Err(HeatmapError::InvalidSnapshot(format!(
                "unsupported snapshot version '{}'",
                snapshot.snapshot_version
            )));
        }
        if let Some(bad) = snapshot
            .associations
            .iter()
            .find(|a| a.sensor_id.trim().is_empty() || a.space_guid.trim().is_empty())
        {
            return Err(HeatmapError::InvalidSnapshot(format!(
                "association '{}' lacks a sensor id or space guid",
                bad.id
            )));
        }

        snapshot.config.sanitize();
        Ok(snapshot)
    }

    /// Save snapshot to filesystem (gzip when the path ends in `.gz`)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        write_document(path, &self.to_json()?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = read_document(path)?;
        Ok(Self::from_json(&json)?)
    }

    pub fn association_count(&self) -> usize {
        self.associations.len()
    }
}
