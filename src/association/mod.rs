// Sensor <-> space association table

use crate::error::HeatmapError;
use crate::persistence::AssociationPersistence;
use crate::space::SpatialElement;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// User-defined link between one sensor and one space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// UUIDv7 identifier
    pub id: String,
    pub sensor_id: String,
    pub space_guid: String,
    #[serde(default)]
    pub space_name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Space as offered for association; the guid may be unresolved
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceRef {
    pub guid: Option<String>,
    pub name: String,
}

impl SpaceRef {
    pub fn new(guid: &str, name: &str) -> Self {
        Self {
            guid: Some(guid.to_string()),
            name: name.to_string(),
        }
    }
}

impl From<&SpatialElement> for SpaceRef {
    fn from(space: &SpatialElement) -> Self {
        Self::new(&space.guid, &space.name)
    }
}

/// Owns the association table. At most one entry per (sensor, space).
#[derive(Debug, Default)]
pub struct AssociationStore {
    associations: Vec<Association>,
}

impl AssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from the persistence collaborator.
    ///
    /// Entries that fail to parse or lack a sensor id or guid are skipped.
    /// A missing, unreadable or corrupt document leaves the table empty.
    /// Returns the number of loaded associations.
    pub async fn load(&mut self, persistence: &dyn AssociationPersistence) -> usize {
        self.associations.clear();

        let document = match persistence.get_associations().await {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!("No stored associations");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch associations, starting empty");
                return 0;
            }
        };

        let entries: Vec<Value> = match serde_json::from_str(&document) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Corrupt association document, starting empty");
                return 0;
            }
        };

        let mut skipped = 0usize;
        for entry in entries {
            match serde_json::from_value::<Association>(entry) {
                Ok(association)
                    if !association.sensor_id.is_empty() && !association.space_guid.is_empty() =>
                {
                    self.insert_or_replace(association);
                }
                Ok(association) => {
                    warn!(id = %association.id, "Association without sensor or space, skipping");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Malformed association entry, skipping");
                    skipped += 1;
                }
            }
        }

        info!(
            associations = self.associations.len(),
            skipped = skipped,
            "Loaded associations"
        );
        self.associations.len()
    }

    /// Write the table to the persistence collaborator
    pub async fn save(&self, persistence: &dyn AssociationPersistence) -> Result<()> {
        let json = serde_json::to_string(&self.associations)
            .context("Failed to serialize associations")?;
        persistence
            .save_associations(&json)
            .await
            .context("Failed to save associations")
    }

    /// Create or replace the association for `(sensor_id, space.guid)`.
    ///
    /// On conflict the existing id is kept and name and activity are taken
    /// from this call.
    pub fn upsert(&mut self, sensor_id: &str, space: &SpaceRef) -> Result<&Association, HeatmapError> {
        if sensor_id.trim().is_empty() {
            return Err(HeatmapError::InvalidAssociation(
                "sensor id is empty".to_string(),
            ));
        }
        let guid = match space.guid.as_deref().map(str::trim) {
            Some(guid) if !guid.is_empty() => guid,
            _ => {
                return Err(HeatmapError::InvalidAssociation(format!(
                    "space '{}' has no guid",
                    space.name
                )))
            }
        };

        let association = Association {
            id: Uuid::now_v7().to_string(),
            sensor_id: sensor_id.to_string(),
            space_guid: guid.to_string(),
            space_name: space.name.clone(),
            is_active: true,
        };
        let index = self.insert_or_replace(association);
        let association = &self.associations[index];
        info!(
            id = %association.id,
            sensor_id = %association.sensor_id,
            space_guid = %association.space_guid,
            "Association upserted"
        );
        Ok(association)
    }

    fn insert_or_replace(&mut self, association: Association) -> usize {
        match self.associations.iter().position(|a| {
            a.sensor_id == association.sensor_id && a.space_guid == association.space_guid
        }) {
            Some(index) => {
                let existing_id = std::mem::take(&mut self.associations[index].id);
                self.associations[index] = Association {
                    id: existing_id,
                    ..association
                };
                index
            }
            None => {
                self.associations.push(association);
                self.associations.len() - 1
            }
        }
    }

    pub fn remove(&mut self, association_id: &str) -> Result<Association, HeatmapError> {
        let index = self
            .associations
            .iter()
            .position(|a| a.id == association_id)
            .ok_or_else(|| HeatmapError::UnknownAssociation(association_id.to_string()))?;
        let removed = self.associations.remove(index);
        info!(id = %removed.id, "Association removed");
        Ok(removed)
    }

    pub fn set_active(&mut self, association_id: &str, active: bool) -> Result<(), HeatmapError> {
        let association = self
            .associations
            .iter_mut()
            .find(|a| a.id == association_id)
            .ok_or_else(|| HeatmapError::UnknownAssociation(association_id.to_string()))?;
        association.is_active = active;
        Ok(())
    }

    /// All associations targeting a space
    pub fn by_space(&self, space_guid: &str) -> Vec<&Association> {
        self.associations
            .iter()
            .filter(|a| a.space_guid == space_guid)
            .collect()
    }

    pub fn by_sensor(&self, sensor_id: &str) -> Vec<&Association> {
        self.associations
            .iter()
            .filter(|a| a.sensor_id == sensor_id)
            .collect()
    }

    /// Active association linking this sensor to this space exists
    pub fn is_linked(&self, sensor_id: &str, space_guid: &str) -> bool {
        self.associations
            .iter()
            .any(|a| a.is_active && a.sensor_id == sensor_id && a.space_guid == space_guid)
    }

    pub fn get(&self, association_id: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.id == association_id)
    }

    pub fn all(&self) -> &[Association] {
        &self.associations
    }

    /// Replace the whole table, keeping the one-per-pair invariant
    pub fn replace_all(&mut self, associations: Vec<Association>) {
        self.associations.clear();
        for association in associations {
            self.insert_or_replace(association);
        }
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    pub fn clear(&mut self) {
        self.associations.clear();
    }
}
