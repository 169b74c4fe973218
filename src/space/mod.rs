// Addressable spaces of the loaded scene

use crate::scene::{ModelRef, SceneEngine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};


/// Identity of an element inside the scene
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey {
    pub model: ModelRef,
    pub local_id: u32,
}

/// Named spatial region (e.g. a room) of a loaded model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialElement {
    pub model: ModelRef,
    pub local_id: u32,
    /// Stable external identifier
    pub guid: String,
    pub name: String,
}

impl SpatialElement {
    pub fn key(&self) -> ElementKey {
        ElementKey {
            model: self.model.clone(),
            local_id: self.local_id,
        }
    }
}

/// Catalog of spaces, keyed by guid. Read-only between refreshes.
pub struct SpatialElementIndex {
    category: String,
    reserved_prefix: String,
    by_guid: HashMap<String, SpatialElement>,
    models: BTreeSet<ModelRef>,
}

impl SpatialElementIndex {
    pub fn new(category: &str, reserved_prefix: &str) -> Self {
        Self {
            category: category.to_string(),
            reserved_prefix: reserved_prefix.to_string(),
            by_guid: HashMap::new(),
            models: BTreeSet::new(),
        }
    }

    /// Rebuild the catalog from the given models.
    ///
    /// Elements without a guid are dropped. Names starting with the reserved
    /// prefix are excluded. A model that fails to enumerate is skipped.
    /// Returns the number of indexed spaces.
    pub fn refresh(&mut self, engine: &dyn SceneEngine, models: &[ModelRef]) -> usize {
        let mut by_guid = HashMap::new();
        let mut indexed_models = BTreeSet::new();
        let mut excluded = 0usize;
        let mut missing_guid = 0usize;

        for model in models {
            let elements = match engine.enumerate_elements(model, &self.category) {
                Ok(elements) => elements,
                Err(e) => {
                    warn!(model = %model, error = %e, "Failed to enumerate spaces, skipping model");
                    continue;
                }
            };
            indexed_models.insert(model.clone());

            for element in elements {
                let name = element.name.unwrap_or_default();
                if !self.reserved_prefix.is_empty() && name.starts_with(&self.reserved_prefix) {
                    excluded += 1;
                    continue;
                }

                let guid = match element.guid.filter(|g| !g.trim().is_empty()) {
                    Some(guid) => guid,
                    None => {
                        warn!(
                            model = %model,
                            local_id = element.local_id,
                            "Space has no guid, dropping"
                        );
                        missing_guid += 1;
                        continue;
                    }
                };

                let space = SpatialElement {
                    model: model.clone(),
                    local_id: element.local_id,
                    guid: guid.clone(),
                    name,
                };
                if let Some(previous) = by_guid.insert(guid, space) {
                    warn!(
                        guid = %previous.guid,
                        model = %previous.model,
                        local_id = previous.local_id,
                        "Duplicate space guid, keeping last"
                    );
                }
            }
        }

        info!(
            spaces = by_guid.len(),
            models = indexed_models.len(),
            excluded = excluded,
            missing_guid = missing_guid,
            "Spatial element index refreshed"
        );

        self.by_guid = by_guid;
        self.models = indexed_models;
        self.by_guid.len()
    }

    pub fn lookup(&self, guid: &str) -> Option<&SpatialElement> {
        self.by_guid.get(guid)
    }

    pub fn elements(&self) -> impl Iterator<Item = &SpatialElement> {
        self.by_guid.values()
    }

    /// Models that were successfully indexed by the last refresh
    pub fn models(&self) -> &BTreeSet<ModelRef> {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.by_guid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_guid.clear();
        self.models.clear();
    }
}
