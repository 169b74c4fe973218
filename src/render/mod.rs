//! Overlay rendering.
//!
//! The renderer turns the sample cache into overlays on scene elements and
//! remembers every element it touched so `clear` can restore all of them.
//! Restoring means removing the overlay; the prior state captured in the
//! restore record is kept for inspection only.

use crate::association::AssociationStore;
use crate::color::{map_color, Color};
use crate::config::HeatmapConfig;
use crate::scene::{ModelRef, OverlayStyle, SceneEngine};
use crate::space::{ElementKey, SpatialElementIndex};
use crate::sync::SampleCache;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// State of an element before the heatmap first touched it
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRestoreRecord {
    pub element_key: ElementKey,
    pub prior_overlay: Option<OverlayStyle>,
}

/// Outcome of one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Overlays submitted successfully
    pub applied: usize,
    /// Elements whose overlay call failed
    pub failed: usize,
    /// Previously overlaid elements restored because they have no current data
    pub blanked: usize,
    /// Models redrawn
    pub redraws: usize,
}

#[derive(Default)]
pub struct HeatmapRenderer {
    records: BTreeMap<ElementKey, OverlayRestoreRecord>,
    /// Color last rendered per space guid
    colors: HashMap<String, Color>,
}

impl HeatmapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one pass.
    ///
    /// A sample is rendered when it is younger than `max_age_ms`, its sensor
    /// is actively linked to its space, and the space is in the index.
    /// Elements overlaid earlier but not targeted now are restored. Each
    /// touched model is redrawn exactly once.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        engine: &dyn SceneEngine,
        samples: &SampleCache,
        associations: &AssociationStore,
        index: &SpatialElementIndex,
        config: &HeatmapConfig,
        now_ms: i64,
        max_age_ms: i64,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        let mut touched: BTreeSet<ModelRef> = BTreeSet::new();
        let mut targeted: BTreeSet<ElementKey> = BTreeSet::new();
        let mut colors = HashMap::new();

        for sample in samples.iter() {
            if now_ms.saturating_sub(sample.timestamp) > max_age_ms {
                continue;
            }
            if !associations.is_linked(&sample.sensor_id, &sample.space_guid) {
                continue;
            }
            let Some(space) = index.lookup(&sample.space_guid) else {
                debug!(space_guid = %sample.space_guid, "Sample for unknown space");
                continue;
            };

            let key = space.key();
            let fresh = !self.records.contains_key(&key);
            if fresh {
                let prior_overlay = match engine.overlay_state(&key.model, key.local_id) {
                    Ok(prior) => prior,
                    Err(e) => {
                        warn!(
                            model = %key.model,
                            local_id = key.local_id,
                            error = %e,
                            "Failed to read overlay state, assuming none"
                        );
                        None
                    }
                };
                self.records.insert(
                    key.clone(),
                    OverlayRestoreRecord {
                        element_key: key.clone(),
                        prior_overlay,
                    },
                );
            }

            let color = map_color(sample.value, &sample.sensor_type, sample.quality, config);
            let style = OverlayStyle::new(color, config.opacity);
            touched.insert(key.model.clone());

            match engine.apply_overlay(&key.model, &[key.local_id], &style) {
                Ok(()) => {
                    report.applied += 1;
                    colors.insert(sample.space_guid.clone(), color);
                }
                Err(e) => {
                    warn!(
                        space_guid = %sample.space_guid,
                        model = %key.model,
                        local_id = key.local_id,
                        error = %e,
                        "Failed to apply overlay, skipping element"
                    );
                    report.failed += 1;
                    // Nothing was drawn yet; otherwise the stale color is blanked below
                    if fresh {
                        self.records.remove(&key);
                    }
                    continue;
                }
            }
            targeted.insert(key);
        }

        let orphaned: Vec<ElementKey> = self
            .records
            .keys()
            .filter(|key| !targeted.contains(*key))
            .cloned()
            .collect();
        for key in orphaned {
            touched.insert(key.model.clone());
            // A failed restore keeps its record and is retried on the next pass
            if self.restore(engine, &key) {
                self.records.remove(&key);
                report.blanked += 1;
            }
        }

        report.redraws = redraw(engine, &touched);
        self.colors = colors;

        debug!(
            applied = report.applied,
            failed = report.failed,
            blanked = report.blanked,
            "Render pass complete"
        );
        report
    }

    /// Restore every recorded element and discard the records.
    /// Never fails; engine errors are logged.
    pub fn clear(&mut self, engine: &dyn SceneEngine) -> usize {
        if self.records.is_empty() {
            self.colors.clear();
            return 0;
        }

        let keys: Vec<ElementKey> = self.records.keys().cloned().collect();
        let mut touched = BTreeSet::new();
        let mut restored = 0;
        for key in keys {
            touched.insert(key.model.clone());
            if self.restore(engine, &key) {
                restored += 1;
            }
        }
        // Records whose restore failed are dropped too
        self.records.clear();
        self.colors.clear();

        redraw(engine, &touched);
        info!(restored = restored, "Overlays cleared");
        restored
    }

    fn restore(&self, engine: &dyn SceneEngine, key: &ElementKey) -> bool {
        match engine.clear_overlay(&key.model, &[key.local_id]) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    model = %key.model,
                    local_id = key.local_id,
                    error = %e,
                    "Failed to restore element"
                );
                false
            }
        }
    }

    /// Forget records for models that are no longer loaded
    pub fn retain_models(&mut self, models: &BTreeSet<ModelRef>) {
        self.records.retain(|key, _| models.contains(&key.model));
    }

    /// Drop remembered colors; the next pass recomputes them
    pub fn invalidate_colors(&mut self) {
        self.colors.clear();
    }

    pub fn color_for(&self, space_guid: &str) -> Option<Color> {
        self.colors.get(space_guid).copied()
    }

    pub fn record(&self, key: &ElementKey) -> Option<&OverlayRestoreRecord> {
        self.records.get(key)
    }

    /// Number of elements currently modified by the heatmap
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

fn redraw(engine: &dyn SceneEngine, models: &BTreeSet<ModelRef>) -> usize {
    let mut redraws = 0;
    for model in models {
        match engine.batch_redraw(model) {
            Ok(()) => redraws += 1,
            Err(e) => warn!(model = %model, error = %e, "Batch redraw failed"),
        }
    }
    redraws
}
