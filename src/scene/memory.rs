//! In-memory scene engine.
//!
//! Keeps overlay state in a map and counts engine calls. Used for headless
//! hosts and throughout the test suite.

use super::{ModelRef, OverlayStyle, SceneElement, SceneEngine};
use anyhow::{bail, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MemorySceneState {
    /// model -> (category, element)
    elements: BTreeMap<ModelRef, Vec<(String, SceneElement)>>,
    overlays: HashMap<(ModelRef, u32), OverlayStyle>,
    failing_elements: HashSet<(ModelRef, u32)>,
    failing_models: HashSet<ModelRef>,
    /// Elements whose next `clear_overlay` fails
    failing_clears: HashSet<(ModelRef, u32)>,
    redraws: HashMap<ModelRef, usize>,
    apply_calls: usize,
    clear_calls: usize,
}

#[derive(Default)]
pub struct MemoryScene {
    state: Mutex<MemorySceneState>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemorySceneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an element to a model, creating the model if needed
    pub fn add_element(
        &self,
        model: &ModelRef,
        category: &str,
        local_id: u32,
        guid: Option<&str>,
        name: Option<&str>,
    ) {
        self.state()
            .elements
            .entry(model.clone())
            .or_default()
            .push((
                category.to_string(),
                SceneElement {
                    local_id,
                    guid: guid.map(str::to_string),
                    name: name.map(str::to_string),
                },
            ));
    }

    /// Unload a model and every overlay on it
    pub fn remove_model(&self, model: &ModelRef) {
        let mut state = self.state();
        state.elements.remove(model);
        state.overlays.retain(|(m, _), _| m != model);
    }

    /// Set an overlay directly, bypassing the call counters
    pub fn preset_overlay(&self, model: &ModelRef, local_id: u32, style: OverlayStyle) {
        self.state().overlays.insert((model.clone(), local_id), style);
    }

    /// Make `apply_overlay` fail for this element
    pub fn fail_element(&self, model: &ModelRef, local_id: u32) {
        self.state().failing_elements.insert((model.clone(), local_id));
    }

    /// Make the next `clear_overlay` covering this element fail
    pub fn fail_clear_once(&self, model: &ModelRef, local_id: u32) {
        self.state().failing_clears.insert((model.clone(), local_id));
    }

    /// Make `enumerate_elements` fail for this model
    pub fn fail_model(&self, model: &ModelRef) {
        self.state().failing_models.insert(model.clone());
    }

    pub fn overlay(&self, model: &ModelRef, local_id: u32) -> Option<OverlayStyle> {
        self.state().overlays.get(&(model.clone(), local_id)).copied()
    }

    pub fn overlay_count(&self) -> usize {
        self.state().overlays.len()
    }

    pub fn redraw_count(&self, model: &ModelRef) -> usize {
        self.state().redraws.get(model).copied().unwrap_or(0)
    }

    pub fn total_redraws(&self) -> usize {
        self.state().redraws.values().sum()
    }

    pub fn apply_calls(&self) -> usize {
        self.state().apply_calls
    }

    pub fn clear_calls(&self) -> usize {
        self.state().clear_calls
    }
}

impl SceneEngine for MemoryScene {
    fn models(&self) -> Vec<ModelRef> {
        self.state().elements.keys().cloned().collect()
    }

    fn enumerate_elements(&self, model: &ModelRef, category: &str) -> Result<Vec<SceneElement>> {
        let state = self.state();
        if state.failing_models.contains(model) {
            bail!("model {} is not ready", model);
        }
        Ok(state
            .elements
            .get(model)
            .map(|elements| {
                elements
                    .iter()
                    .filter(|(c, _)| c == category)
                    .map(|(_, element)| element.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn overlay_state(&self, model: &ModelRef, local_id: u32) -> Result<Option<OverlayStyle>> {
        Ok(self.overlay(model, local_id))
    }

    fn apply_overlay(&self, model: &ModelRef, local_ids: &[u32], style: &OverlayStyle) -> Result<()> {
        let mut state = self.state();
        state.apply_calls += 1;
        if let Some(id) = local_ids
            .iter()
            .find(|id| state.failing_elements.contains(&(model.clone(), **id)))
        {
            bail!("overlay rejected for element {} of {}", id, model);
        }
        for id in local_ids {
            state.overlays.insert((model.clone(), *id), *style);
        }
        Ok(())
    }

    fn clear_overlay(&self, model: &ModelRef, local_ids: &[u32]) -> Result<()> {
        let mut state = self.state();
        state.clear_calls += 1;
        if let Some(id) = local_ids
            .iter()
            .find(|id| state.failing_clears.contains(&(model.clone(), **id)))
            .copied()
        {
            state.failing_clears.remove(&(model.clone(), id));
            bail!("overlay reset rejected for element {} of {}", id, model);
        }
        for id in local_ids {
            state.overlays.remove(&(model.clone(), *id));
        }
        Ok(())
    }

    fn batch_redraw(&self, model: &ModelRef) -> Result<()> {
        *self.state().redraws.entry(model.clone()).or_insert(0) += 1;
        Ok(())
    }
}
