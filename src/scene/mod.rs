//! Interface to the hosting 3D scene engine.

mod memory;

pub use memory::MemoryScene;

use crate::color::Color;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a loaded model in the scene
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelRef(pub String);

impl ModelRef {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Element as enumerated by the engine, before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct SceneElement {
    pub local_id: u32,
    pub guid: Option<String>,
    pub name: Option<String>,
}

/// Temporary render material applied to an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub color: Color,
    pub opacity: f32,
    pub transparent: bool,
}

impl OverlayStyle {
    pub fn new(color: Color, opacity: f32) -> Self {
        Self {
            color,
            opacity,
            transparent: opacity < 1.0,
        }
    }
}

/// Scene engine operations used by the heatmap.
///
/// Calls are synchronous from the heatmap's point of view; the engine
/// queues overlay changes until `batch_redraw` is invoked.
pub trait SceneEngine: Send + Sync {
    /// Models currently loaded in the scene
    fn models(&self) -> Vec<ModelRef>;

    fn enumerate_elements(&self, model: &ModelRef, category: &str) -> Result<Vec<SceneElement>>;

    /// Overlay currently set on an element, if any
    fn overlay_state(&self, model: &ModelRef, local_id: u32) -> Result<Option<OverlayStyle>>;

    fn apply_overlay(&self, model: &ModelRef, local_ids: &[u32], style: &OverlayStyle) -> Result<()>;

    fn clear_overlay(&self, model: &ModelRef, local_ids: &[u32]) -> Result<()>;

    fn batch_redraw(&self, model: &ModelRef) -> Result<()>;
}
