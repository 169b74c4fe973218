// Heatmap configuration and sync settings
pub mod config;

// Error types surfaced to callers
pub mod error;

// Scene engine boundary and in-memory scene
pub mod scene;

// Spatial element index (space guid -> scene element)
pub mod space;

// Sensor records, data service boundary and simulation
pub mod sensor;

// Sensor-to-space associations
pub mod association;

// Association persistence collaborators
pub mod persistence;

// Value normalization and color mapping
pub mod color;

// Overlay rendering and restore records
pub mod render;

// Realtime sync state machine and sample cache
pub mod sync;

// Configuration/association snapshots
pub mod snapshot;

// Lifecycle controller
pub mod controller;

pub use association::{Association, AssociationStore, SpaceRef};
pub use color::{Color, ColorScheme};
pub use config::{HeatmapConfig, HeatmapConfigPatch, Settings, SyncSettings};
pub use controller::{HeatmapController, TypeStats};
pub use error::HeatmapError;
pub use persistence::{AssociationPersistence, FileStore, MemoryStore};
pub use render::RenderReport;
pub use scene::{MemoryScene, ModelRef, OverlayStyle, SceneEngine};
pub use sensor::{ReadingEvent, Sensor, SensorService, SimulatedSensorService};
pub use snapshot::HeatmapSnapshot;
pub use sync::{HeatmapSample, SyncEvent};
