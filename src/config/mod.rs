pub mod settings;
pub use settings::SyncSettings;

use crate::color::ColorScheme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shortest poll interval accepted from configuration (milliseconds)
pub const MIN_UPDATE_INTERVAL_MS: u64 = 250;

/// Range used for sensor types without a configured range
pub const FALLBACK_RANGE: ValueRange = ValueRange { min: 0.0, max: 100.0 };

/// Inclusive value range used to normalize readings of one sensor type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Heatmap rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    /// Normalization range per sensor type (e.g. "temperature" -> 18..30)
    #[serde(default = "default_value_ranges")]
    pub value_ranges: BTreeMap<String, ValueRange>,

    #[serde(default)]
    pub color_scheme: ColorScheme,

    /// Overlay opacity in [0, 1]
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Poll interval for the sensor data service (milliseconds)
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
}

fn default_value_ranges() -> BTreeMap<String, ValueRange> {
    [
        ("temperature", ValueRange::new(18.0, 30.0)),
        ("humidity", ValueRange::new(30.0, 70.0)),
        ("co2", ValueRange::new(400.0, 1200.0)),
        ("occupancy", ValueRange::new(0.0, 50.0)),
        ("light", ValueRange::new(0.0, 1000.0)),
        ("noise", ValueRange::new(30.0, 90.0)),
    ]
    .into_iter()
    .map(|(sensor_type, range)| (sensor_type.to_string(), range))
    .collect()
}

fn default_opacity() -> f32 {
    0.7
}

fn default_update_interval_ms() -> u64 {
    5000
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            value_ranges: default_value_ranges(),
            color_scheme: ColorScheme::default(),
            opacity: default_opacity(),
            update_interval_ms: default_update_interval_ms(),
        }
    }
}

impl HeatmapConfig {
    /// Range configured for a sensor type, or [`FALLBACK_RANGE`]
    pub fn range_for(&self, sensor_type: &str) -> ValueRange {
        self.value_ranges
            .get(sensor_type)
            .copied()
            .unwrap_or(FALLBACK_RANGE)
    }

    /// Merge a partial update. Ranges are merged per type, other fields replaced.
    pub fn merge(&mut self, patch: HeatmapConfigPatch) {
        if let Some(ranges) = patch.value_ranges {
            self.value_ranges.extend(ranges);
        }
        if let Some(scheme) = patch.color_scheme {
            self.color_scheme = scheme;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
        if let Some(interval) = patch.update_interval_ms {
            self.update_interval_ms = interval;
        }
        self.sanitize();
    }

    /// Clamp opacity into [0, 1] and apply the poll interval floor
    pub fn sanitize(&mut self) {
        self.opacity = if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            default_opacity()
        };
        self.update_interval_ms = self.update_interval_ms.max(MIN_UPDATE_INTERVAL_MS);
    }
}

/// Partial configuration update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_ranges: Option<BTreeMap<String, ValueRange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<ColorScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval_ms: Option<u64>,
}

impl HeatmapConfigPatch {
    pub fn is_empty(&self) -> bool {
        self.value_ranges.is_none()
            && self.color_scheme.is_none()
            && self.opacity.is_none()
            && self.update_interval_ms.is_none()
    }
}

/// Complete heatlayer configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<Settings, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let mut settings: Settings = toml::from_str(&contents)?;
    settings.heatmap.sanitize();
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let settings = Settings::default();
        assert_eq!(settings.heatmap.opacity, 0.7);
        assert_eq!(settings.heatmap.update_interval_ms, 5000);
        assert_eq!(settings.heatmap.color_scheme, ColorScheme::Thermal);
        assert_eq!(
            settings.heatmap.range_for("temperature"),
            ValueRange::new(18.0, 30.0)
        );
        assert_eq!(settings.sync.max_age_ms, 300_000);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [heatmap]
            color_scheme = "spectral"
            opacity = 0.5
            update_interval_ms = 2000

            [heatmap.value_ranges]
            temperature = { min = 16.0, max = 28.0 }

            [sync]
            max_age_ms = 60000
            sweep_interval_ms = 5000
            poll_enabled = false
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.heatmap.color_scheme, ColorScheme::Spectral);
        assert_eq!(settings.heatmap.opacity, 0.5);
        assert_eq!(
            settings.heatmap.range_for("temperature"),
            ValueRange::new(16.0, 28.0)
        );
        // Explicit table replaces the default ranges entirely
        assert_eq!(settings.heatmap.range_for("humidity"), FALLBACK_RANGE);
        assert_eq!(settings.sync.max_age_ms, 60_000);
        assert!(!settings.sync.poll_enabled);
        assert!(settings.sync.push_enabled);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [sync]
            poll_timeout_ms = 3000
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.sync.poll_timeout_ms, 3000);
        assert_eq!(settings.heatmap, HeatmapConfig::default());
    }

    #[test]
    fn test_merge_patch_keeps_unrelated_ranges() {
        let mut config = HeatmapConfig::default();
        let mut ranges = BTreeMap::new();
        ranges.insert("temperature".to_string(), ValueRange::new(20.0, 25.0));
        ranges.insert("radon".to_string(), ValueRange::new(0.0, 300.0));

        config.merge(HeatmapConfigPatch {
            value_ranges: Some(ranges),
            opacity: Some(0.4),
            ..Default::default()
        });

        assert_eq!(config.range_for("temperature"), ValueRange::new(20.0, 25.0));
        assert_eq!(config.range_for("radon"), ValueRange::new(0.0, 300.0));
        assert_eq!(config.range_for("humidity"), ValueRange::new(30.0, 70.0));
        assert_eq!(config.opacity, 0.4);
        assert_eq!(config.update_interval_ms, 5000);
    }

    #[test]
    fn test_merge_sanitizes_values() {
        let mut config = HeatmapConfig::default();
        config.merge(HeatmapConfigPatch {
            opacity: Some(3.0),
            update_interval_ms: Some(10),
            ..Default::default()
        });
        assert_eq!(config.opacity, 1.0);
        assert_eq!(config.update_interval_ms, MIN_UPDATE_INTERVAL_MS);
    }

    #[test]
    fn test_empty_patch() {
        assert!(HeatmapConfigPatch::default().is_empty());
        assert!(!HeatmapConfigPatch {
            opacity: Some(0.1),
            ..Default::default()
        }
        .is_empty());
    }
}
