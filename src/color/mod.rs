//! Value-to-color mapping.
//!
//! Readings are normalized into [0, 1] using the per-type range from
//! [`HeatmapConfig`], then interpolated across six anchor colors spread over
//! five equal-width bands. The mapping is a pure function of its inputs.

use crate::config::HeatmapConfig;
use crate::sensor::Quality;
use serde::{Deserialize, Serialize};
use std::fmt;


/// Factor applied to the normalized value of `warning` readings
pub const WARNING_DAMPING: f64 = 0.8;

/// Returned for `error` readings regardless of value
pub const NEUTRAL_COLOR: Color = Color::rgb(0x80, 0x80, 0x80);

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Hex notation, e.g. `#ff8000`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Linear blend; `t = 0` yields `self`, `t = 1` yields `other` exactly
    fn lerp(self, other: Color, t: f64) -> Color {
        let mix = |a: u8, b: u8| -> u8 {
            let v = f64::from(a) * (1.0 - t) + f64::from(b) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Color::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Anchor set used for interpolation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Blue through red
    #[default]
    Thermal,
    /// Violet through red
    Spectral,
    /// Light to dark gray
    Monochrome,
}

impl ColorScheme {
    /// Ordered anchors: cold, cool, medium, warm, hot, extreme
    pub fn anchors(&self) -> [Color; 6] {
        match self {
            ColorScheme::Thermal => [
                Color::rgb(0x00, 0x00, 0xff),
                Color::rgb(0x00, 0xff, 0xff),
                Color::rgb(0x00, 0xff, 0x00),
                Color::rgb(0xff, 0xff, 0x00),
                Color::rgb(0xff, 0x80, 0x00),
                Color::rgb(0xff, 0x00, 0x00),
            ],
            ColorScheme::Spectral => [
                Color::rgb(0x5e, 0x4f, 0xa2),
                Color::rgb(0x32, 0x88, 0xbd),
                Color::rgb(0x66, 0xc2, 0xa5),
                Color::rgb(0xfe, 0xe0, 0x8b),
                Color::rgb(0xf4, 0x6d, 0x43),
                Color::rgb(0x9e, 0x01, 0x42),
            ],
            ColorScheme::Monochrome => [
                Color::rgb(0xf0, 0xf0, 0xf0),
                Color::rgb(0xc8, 0xc8, 0xc8),
                Color::rgb(0xa0, 0xa0, 0xa0),
                Color::rgb(0x78, 0x78, 0x78),
                Color::rgb(0x50, 0x50, 0x50),
                Color::rgb(0x28, 0x28, 0x28),
            ],
        }
    }
}

/// Normalize `value` into [0, 1] for the sensor type's configured range.
///
/// Out-of-range values clamp to the boundary. A degenerate range
/// (`max <= min`) yields 0 at or below `min` and 1 above it.
pub fn normalize(value: f64, sensor_type: &str, config: &HeatmapConfig) -> f64 {
    let range = config.range_for(sensor_type);
    let span = range.max - range.min;
    if !span.is_finite() || span <= 0.0 {
        return if value <= range.min { 0.0 } else { 1.0 };
    }
    ((value - range.min) / span).clamp(0.0, 1.0)
}

/// Color for a normalized value in [0, 1]
pub fn interpolate(scheme: ColorScheme, t: f64) -> Color {
    let anchors = scheme.anchors();
    let bands = (anchors.len() - 1) as f64;
    let scaled = t.clamp(0.0, 1.0) * bands;
    let band = (scaled.floor() as usize).min(anchors.len() - 2);
    let local = scaled - band as f64;
    anchors[band].lerp(anchors[band + 1], local)
}

/// Map a reading to its overlay color.
///
/// `error` quality (or a non-finite value) returns [`NEUTRAL_COLOR`];
/// `warning` quality dampens the normalized value by [`WARNING_DAMPING`].
pub fn map_color(value: f64, sensor_type: &str, quality: Quality, config: &HeatmapConfig) -> Color {
    if quality == Quality::Error || !value.is_finite() {
        return NEUTRAL_COLOR;
    }

    let mut t = normalize(value, sensor_type, config);
    if quality == Quality::Warning {
        t *= WARNING_DAMPING;
    }

    interpolate(config.color_scheme, t)
}
