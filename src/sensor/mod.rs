// Sensor model, data-service interface and registry

pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub use simulated::{SimulatedSensor, SimulatedSensorService, SimulationProfile};

/// Reading classification reported by the sensor data service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Good,
    Warning,
    Critical,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    #[default]
    Online,
    Offline,
    Maintenance,
}

/// Latest value reported by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    /// Unix epoch milliseconds (producer time)
    pub timestamp: i64,
    #[serde(default)]
    pub quality: Quality,
}

/// Alarm limits; readings at or beyond a limit are classified accordingly
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
}

impl Thresholds {
    /// Quality for a value measured against these limits
    pub fn classify(&self, value: f64) -> Quality {
        if !value.is_finite() {
            return Quality::Error;
        }
        if self.critical.is_some_and(|limit| value >= limit) {
            return Quality::Critical;
        }
        if self.warning.is_some_and(|limit| value >= limit) {
            return Quality::Warning;
        }
        Quality::Good
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Fields shared by every sensor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub sensor_id: String,
    /// Measured quantity, e.g. "temperature", "occupancy"
    pub sensor_type: String,
    #[serde(default)]
    pub status: SensorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reading: Option<Reading>,
    #[serde(default)]
    pub config: SensorConfig,
}

impl SensorInfo {
    pub fn new(sensor_id: &str, sensor_type: &str) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            sensor_type: sensor_type.to_string(),
            status: SensorStatus::Online,
            last_reading: None,
            config: SensorConfig::default(),
        }
    }
}

/// Sensor record as delivered by the data service.
///
/// Physical and simulated devices share [`SensorInfo`]; the variant is
/// decided once, where records enter the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Sensor {
    Real(SensorInfo),
    Simulated(SimulatedSensor),
}

impl Sensor {
    pub fn info(&self) -> &SensorInfo {
        match self {
            Sensor::Real(info) => info,
            Sensor::Simulated(sim) => &sim.info,
        }
    }

    fn info_mut(&mut self) -> &mut SensorInfo {
        match self {
            Sensor::Real(info) => info,
            Sensor::Simulated(sim) => &mut sim.info,
        }
    }

    pub fn id(&self) -> &str {
        &self.info().sensor_id
    }

    pub fn sensor_type(&self) -> &str {
        &self.info().sensor_type
    }

    pub fn last_reading(&self) -> Option<Reading> {
        self.info().last_reading
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, Sensor::Simulated(_))
    }
}

/// Push-channel message: one new reading from one sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingEvent {
    #[serde(rename = "sensorId")]
    pub sensor_id: String,
    pub value: f64,
    #[serde(default)]
    pub quality: Quality,
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

impl ReadingEvent {
    pub fn new(sensor_id: &str, value: f64, quality: Quality, timestamp: i64) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            value,
            quality,
            timestamp,
        }
    }

    pub fn reading(&self) -> Reading {
        Reading {
            value: self.value,
            timestamp: self.timestamp,
            quality: self.quality,
        }
    }
}

/// External sensor data service.
#[async_trait]
pub trait SensorService: Send + Sync {
    /// All known sensors with their latest readings
    async fn get_all_sensors(&self) -> Result<Vec<Sensor>>;

    /// Push channel of new readings; `None` if the service has no push support
    fn subscribe(&self) -> Option<broadcast::Receiver<ReadingEvent>>;
}

/// Read-side view of the sensors known to the data service.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: HashMap<String, Sensor>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry content with a fresh listing.
    ///
    /// A listed reading never replaces a newer one already recorded from the
    /// push channel.
    pub fn refresh(&mut self, sensors: Vec<Sensor>) {
        let mut next = HashMap::with_capacity(sensors.len());
        for mut sensor in sensors {
            if let Some(known) = self.sensors.get(sensor.id()).and_then(Sensor::last_reading) {
                let listed = sensor.last_reading();
                if listed.map_or(true, |r| r.timestamp < known.timestamp) {
                    sensor.info_mut().last_reading = Some(known);
                }
            }
            next.insert(sensor.id().to_string(), sensor);
        }
        info!(sensors = next.len(), "Sensor registry refreshed");
        self.sensors = next;
    }

    /// Record a pushed reading. Returns false for unknown sensors or
    /// readings older than the one already recorded.
    pub fn record(&mut self, event: &ReadingEvent) -> bool {
        let Some(sensor) = self.sensors.get_mut(&event.sensor_id) else {
            debug!(sensor_id = %event.sensor_id, "Reading for unknown sensor");
            return false;
        };
        let info = sensor.info_mut();
        if info
            .last_reading
            .is_some_and(|current| current.timestamp > event.timestamp)
        {
            return false;
        }
        info.last_reading = Some(event.reading());
        true
    }

    pub fn get(&self, sensor_id: &str) -> Option<&Sensor> {
        self.sensors.get(sensor_id)
    }

    pub fn sensor_type(&self, sensor_id: &str) -> Option<&str> {
        self.sensors.get(sensor_id).map(Sensor::sensor_type)
    }

    /// Latest readings as push-style events, for seeding the sample cache
    pub fn latest_events(&self) -> Vec<ReadingEvent> {
        self.sensors
            .values()
            .filter_map(|sensor| {
                sensor.last_reading().map(|r| {
                    ReadingEvent::new(sensor.id(), r.value, r.quality, r.timestamp)
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn clear(&mut self) {
        self.sensors.clear();
    }
}
