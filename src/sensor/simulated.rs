//! Simulated sensor data service.
//!
//! Produces bounded random-walk readings for demo buildings and tests. Each
//! call to [`SimulatedSensorService::advance`] moves every sensor one step and
//! optionally publishes the readings on the push channel.

use super::{ReadingEvent, Reading, Sensor, SensorInfo, SensorService};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Random-walk parameters for one simulated sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationProfile {
    /// Center of the walk
    pub baseline: f64,
    /// Maximum distance from the baseline
    pub amplitude: f64,
    /// Maximum change per step
    pub step: f64,
}

impl SimulationProfile {
    pub fn new(baseline: f64, amplitude: f64, step: f64) -> Self {
        Self {
            baseline,
            amplitude: amplitude.abs(),
            step: step.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedSensor {
    #[serde(flatten)]
    pub info: SensorInfo,
    pub profile: SimulationProfile,
}

struct SimulationState {
    sensors: Vec<SimulatedSensor>,
    rng: StdRng,
}

pub struct SimulatedSensorService {
    state: Mutex<SimulationState>,
    push_tx: broadcast::Sender<ReadingEvent>,
}

impl SimulatedSensorService {
    /// Create an empty simulation with a deterministic seed
    pub fn new(seed: u64) -> Self {
        let (push_tx, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(SimulationState {
                sensors: Vec::new(),
                rng: StdRng::seed_from_u64(seed),
            }),
            push_tx,
        }
    }

    /// Register a sensor; its first reading sits on the baseline.
    pub async fn add_sensor(&self, mut info: SensorInfo, profile: SimulationProfile) {
        let value = profile.baseline;
        info.last_reading = Some(Reading {
            value,
            timestamp: Utc::now().timestamp_millis(),
            quality: info.config.thresholds.classify(value),
        });
        self.state.lock().await.sensors.push(SimulatedSensor { info, profile });
    }

    /// Advance every sensor one step, stamping readings with `timestamp`.
    ///
    /// When `publish` is set the readings are also sent on the push channel;
    /// having no subscribers is not an error.
    pub async fn advance(&self, timestamp: i64, publish: bool) -> Vec<ReadingEvent> {
        let mut state = self.state.lock().await;
        let SimulationState { sensors, rng } = &mut *state;

        let mut events = Vec::with_capacity(sensors.len());
        for sensor in sensors.iter_mut() {
            let profile = sensor.profile;
            let current = sensor
                .info
                .last_reading
                .map_or(profile.baseline, |r| r.value);
            let delta = if profile.step > 0.0 {
                rng.gen_range(-profile.step..=profile.step)
            } else {
                0.0
            };
            let value = (current + delta).clamp(
                profile.baseline - profile.amplitude,
                profile.baseline + profile.amplitude,
            );
            let quality = sensor.info.config.thresholds.classify(value);

            sensor.info.last_reading = Some(Reading {
                value,
                timestamp,
                quality,
            });
            events.push(ReadingEvent::new(&sensor.info.sensor_id, value, quality, timestamp));
        }
        drop(state);

        if publish {
            for event in &events {
                if self.push_tx.send(event.clone()).is_err() {
                    debug!("No push subscribers for simulated readings");
                    break;
                }
            }
        }

        events
    }

    /// Publish an arbitrary reading on the push channel
    pub fn publish(&self, event: ReadingEvent) -> bool {
        self.push_tx.send(event).is_ok()
    }
}

#[async_trait]
impl SensorService for SimulatedSensorService {
    async fn get_all_sensors(&self) -> Result<Vec<Sensor>> {
        let state = self.state.lock().await;
        Ok(state
            .sensors
            .iter()
            .cloned()
            .map(Sensor::Simulated)
            .collect())
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ReadingEvent>> {
        Some(self.push_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Quality, Thresholds};

    fn temperature_sensor(id: &str) -> SensorInfo {
        let mut info = SensorInfo::new(id, "temperature");
        info.config.unit = "C".to_string();
        info.config.thresholds = Thresholds {
            warning: Some(26.0),
            critical: Some(29.0),
        };
        info
    }

    #[tokio::test]
    async fn test_walk_stays_within_amplitude() {
        let service = SimulatedSensorService::new(7);
        service
            .add_sensor(temperature_sensor("sim-1"), SimulationProfile::new(22.0, 3.0, 1.5))
            .await;

        for ts in 1..200 {
            let events = service.advance(ts, false).await;
            assert_eq!(events.len(), 1);
            assert!(events[0].value >= 19.0 && events[0].value <= 25.0);
            assert_eq!(events[0].timestamp, ts);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_readings() {
        let a = SimulatedSensorService::new(42);
        let b = SimulatedSensorService::new(42);
        for service in [&a, &b] {
            service
                .add_sensor(temperature_sensor("sim-1"), SimulationProfile::new(22.0, 5.0, 1.0))
                .await;
        }

        for ts in 0..20 {
            assert_eq!(a.advance(ts, false).await, b.advance(ts, false).await);
        }
    }

    #[tokio::test]
    async fn test_quality_follows_thresholds() {
        let service = SimulatedSensorService::new(1);
        service
            .add_sensor(temperature_sensor("hot"), SimulationProfile::new(30.0, 0.0, 0.0))
            .await;

        let events = service.advance(10, false).await;
        assert_eq!(events[0].value, 30.0);
        assert_eq!(events[0].quality, Quality::Critical);
    }

    #[tokio::test]
    async fn test_advance_publishes_and_lists_simulated_variant() {
        let service = SimulatedSensorService::new(3);
        service
            .add_sensor(temperature_sensor("sim-9"), SimulationProfile::new(21.0, 1.0, 0.5))
            .await;
        let mut rx = service.subscribe().unwrap();

        service.advance(100, true).await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.sensor_id, "sim-9");
        assert_eq!(event.timestamp, 100);

        let sensors = service.get_all_sensors().await.unwrap();
        assert_eq!(sensors.len(), 1);
        assert!(sensors[0].is_simulated());
        assert_eq!(sensors[0].last_reading().unwrap().timestamp, 100);
    }
}
