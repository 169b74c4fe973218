use crate::sensor::Quality;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Most recent value attributed to a space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSample {
    pub space_guid: String,
    /// Sensor that produced the value
    pub sensor_id: String,
    pub value: f64,
    pub sensor_type: String,
    pub quality: Quality,
    /// Unix epoch milliseconds (producer time)
    pub timestamp: i64,
}

/// Result of offering a sample to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No sample existed for the space
    Inserted,
    /// Replaced a sample with an equal or older timestamp
    Replaced,
    /// Identical to the stored sample
    Unchanged,
    /// Older than the stored sample
    Discarded,
}

impl WriteOutcome {
    /// The stored sample changed
    pub fn changed(&self) -> bool {
        matches!(self, WriteOutcome::Inserted | WriteOutcome::Replaced)
    }
}

/// One sample per space; timestamps never move backwards.
#[derive(Debug, Default)]
pub struct SampleCache {
    samples: HashMap<String, HeatmapSample>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sample` unless the space holds a strictly newer one
    pub fn write(&mut self, sample: HeatmapSample) -> WriteOutcome {
        match self.samples.get_mut(&sample.space_guid) {
            None => {
                self.samples.insert(sample.space_guid.clone(), sample);
                WriteOutcome::Inserted
            }
            Some(current) if sample.timestamp < current.timestamp => WriteOutcome::Discarded,
            Some(current) if *current == sample => WriteOutcome::Unchanged,
            Some(current) => {
                *current = sample;
                WriteOutcome::Replaced
            }
        }
    }

    pub fn get(&self, space_guid: &str) -> Option<&HeatmapSample> {
        self.samples.get(space_guid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeatmapSample> {
        self.samples.values()
    }

    /// Remove samples with `timestamp < cutoff`; returns removed space guids
    pub fn remove_older_than(&mut self, cutoff: i64) -> Vec<String> {
        let stale: Vec<String> = self
            .samples
            .values()
            .filter(|s| s.timestamp < cutoff)
            .map(|s| s.space_guid.clone())
            .collect();
        for guid in &stale {
            self.samples.remove(guid);
        }
        stale
    }

    /// Drop samples whose space no longer passes `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&HeatmapSample) -> bool) -> usize {
        let before = self.samples.len();
        self.samples.retain(|_, sample| keep(sample));
        before - self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
