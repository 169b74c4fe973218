use crate::sensor::Quality;
use crate::sync::HeatmapSample;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate over the current samples of one sensor type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypeStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

/// Per-type min/max/avg/count. Samples with `error` quality or non-finite
/// values carry no usable value and are left out.
pub fn aggregate<'a>(samples: impl Iterator<Item = &'a HeatmapSample>) -> BTreeMap<String, TypeStats> {
    let mut sums: BTreeMap<String, (f64, f64, f64, usize)> = BTreeMap::new();

    for sample in samples {
        if sample.quality == Quality::Error || !sample.value.is_finite() {
            continue;
        }
        let entry = sums
            .entry(sample.sensor_type.clone())
            .or_insert((f64::INFINITY, f64::NEG_INFINITY, 0.0, 0));
        entry.0 = entry.0.min(sample.value);
        entry.1 = entry.1.max(sample.value);
        entry.2 += sample.value;
        entry.3 += 1;
    }

    sums.into_iter()
        .map(|(sensor_type, (min, max, sum, count))| {
            (
                sensor_type,
                TypeStats {
                    min,
                    max,
                    avg: sum / count as f64,
                    count,
                },
            )
        })
        .collect()
}
