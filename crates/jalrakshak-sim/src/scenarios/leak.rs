use rand::rngs::StdRng;

use jalrakshak_core::TelemetrySample;

use super::Scenario;
use crate::generator::{Baseline, SensorProfile};

/// Residual pressure once the pipe has drained to the break.
const FLOOR_PRESSURE: f64 = 0.3;

/// A pipe break downstream of the node.
///
/// From `onset` on, mean pressure falls by `drop_per_step` bar per sample
/// (down to a residual floor) while flow climbs by `flow_rise_per_step`.
#[derive(Debug, Clone)]
pub struct PipeLeak {
    pub sensor: SensorProfile,
    pub onset: usize,
    pub drop_per_step: f64,
    pub flow_rise_per_step: f64,
}

impl PipeLeak {
    pub fn new(onset: usize, drop_per_step: f64) -> Self {
        Self {
            sensor: SensorProfile::default(),
            onset,
            drop_per_step,
            flow_rise_per_step: 0.5,
        }
    }

    pub fn with_sensor(mut self, sensor: SensorProfile) -> Self {
        self.sensor = sensor;
        self
    }

    fn mean_at(&self, step: usize) -> Baseline {
        let elapsed = step.saturating_sub(self.onset) as f64;
        let base = self.sensor.baseline;
        Baseline {
            pressure: (base.pressure - self.drop_per_step * elapsed).max(FLOOR_PRESSURE),
            flow_rate: base.flow_rate + self.flow_rise_per_step * elapsed,
            ..base
        }
    }
}

impl Scenario for PipeLeak {
    fn name(&self) -> &str {
        "Pipe Leak"
    }

    fn tick(&mut self, step: usize, rng: &mut StdRng) -> TelemetrySample {
        let mean = self.mean_at(step);
        self.sensor.sample_around(rng, &mean, 1.0)
    }
}
