use rand::rngs::StdRng;

use jalrakshak_core::TelemetrySample;

use super::Scenario;
use crate::generator::SensorProfile;

/// Healthy node: every reading is baseline plus noise.
#[derive(Debug, Clone, Default)]
pub struct NormalOperation {
    pub sensor: SensorProfile,
}

impl NormalOperation {
    pub fn new(sensor: SensorProfile) -> Self {
        Self { sensor }
    }
}

impl Scenario for NormalOperation {
    fn name(&self) -> &str {
        "Normal Operation"
    }

    fn tick(&mut self, _step: usize, rng: &mut StdRng) -> TelemetrySample {
        self.sensor.sample(rng)
    }
}
