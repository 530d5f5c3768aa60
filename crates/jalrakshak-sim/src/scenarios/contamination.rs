use rand::rngs::StdRng;

use jalrakshak_core::TelemetrySample;

use super::Scenario;
use crate::generator::{Baseline, SensorProfile};

/// Ingress of dirty water upstream of the node: turbidity climbs by
/// `turbidity_rise` NTU per sample from `onset`, with slight warming.
#[derive(Debug, Clone)]
pub struct ContaminationEvent {
    pub sensor: SensorProfile,
    pub onset: usize,
    pub turbidity_rise: f64,
    pub warming_per_step: f64,
}

impl ContaminationEvent {
    pub fn new(onset: usize, turbidity_rise: f64) -> Self {
        Self {
            sensor: SensorProfile::default(),
            onset,
            turbidity_rise,
            warming_per_step: 0.05,
        }
    }

    pub fn with_sensor(mut self, sensor: SensorProfile) -> Self {
        self.sensor = sensor;
        self
    }
}

impl Scenario for ContaminationEvent {
    fn name(&self) -> &str {
        "Contamination Event"
    }

    fn tick(&mut self, step: usize, rng: &mut StdRng) -> TelemetrySample {
        let elapsed = step.saturating_sub(self.onset) as f64;
        let base = self.sensor.baseline;
        let mean = Baseline {
            turbidity: base.turbidity + self.turbidity_rise * elapsed,
            temperature: base.temperature + self.warming_per_step * elapsed,
            // Suspended solids carry dissolved ions with them
            conductivity: base.conductivity + 4.0 * self.turbidity_rise * elapsed,
            ..base
        };
        self.sensor.sample_around(rng, &mean, 1.0)
    }
}
