use rand::rngs::StdRng;

use jalrakshak_core::TelemetrySample;

use super::Scenario;
use crate::generator::{Baseline, SensorProfile};

/// Gradual pump degradation.
///
/// Degradation grows by `wear_rate` per sample up to 1. A worn pump delivers
/// less flow, its flow and pressure readings scatter more widely and
/// sediment stirred up by cavitation raises turbidity.
#[derive(Debug, Clone)]
pub struct PumpWear {
    pub sensor: SensorProfile,
    pub wear_rate: f64,
}

impl PumpWear {
    pub fn new(wear_rate: f64) -> Self {
        Self {
            sensor: SensorProfile::default(),
            wear_rate,
        }
    }

    pub fn with_sensor(mut self, sensor: SensorProfile) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn degradation(&self, step: usize) -> f64 {
        (self.wear_rate * step as f64).clamp(0.0, 1.0)
    }
}

impl Scenario for PumpWear {
    fn name(&self) -> &str {
        "Pump Wear"
    }

    fn tick(&mut self, step: usize, rng: &mut StdRng) -> TelemetrySample {
        let wear = self.degradation(step);
        let base = self.sensor.baseline;
        let mean = Baseline {
            flow_rate: base.flow_rate * (1.0 - 0.3 * wear),
            turbidity: base.turbidity + 3.0 * wear,
            temperature: base.temperature + 2.0 * wear,
            ..base
        };
        self.sensor.sample_around(rng, &mean, 1.0 + 10.0 * wear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradation_saturates() {
        let pump = PumpWear::new(0.1);
        assert_eq!(pump.degradation(0), 0.0);
        assert!((pump.degradation(5) - 0.5).abs() < 1e-12);
        assert_eq!(pump.degradation(50), 1.0);
    }
}
