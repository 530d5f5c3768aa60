//! Sensor telemetry generator
//!
//! Produces noisy, reproducible readings for a single field node. What the
//! node is experiencing (normal operation, a leak, contamination, pump wear)
//! is decided by a [`Scenario`]; the generator owns the RNG, the step counter
//! and the clock.

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use jalrakshak_core::{HistoricalRecord, SensorReading, TelemetrySample};

use crate::scenarios::{self, Scenario};

pub const DEFAULT_DEVICE: &str = "jal-node-001";

/// Seconds between consecutive samples.
pub const SAMPLE_INTERVAL_SECS: i64 = 60;

/// Flow above which the pump counts as running in generated history.
pub const PUMP_RUNNING_FLOW: f64 = 2.0;

/// Spacing between neighbouring sensors in a network snapshot, in degrees.
const SENSOR_SPACING_DEG: f64 = 0.002;

/// Mean operating point of a healthy node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub flow_rate: f64,
    pub pressure: f64,
    pub turbidity: f64,
    pub temperature: f64,
    pub ph: f64,
    pub conductivity: f64,
    pub lat: f64,
    pub lon: f64,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            flow_rate: 11.0,
            pressure: 5.5,
            turbidity: 2.0,
            temperature: 24.0,
            ph: 7.2,
            conductivity: 450.0,
            lat: 18.5204,
            lon: 73.8567,
        }
    }
}

/// Standard deviation of the Gaussian noise on each reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseProfile {
    pub flow_rate: f64,
    pub pressure: f64,
    pub turbidity: f64,
    pub temperature: f64,
    pub ph: f64,
    pub conductivity: f64,
}

impl Default for NoiseProfile {
    fn default() -> Self {
        Self {
            flow_rate: 0.5,
            pressure: 0.05,
            turbidity: 0.1,
            temperature: 0.3,
            ph: 0.05,
            conductivity: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorProfile {
    pub device_id: String,
    pub baseline: Baseline,
    pub noise: NoiseProfile,
}

impl Default for SensorProfile {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE)
    }
}

impl SensorProfile {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            baseline: Baseline::default(),
            noise: NoiseProfile::default(),
        }
    }

    /// A noisy reading around the profile's own baseline.
    pub fn sample(&self, rng: &mut StdRng) -> TelemetrySample {
        self.sample_around(rng, &self.baseline, 1.0)
    }

    /// A noisy reading around `mean`, with every sigma multiplied by `spread`.
    /// Physical quantities that cannot go negative are clamped at zero.
    pub fn sample_around(&self, rng: &mut StdRng, mean: &Baseline, spread: f64) -> TelemetrySample {
        let n = &self.noise;
        TelemetrySample::new(
            self.device_id.clone(),
            jitter(rng, mean.flow_rate, n.flow_rate * spread).max(0.0),
            jitter(rng, mean.pressure, n.pressure * spread).max(0.0),
            jitter(rng, mean.turbidity, n.turbidity * spread).max(0.0),
            jitter(rng, mean.temperature, n.temperature * spread),
        )
        .with_chemistry(
            Some(jitter(rng, mean.ph, n.ph * spread).clamp(0.0, 14.0)),
            Some(jitter(rng, mean.conductivity, n.conductivity * spread).max(0.0)),
        )
        .with_gps(mean.lat, mean.lon)
    }
}

fn jitter(rng: &mut StdRng, mean: f64, sigma: f64) -> f64 {
    // Normal::new only fails on a negative or non-finite sigma
    Normal::new(mean, sigma)
        .map(|dist| dist.sample(rng))
        .unwrap_or(mean)
}

/// Scenario-driven sample stream for one node.
pub struct SensorGenerator {
    scenario: Box<dyn Scenario>,
    rng: StdRng,
    step: usize,
    start: DateTime<Utc>,
}

impl SensorGenerator {
    pub fn new(scenario: Box<dyn Scenario>, seed: u64) -> Self {
        Self {
            scenario,
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            start: Utc::now(),
        }
    }

    /// Looks the scenario up by name with its default parameters.
    pub fn from_scenario_name(name: &str, seed: u64) -> Option<Self> {
        scenarios::create_scenario(name).map(|scenario| Self::new(scenario, seed))
    }

    /// Pin the timestamp of step 0.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn scenario_name(&self) -> &str {
        self.scenario.name()
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn next_sample(&mut self) -> TelemetrySample {
        let mut sample = self.scenario.tick(self.step, &mut self.rng);
        sample.timestamp =
            Some(self.start + Duration::seconds(self.step as i64 * SAMPLE_INTERVAL_SECS));
        self.step += 1;
        sample
    }

    pub fn samples(&mut self, points: usize) -> Vec<TelemetrySample> {
        (0..points).map(|_| self.next_sample()).collect()
    }

    /// The next `points` samples as maintenance history.
    pub fn history(&mut self, points: usize) -> Vec<HistoricalRecord> {
        self.samples(points).iter().map(to_history).collect()
    }

    /// One simultaneous reading from `sensors` nodes laid out north to south.
    ///
    /// The middle node carries the scenario's next sample; its neighbours
    /// read nominal values.
    pub fn network_snapshot(&mut self, sensors: usize) -> Vec<SensorReading> {
        let affected = sensors / 2;
        let sample = self.next_sample();
        let origin = Baseline::default();

        (0..sensors)
            .map(|i| {
                let offset = (i as f64 - affected as f64) * SENSOR_SPACING_DEG;
                let reading = if i == affected {
                    sample.clone()
                } else {
                    let mut neighbour = SensorProfile::new(format!("{}-n{i}", sample.device_id));
                    neighbour.baseline.lat = origin.lat + offset;
                    neighbour.sample(&mut self.rng)
                };
                SensorReading {
                    device_id: reading.device_id,
                    pressure: reading.pressure,
                    flow_rate: reading.flow_rate,
                    gps_lat: Some(origin.lat + offset),
                    gps_lon: Some(origin.lon),
                }
            })
            .collect()
    }
}

pub fn to_history(sample: &TelemetrySample) -> HistoricalRecord {
    HistoricalRecord {
        timestamp: sample.timestamp,
        ..HistoricalRecord::new(
            sample.flow_rate,
            sample.pressure,
            sample.turbidity,
            sample.temperature,
            sample.flow_rate > PUMP_RUNNING_FLOW,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::NormalOperation;

    #[test]
    fn test_same_seed_same_stream() {
        let start = Utc::now();
        let mut a = SensorGenerator::new(Box::new(NormalOperation::default()), 11).with_start(start);
        let mut b = SensorGenerator::new(Box::new(NormalOperation::default()), 11).with_start(start);
        assert_eq!(a.samples(20), b.samples(20));
    }

    #[test]
    fn test_timestamps_advance_per_step() {
        let mut generator = SensorGenerator::new(Box::new(NormalOperation::default()), 1);
        let samples = generator.samples(3);
        let t0 = samples[0].timestamp.unwrap();
        let t2 = samples[2].timestamp.unwrap();
        assert_eq!((t2 - t0).num_seconds(), 2 * SAMPLE_INTERVAL_SECS);
        assert_eq!(generator.step(), 3);
    }

    #[test]
    fn test_samples_pass_core_validation() {
        let mut generator = SensorGenerator::from_scenario_name("pipe_leak", 3).unwrap();
        for sample in generator.samples(80) {
            assert!(sample.validate().is_ok(), "{sample:?}");
        }
    }

    #[test]
    fn test_network_snapshot_layout() {
        let mut generator = SensorGenerator::new(Box::new(NormalOperation::default()), 5);
        let readings = generator.network_snapshot(5);
        assert_eq!(readings.len(), 5);
        assert_eq!(readings[2].device_id, DEFAULT_DEVICE);
        assert!(readings[0].gps_lat.unwrap() < readings[4].gps_lat.unwrap());
        assert_eq!(generator.step(), 1);
    }

    #[test]
    fn test_history_marks_running_pump() {
        let sample = TelemetrySample::new("d", 10.0, 4.0, 1.0, 20.0);
        assert_eq!(to_history(&sample).pump_status, jalrakshak_core::PumpStatus::On);
        let idle = TelemetrySample::new("d", 0.5, 4.0, 1.0, 20.0);
        assert_eq!(to_history(&idle).pump_status, jalrakshak_core::PumpStatus::Off);
    }
}
