//! # jalrakshak-sim
//!
//! Synthetic water-network telemetry for exercising the diagnostic core.
//!
//! A [`SensorGenerator`] drives one node through a [`Scenario`] with a seeded
//! RNG, so every run is reproducible. Generated samples can be written out,
//! evaluated locally with [`evaluate::evaluate`], or replayed against a
//! running gateway by the `jal-sim` binary.
//!
//! ```rust,no_run
//! use jalrakshak_sim::SensorGenerator;
//!
//! let mut generator = SensorGenerator::from_scenario_name("pipe_leak", 42).unwrap();
//! let samples = generator.samples(60);
//! let pressure: Vec<f64> = samples.iter().map(|s| s.pressure).collect();
//! ```
//!
//! | Scenario              | Effect                                          |
//! |-----------------------|-------------------------------------------------|
//! | `normal`              | Baseline plus Gaussian noise                    |
//! | `pipe_leak`           | Pressure decline, flow rise                     |
//! | `contamination_event` | Turbidity ramp, slight warming                  |
//! | `pump_wear`           | Growing scatter, falling flow, rising turbidity |

pub mod evaluate;
pub mod generator;
pub mod scenarios;

pub use evaluate::{EvaluationReport, evaluate};
pub use generator::{Baseline, NoiseProfile, SensorGenerator, SensorProfile};
pub use scenarios::{
    ContaminationEvent, NormalOperation, PipeLeak, PumpWear, Scenario, create_scenario,
    list_scenarios,
};
