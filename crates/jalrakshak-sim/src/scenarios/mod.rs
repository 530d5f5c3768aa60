//! Simulation scenarios
//!
//! Each scenario describes what one node experiences over time:
//! - **normal**: healthy operation around the baseline
//! - **leak**: pressure falls and flow rises after an onset step
//! - **contamination**: turbidity ramps up after an onset step
//! - **pump_wear**: readings grow noisier and muddier as a pump degrades

pub mod contamination;
pub mod leak;
pub mod normal;
pub mod pump_wear;

use rand::rngs::StdRng;

use jalrakshak_core::TelemetrySample;

/// A time-indexed source of telemetry for one node.
///
/// `step` counts samples from 0. Noise must be drawn from `rng` only, so a
/// seeded generator replays identically.
pub trait Scenario: Send {
    /// Human-readable name of the scenario
    fn name(&self) -> &str;

    fn tick(&mut self, step: usize, rng: &mut StdRng) -> TelemetrySample;
}

pub use contamination::ContaminationEvent;
pub use leak::PipeLeak;
pub use normal::NormalOperation;
pub use pump_wear::PumpWear;

/// Create a scenario by name with default parameters
pub fn create_scenario(name: &str) -> Option<Box<dyn Scenario>> {
    match name.to_lowercase().as_str() {
        "normal" | "normal_operation" => Some(Box::new(NormalOperation::default())),
        "leak" | "pipe_leak" => Some(Box::new(PipeLeak::new(20, 0.35))),
        "contamination" | "contamination_event" => {
            Some(Box::new(ContaminationEvent::new(20, 0.4)))
        }
        "pump_wear" | "wear" => Some(Box::new(PumpWear::new(0.02))),
        _ => None,
    }
}

/// List all available scenarios
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("normal", "Healthy node with Gaussian sensor noise"),
        ("pipe_leak", "Pressure decline and flow rise from step 20"),
        ("contamination_event", "Turbidity ramp of 0.4 NTU per step from step 20"),
        ("pump_wear", "Pump degradation: rising variability, falling flow"),
    ]
}
