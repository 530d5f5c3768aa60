//! Jalrakshak diagnostic core.
//!
//! Turns water-network telemetry into structured verdicts: outlier scoring
//! with a rule-based classifier, leak and contamination analysis, maintenance
//! estimation and a water quality index. [`engine::DiagnosticEngine`] composes
//! them; [`gateway`] exposes the engine over HTTP.

pub mod algo;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod contamination;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod leak;
pub mod maintenance;
pub mod outlier;
pub mod quality;
pub mod signal;
pub mod stats;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::DiagnosticEngine;
pub use error::{DetectionError, Result};
pub use signal::{AnomalyType, OrchestratedResult, Severity};
pub use telemetry::{HistoricalRecord, PumpStatus, SensorReading, TelemetrySample};
