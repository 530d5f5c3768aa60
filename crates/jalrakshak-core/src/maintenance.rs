//! Remaining-time-to-maintenance estimation.
//!
//! A device history is summarised into six features and a bagged regression
//! forest maps them to a number of days. Urgency follows fixed day bands.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::algo::RegressionForest;
use crate::checkpoint::{self, MAINTENANCE_MODEL_KEY};
use crate::config::MaintenanceConfig;
use crate::error::{DetectionError, Result};
use crate::signal::{MaintenanceResult, Severity};
use crate::stats;
use crate::telemetry::{HistoricalRecord, PumpStatus, ensure_finite};

pub const NUM_MAINTENANCE_FEATURES: usize = 6;

/// Predictions below this many days mean maintenance is needed.
pub const NEEDED_WITHIN_DAYS: f64 = 7.0;

/// Shorter histories get the insufficient-data result.
pub const MIN_HISTORY_RECORDS: usize = 30;

pub const INSUFFICIENT_HISTORY: &str = "Insufficient historical data (need at least 30 readings)";

/// `[mean flow, std flow, mean pressure, std pressure, mean turbidity, pump-on fraction]`
pub fn extract_features(history: &[HistoricalRecord]) -> Result<[f64; NUM_MAINTENANCE_FEATURES]> {
    if history.is_empty() {
        return Err(DetectionError::invalid("historical_data", "history is empty"));
    }
    for record in history {
        ensure_finite("flow_rate", record.flow_rate)?;
        ensure_finite("pressure", record.pressure)?;
        ensure_finite("turbidity", record.turbidity)?;
    }

    let flow: Vec<f64> = history.iter().map(|r| r.flow_rate).collect();
    let pressure: Vec<f64> = history.iter().map(|r| r.pressure).collect();
    let turbidity: Vec<f64> = history.iter().map(|r| r.turbidity).collect();
    let pump_on = history
        .iter()
        .filter(|r| r.pump_status == PumpStatus::On)
        .count();

    Ok([
        stats::mean(&flow),
        stats::std_dev(&flow),
        stats::mean(&pressure),
        stats::std_dev(&pressure),
        stats::mean(&turbidity),
        pump_on as f64 / history.len() as f64,
    ])
}

pub fn urgency_for(days: f64) -> Severity {
    if days < 1.0 {
        Severity::Critical
    } else if days < 3.0 {
        Severity::High
    } else if days < NEEDED_WITHIN_DAYS {
        Severity::Medium
    } else {
        Severity::Low
    }
}

pub fn recommended_actions(urgency: Severity) -> &'static [&'static str] {
    match urgency {
        Severity::Critical => &[
            "Schedule immediate maintenance",
            "Check pump motor and bearings",
            "Inspect pipeline for leaks",
            "Review sensor calibrations",
        ],
        Severity::High => &[
            "Schedule maintenance within 3 days",
            "Monitor pump performance closely",
            "Check for unusual vibrations or sounds",
            "Review recent sensor readings",
        ],
        Severity::Medium => &[
            "Schedule maintenance within 1 week",
            "Continue regular monitoring",
            "Prepare maintenance checklist",
        ],
        Severity::Low => &[
            "Continue regular monitoring",
            "Schedule routine maintenance as per schedule",
        ],
    }
}

/// Synthetic wear dataset for cold start.
///
/// Feature rows are drawn uniformly over plausible operating ranges; the
/// target shrinks from 30 days as flow/pressure variability, turbidity and
/// pump duty rise.
pub fn bootstrap_dataset(rows: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(rows);
    let mut y = Vec::with_capacity(rows);

    for _ in 0..rows.max(1) {
        let mean_flow = rng.random_range(5.0..40.0);
        let std_flow = rng.random_range(0.0..8.0);
        let mean_pressure = rng.random_range(1.5..7.0);
        let std_pressure = rng.random_range(0.0..1.5);
        let mean_turbidity = rng.random_range(0.5..8.0);
        let pump_on: f64 = rng.random_range(0.0..1.0);

        let mut wear = 0.35 * std_flow / 8.0
            + 0.25 * std_pressure / 1.5
            + 0.2 * mean_turbidity / 8.0
            + 0.2 * pump_on;
        if mean_pressure < 2.0 {
            wear += 0.1;
        }

        x.push(vec![mean_flow, std_flow, mean_pressure, std_pressure, mean_turbidity, pump_on]);
        y.push((30.0 * (1.0 - wear)).clamp(0.0, 30.0));
    }
    (x, y)
}

pub struct MaintenanceEstimator {
    forest: RegressionForest,
}

impl MaintenanceEstimator {
    /// Fit on labelled feature rows (days until maintenance as target).
    pub fn fit(x: &[Vec<f64>], days: &[f64], config: &MaintenanceConfig) -> Result<Self> {
        if let Some(row) = x.iter().find(|r| r.len() != NUM_MAINTENANCE_FEATURES) {
            return Err(DetectionError::Retrain(format!(
                "expected {NUM_MAINTENANCE_FEATURES} features per row, got {}",
                row.len()
            )));
        }
        let forest = RegressionForest::fit(x, days, &config.forest)?;
        Ok(Self { forest })
    }

    pub fn bootstrap(config: &MaintenanceConfig) -> Result<Self> {
        let (x, y) = bootstrap_dataset(config.bootstrap_rows, config.forest.seed);
        let estimator = Self::fit(&x, &y, config)?;
        info!(rows = x.len(), trees = estimator.forest.n_trees(), "Maintenance model bootstrapped");
        Ok(estimator)
    }

    pub fn from_checkpoint(bytes: &[u8]) -> Result<Self> {
        let forest: RegressionForest = checkpoint::decode(MAINTENANCE_MODEL_KEY, bytes)?;
        if forest.n_features() != NUM_MAINTENANCE_FEATURES {
            return Err(DetectionError::Internal(format!(
                "maintenance checkpoint has {} features",
                forest.n_features()
            )));
        }
        Ok(Self { forest })
    }

    pub fn checkpoint(&self) -> Result<Vec<u8>> {
        Ok(checkpoint::encode(MAINTENANCE_MODEL_KEY, &self.forest)?)
    }

    pub fn predict(&self, history: &[HistoricalRecord]) -> Result<MaintenanceResult> {
        if history.len() < MIN_HISTORY_RECORDS {
            return Ok(MaintenanceResult::insufficient(INSUFFICIENT_HISTORY));
        }

        let features = extract_features(history)?;
        let days = self.forest.predict(&features)?;
        let urgency = urgency_for(days);
        debug!(records = history.len(), days, urgency = %urgency, "Maintenance predicted");

        Ok(MaintenanceResult {
            maintenance_needed: days < NEEDED_WITHIN_DAYS,
            days_until_maintenance: Some(days),
            urgency: Some(urgency),
            confidence: (history.len() as f64 / 100.0).min(1.0),
            recommended_actions: recommended_actions(urgency)
                .iter()
                .map(|a| a.to_string())
                .collect(),
            message: None,
        })
    }
}

impl std::fmt::Debug for MaintenanceEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceEstimator")
            .field("trees", &self.forest.n_trees())
            .finish()
    }
}
