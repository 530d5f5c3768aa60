//! Leak analysis: single-sample rules, history fusion and multi-sensor
//! localization. Everything here is stateless.

use tracing::debug;

use crate::error::Result;
use crate::signal::{
    GpsEstimate, LeakHistoryResult, LeakLocalization, LeakLocation, LeakResult, LocationEstimate,
    PressureStats,
};
use crate::stats;
use crate::telemetry::{GpsFix, SensorReading, ensure_finite, ensure_series_finite};

/// Minimum points in each series for [`LeakAnalyzer::detect_with_history`].
pub const MIN_HISTORY: usize = 10;
/// Trailing window compared against the whole pressure series.
pub const RECENT_WINDOW: usize = 5;

pub const GRADIENT_THRESHOLD: f64 = -0.3;
pub const CORRELATION_THRESHOLD: f64 = -0.5;
pub const ZSCORE_THRESHOLD: f64 = 2.0;

pub const GRADIENT_WEIGHT: f64 = 0.4;
pub const CORRELATION_WEIGHT: f64 = 0.3;
pub const ZSCORE_WEIGHT: f64 = 0.3;

pub const LOCALIZATION_CONFIDENCE: f64 = 0.7;

pub const INSUFFICIENT_HISTORY: &str = "Insufficient data for leak detection";

#[derive(Debug, Clone, Copy, Default)]
pub struct LeakAnalyzer;

impl LeakAnalyzer {
    /// Instantaneous rules, first match wins:
    /// pressure < 1.5 → 0.9; pressure < 2 with flow → 0.7;
    /// flow > 50 with pressure < 3 → 0.8.
    pub fn detect(&self, pressure: f64, flow_rate: f64, gps: Option<GpsFix>) -> Result<LeakResult> {
        ensure_finite("pressure", pressure)?;
        ensure_finite("flow_rate", flow_rate)?;

        let confidence = if pressure < 1.5 {
            Some(0.9)
        } else if pressure < 2.0 && flow_rate > 0.0 {
            Some(0.7)
        } else if flow_rate > 50.0 && pressure < 3.0 {
            Some(0.8)
        } else {
            None
        };

        Ok(LeakResult {
            detected: confidence.is_some(),
            confidence: confidence.unwrap_or(0.0),
            gps_estimate: confidence
                .zip(gps)
                .map(|(confidence, fix)| GpsEstimate::at_sensor(fix, confidence)),
            pressure,
            flow_rate,
        })
    }

    /// Fuses three independent signals over a pressure/flow history.
    ///
    /// Correlation is taken over the most recent points both series share.
    pub fn detect_with_history(
        &self,
        pressure: &[f64],
        flow: &[f64],
    ) -> Result<LeakHistoryResult> {
        if pressure.len() < MIN_HISTORY || flow.len() < MIN_HISTORY {
            return Ok(LeakHistoryResult::insufficient(INSUFFICIENT_HISTORY));
        }
        ensure_series_finite("pressure_data", pressure)?;
        ensure_series_finite("flow_data", flow)?;

        let gradient = stats::gradient(pressure);
        let Some((drop_index, pressure_drop)) = stats::argmin(&gradient) else {
            return Ok(LeakHistoryResult::insufficient(INSUFFICIENT_HISTORY));
        };

        let common = pressure.len().min(flow.len());
        let correlation = stats::pearson(
            &pressure[pressure.len() - common..],
            &flow[flow.len() - common..],
        );

        let mean = stats::mean(pressure);
        let std = stats::std_dev(pressure);
        let recent = stats::mean(&pressure[pressure.len() - RECENT_WINDOW..]);

        let signals = [
            (pressure_drop < GRADIENT_THRESHOLD, GRADIENT_WEIGHT),
            (correlation < CORRELATION_THRESHOLD, CORRELATION_WEIGHT),
            (recent < mean - ZSCORE_THRESHOLD * std, ZSCORE_WEIGHT),
        ];
        let detected = signals.iter().any(|(fired, _)| *fired);
        let confidence = signals
            .iter()
            .filter(|(fired, _)| *fired)
            .map(|(_, weight)| weight)
            .sum::<f64>()
            .min(1.0);

        debug!(
            points = pressure.len(),
            pressure_drop, correlation, confidence, "Leak history fused"
        );

        Ok(LeakHistoryResult {
            detected,
            confidence,
            message: None,
            leak_location_estimate: detected.then(|| LeakLocation {
                index: drop_index,
                pressure_drop,
                method: "pressure_gradient_analysis".to_string(),
            }),
            pressure_drop: Some(pressure_drop),
            correlation: Some(correlation),
            pressure_stats: Some(PressureStats { mean, std, recent }),
        })
    }

    /// Attributes a leak to the sensor reporting the lowest pressure.
    ///
    /// `topology` is accepted for interface stability but not consulted;
    /// this is minimum-pressure selection, not graph-based localization.
    pub fn localize_leak(
        &self,
        readings: &[SensorReading],
        _topology: Option<&serde_json::Value>,
    ) -> Result<Option<LeakLocalization>> {
        let pressures: Vec<f64> = readings.iter().map(|r| r.pressure).collect();
        ensure_series_finite("pressure", &pressures)?;

        Ok(stats::argmin(&pressures).map(|(index, _)| {
            let sensor = &readings[index];
            LeakLocalization {
                device_id: sensor.device_id.clone(),
                estimated_location: LocationEstimate {
                    lat: sensor.gps_lat,
                    lon: sensor.gps_lon,
                },
                confidence: LOCALIZATION_CONFIDENCE,
                method: "pressure_minimum".to_string(),
            }
        }))
    }
}
