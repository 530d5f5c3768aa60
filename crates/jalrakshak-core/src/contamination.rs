//! Contamination analysis over turbidity and temperature.
//!
//! Two signals that are deliberately kept apart: [`ContaminationAnalyzer::detect`]
//! bands a single reading, [`ContaminationAnalyzer::detect_pattern`] looks for a
//! spike or a sustained rise in a series. Neither feeds the other.

use crate::error::Result;
use crate::signal::{ContaminationResult, GpsEstimate, PatternResult, Severity};
use crate::stats;
use crate::telemetry::{GpsFix, ensure_finite, ensure_series_finite};

pub const TURBIDITY_SAFE: f64 = 5.0;
pub const TURBIDITY_WARNING: f64 = 7.0;
pub const TURBIDITY_CRITICAL: f64 = 10.0;
pub const TEMPERATURE_RANGE: (f64, f64) = (15.0, 35.0);

pub const MIN_PATTERN_POINTS: usize = 5;
pub const TREND_WINDOW: usize = 10;
/// NTU per reading
pub const TREND_SLOPE: f64 = 0.1;
pub const SPIKE_SIGMAS: f64 = 3.0;

pub const INSUFFICIENT_PATTERN: &str = "Insufficient data";

/// Turbidity bands, checked from the top.
const BANDS: [(f64, Severity, f64); 3] = [
    (TURBIDITY_CRITICAL, Severity::Critical, 0.95),
    (TURBIDITY_WARNING, Severity::High, 0.8),
    (TURBIDITY_SAFE, Severity::Medium, 0.6),
];

fn band_description(severity: Severity, turbidity: f64) -> String {
    match severity {
        Severity::Critical => format!(
            "Critical contamination detected: Turbidity {turbidity:.2} NTU exceeds safe limit (5 NTU)"
        ),
        Severity::High => {
            format!("High contamination risk: Turbidity {turbidity:.2} NTU above warning threshold")
        }
        Severity::Medium => {
            format!("Moderate contamination: Turbidity {turbidity:.2} NTU above safe limit")
        }
        Severity::Low => String::new(),
    }
}

pub fn recommended_action(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => {
            "IMMEDIATE: Stop water supply. Notify health authorities. Conduct emergency water quality test."
        }
        Severity::High => {
            "URGENT: Issue public advisory. Increase monitoring frequency. Investigate contamination source."
        }
        Severity::Medium => "Monitor closely. Increase sampling frequency. Check upstream sources.",
        Severity::Low => "Continue monitoring. Review sensor calibration.",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContaminationAnalyzer;

impl ContaminationAnalyzer {
    pub fn detect(
        &self,
        turbidity: f64,
        temperature: f64,
        gps: Option<GpsFix>,
    ) -> Result<ContaminationResult> {
        ensure_finite("turbidity", turbidity)?;
        ensure_finite("temperature", temperature)?;

        let band = BANDS.iter().find(|(limit, _, _)| turbidity >= *limit);
        let (mut detected, mut severity, mut confidence, mut description) = match band {
            Some(&(_, severity, confidence)) => {
                (true, severity, confidence, band_description(severity, turbidity))
            }
            None => (false, Severity::Low, 0.0, String::new()),
        };

        let (t_min, t_max) = TEMPERATURE_RANGE;
        if temperature < t_min || temperature > t_max {
            if detected {
                confidence = (confidence + 0.1_f64).min(1.0);
                description.push_str(&format!(". Temperature anomaly: {temperature:.2}°C"));
            } else {
                detected = true;
                severity = Severity::Low;
                confidence = 0.5;
                description =
                    format!("Temperature anomaly detected: {temperature:.2}°C (expected: 15-35°C)");
            }
        }

        Ok(ContaminationResult {
            detected,
            severity,
            confidence,
            description,
            turbidity,
            temperature,
            gps_estimate: gps
                .filter(|_| detected)
                .map(|fix| GpsEstimate::at_sensor(fix, confidence)),
            recommended_action: recommended_action(severity).to_string(),
        })
    }

    /// Spike: the latest reading exceeds the earlier readings' mean by more
    /// than three standard deviations. Trend (10+ points): least-squares slope
    /// of the last ten readings above 0.1 NTU per reading.
    ///
    /// `temperature` is validated but does not affect the verdict.
    pub fn detect_pattern(&self, turbidity: &[f64], temperature: &[f64]) -> Result<PatternResult> {
        if turbidity.len() < MIN_PATTERN_POINTS {
            return Ok(PatternResult::insufficient(INSUFFICIENT_PATTERN));
        }
        ensure_series_finite("turbidity_data", turbidity)?;
        ensure_series_finite("temperature_data", temperature)?;

        let Some((&current, earlier)) = turbidity.split_last() else {
            return Ok(PatternResult::insufficient(INSUFFICIENT_PATTERN));
        };
        let baseline = stats::mean(earlier);
        let spread = stats::std_dev(earlier);
        let spike_detected = current > baseline + SPIKE_SIGMAS * spread;

        let increasing_trend = turbidity.len() >= TREND_WINDOW
            && stats::linear_slope(&turbidity[turbidity.len() - TREND_WINDOW..]) > TREND_SLOPE;

        Ok(PatternResult {
            detected: spike_detected || (increasing_trend && current > TURBIDITY_SAFE),
            spike_detected,
            increasing_trend,
            current_turbidity: Some(current),
            baseline_turbidity: Some(baseline),
            confidence: if spike_detected { 0.7 } else { 0.5 },
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turbidity_bands() {
        let a = ContaminationAnalyzer;
        let critical = a.detect(12.0, 25.0, None).unwrap();
        assert!(critical.detected);
        assert_eq!(critical.severity, Severity::Critical);
        assert_eq!(critical.confidence, 0.95);
        assert_eq!(
            critical.description,
            "Critical contamination detected: Turbidity 12.00 NTU exceeds safe limit (5 NTU)"
        );

        let boundary = a.detect(10.0, 25.0, None).unwrap();
        assert_eq!(boundary.severity, Severity::Critical);

        let high = a.detect(7.0, 25.0, None).unwrap();
        assert_eq!((high.severity, high.confidence), (Severity::High, 0.8));

        let medium = a.detect(5.0, 25.0, None).unwrap();
        assert_eq!((medium.severity, medium.confidence), (Severity::Medium, 0.6));
        assert_eq!(
            medium.recommended_action,
            "Monitor closely. Increase sampling frequency. Check upstream sources."
        );
    }

    #[test]
    fn test_clean_sample() {
        let result = ContaminationAnalyzer.detect(1.0, 25.0, Some(GpsFix { lat: 1.0, lon: 2.0 })).unwrap();
        assert!(!result.detected);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.confidence, 0.0);
        assert!(result.gps_estimate.is_none());
    }

    #[test]
    fn test_temperature_bumps_detected_confidence() {
        let result = ContaminationAnalyzer.detect(8.0, 38.0, None).unwrap();
        assert_eq!(result.severity, Severity::High);
        assert!((result.confidence - 0.9).abs() < 1e-12);
        assert!(result.description.ends_with(". Temperature anomaly: 38.00°C"));

        let capped = ContaminationAnalyzer.detect(15.0, 5.0, None).unwrap();
        assert_eq!(capped.confidence, 1.0);
    }

    #[test]
    fn test_temperature_alone_is_low_severity() {
        let result = ContaminationAnalyzer.detect(2.0, 12.0, None).unwrap();
        assert!(result.detected);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(
            result.description,
            "Temperature anomaly detected: 12.00°C (expected: 15-35°C)"
        );
        assert_eq!(result.recommended_action, "Continue monitoring. Review sensor calibration.");
    }

    #[test]
    fn test_gps_attached_when_detected() {
        let gps = ContaminationAnalyzer
            .detect(11.0, 25.0, Some(GpsFix { lat: 18.5, lon: 73.8 }))
            .unwrap()
            .gps_estimate
            .unwrap();
        assert_eq!(gps.confidence, 0.95);
        assert_eq!(gps.method, "sensor_location");
    }

    #[test]
    fn test_pattern_needs_five_points() {
        let result = ContaminationAnalyzer.detect_pattern(&[1.0, 2.0, 3.0, 4.0], &[]).unwrap();
        assert!(!result.detected);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.message.as_deref(), Some(INSUFFICIENT_PATTERN));
    }

    #[test]
    fn test_pattern_spike() {
        let series = [2.0, 2.1, 1.9, 2.0, 2.1, 1.9, 9.0];
        let result = ContaminationAnalyzer.detect_pattern(&series, &[]).unwrap();
        assert!(result.spike_detected);
        assert!(!result.increasing_trend);
        assert!(result.detected);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.current_turbidity, Some(9.0));
    }

    #[test]
    fn test_pattern_trend_requires_safe_limit_breach() {
        // slope 0.5 per reading, ends at 6.5 NTU, steady enough to avoid a spike
        let rising: Vec<f64> = (0..12).map(|i| 1.0 + 0.5 * i as f64).collect();
        let result = ContaminationAnalyzer.detect_pattern(&rising, &[25.0; 12]).unwrap();
        assert!(result.increasing_trend);
        assert!(!result.spike_detected);
        assert!(result.detected);
        assert_eq!(result.confidence, 0.5);

        // same slope, still under the safe limit
        let low: Vec<f64> = (0..10).map(|i| 0.2 + 0.2 * i as f64).collect();
        let result = ContaminationAnalyzer.detect_pattern(&low, &[]).unwrap();
        assert!(result.increasing_trend);
        assert!(!result.detected);
    }

    #[test]
    fn test_pattern_trend_needs_ten_points() {
        let rising: Vec<f64> = (0..9).map(|i| 4.0 + 0.3 * i as f64).collect();
        let result = ContaminationAnalyzer.detect_pattern(&rising, &[]).unwrap();
        assert!(!result.increasing_trend);
    }

    #[test]
    fn test_pattern_rejects_non_finite() {
        let series = [1.0, 2.0, f64::INFINITY, 2.0, 1.0];
        assert!(ContaminationAnalyzer.detect_pattern(&series, &[]).is_err());
    }
}
