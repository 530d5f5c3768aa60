//! Water Quality Index.
//!
//! Each parameter maps onto a 0–100 sub-score through a fixed piecewise-linear
//! curve; a missing parameter takes a neutral sub-score instead. The index is
//! the weighted sum, rounded to two decimals.

use crate::signal::{QualityStatus, SubScores, WaterQualityResult};
use crate::stats::round_to;

pub const DEFAULT_TURBIDITY_SCORE: f64 = 60.0;
pub const DEFAULT_CONDUCTIVITY_SCORE: f64 = 65.0;
pub const DEFAULT_TEMPERATURE_SCORE: f64 = 70.0;
pub const DEFAULT_PH_SCORE: f64 = 70.0;

const TURBIDITY_WEIGHT: f64 = 0.3;
const PH_WEIGHT: f64 = 0.3;
const TEMPERATURE_WEIGHT: f64 = 0.2;
const CONDUCTIVITY_WEIGHT: f64 = 0.2;

const IDEAL_PH: f64 = 7.4;

fn to_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// 0 NTU → 100, 50 NTU and above → 0.
pub fn score_turbidity(turbidity: Option<f64>) -> f64 {
    turbidity.map_or(DEFAULT_TURBIDITY_SCORE, |t| {
        to_score(100.0 - t.clamp(0.0, 50.0) / 50.0 * 100.0)
    })
}

/// 250 µS/cm or less → 100, 1500 µS/cm and above → 0.
pub fn score_conductivity(conductivity: Option<f64>) -> f64 {
    conductivity.map_or(DEFAULT_CONDUCTIVITY_SCORE, |c| {
        to_score(100.0 - (c.clamp(0.0, 1500.0) - 250.0) / 1250.0 * 100.0)
    })
}

/// Full marks within 15–30 °C, otherwise decays with distance from 22.5 °C.
pub fn score_temperature(temperature: Option<f64>) -> f64 {
    temperature.map_or(DEFAULT_TEMPERATURE_SCORE, |t| {
        if (15.0..=30.0).contains(&t) {
            return 100.0;
        }
        let deviation = (t - 22.5).abs().min(15.0);
        to_score(100.0 - deviation / 15.0 * 100.0)
    })
}

/// 100 at pH 7.4, 0 at a deviation of 3 or more.
pub fn score_ph(ph: Option<f64>) -> f64 {
    ph.map_or(DEFAULT_PH_SCORE, |ph| {
        let deviation = (ph - IDEAL_PH).abs();
        if deviation >= 3.0 {
            0.0
        } else {
            to_score(100.0 - deviation / 3.0 * 100.0)
        }
    })
}

pub struct Classification {
    pub status: QualityStatus,
    pub color: &'static str,
    pub indicator: &'static str,
    pub message: &'static str,
}

/// [80, 100] good, [60, 80) average, below 60 bad.
pub fn classify_wqi(wqi: f64) -> Classification {
    if wqi >= 80.0 {
        Classification {
            status: QualityStatus::Good,
            color: "green",
            indicator: "🟢",
            message: "Water quality is good and safe for supply.",
        }
    } else if wqi >= 60.0 {
        Classification {
            status: QualityStatus::Average,
            color: "yellow",
            indicator: "🟡",
            message: "Water quality is acceptable but should be monitored.",
        }
    } else {
        Classification {
            status: QualityStatus::Bad,
            color: "red",
            indicator: "🔴",
            message: "Water quality is poor. Immediate action required.",
        }
    }
}

pub fn calculate_water_quality(
    turbidity: Option<f64>,
    ph: Option<f64>,
    temperature: Option<f64>,
    conductivity: Option<f64>,
) -> WaterQualityResult {
    let sub_scores = SubScores {
        turbidity: score_turbidity(turbidity),
        ph: score_ph(ph),
        temperature: score_temperature(temperature),
        conductivity: score_conductivity(conductivity),
    };

    let wqi = round_to(
        sub_scores.turbidity * TURBIDITY_WEIGHT
            + sub_scores.ph * PH_WEIGHT
            + sub_scores.temperature * TEMPERATURE_WEIGHT
            + sub_scores.conductivity * CONDUCTIVITY_WEIGHT,
        2,
    );
    let class = classify_wqi(wqi);

    WaterQualityResult {
        wqi,
        status: class.status,
        color: class.color.to_string(),
        indicator: class.indicator.to_string(),
        message: class.message.to_string(),
        sub_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_turbidity_curve() {
        assert_eq!(score_turbidity(Some(0.0)), 100.0);
        assert_eq!(score_turbidity(Some(50.0)), 0.0);
        assert_eq!(score_turbidity(Some(120.0)), 0.0);
        assert!((score_turbidity(Some(5.0)) - 90.0).abs() < EPS);

        let mut previous = f64::INFINITY;
        for step in 0..=500 {
            let score = score_turbidity(Some(step as f64 * 0.1));
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_conductivity_curve() {
        assert_eq!(score_conductivity(Some(100.0)), 100.0);
        assert_eq!(score_conductivity(Some(250.0)), 100.0);
        assert!((score_conductivity(Some(875.0)) - 50.0).abs() < EPS);
        assert_eq!(score_conductivity(Some(1500.0)), 0.0);
        assert_eq!(score_conductivity(Some(4000.0)), 0.0);
    }

    #[test]
    fn test_temperature_curve() {
        assert_eq!(score_temperature(Some(15.0)), 100.0);
        assert_eq!(score_temperature(Some(30.0)), 100.0);
        // 7.5 from the midpoint
        assert!((score_temperature(Some(30.0 + 1e-9)) - 50.0).abs() < 1e-6);
        assert_eq!(score_temperature(Some(40.0)), 0.0);
        assert_eq!(score_temperature(Some(-10.0)), 0.0);
    }

    #[test]
    fn test_ph_curve() {
        assert_eq!(score_ph(Some(7.4)), 100.0);
        assert!((score_ph(Some(8.9)) - 50.0).abs() < EPS);
        assert_eq!(score_ph(Some(10.4)), 0.0);
        assert_eq!(score_ph(Some(3.0)), 0.0);
    }

    #[test]
    fn test_missing_inputs_use_neutral_scores() {
        let result = calculate_water_quality(None, None, None, None);
        assert_eq!(
            result.sub_scores,
            SubScores {
                turbidity: 60.0,
                ph: 70.0,
                temperature: 70.0,
                conductivity: 65.0
            }
        );
        // 18 + 21 + 14 + 13
        assert!((result.wqi - 66.0).abs() < EPS);
        assert_eq!(result.status, QualityStatus::Average);
    }

    #[test]
    fn test_wqi_bands_have_no_gaps() {
        assert_eq!(classify_wqi(100.0).status, QualityStatus::Good);
        assert_eq!(classify_wqi(80.0).status, QualityStatus::Good);
        assert_eq!(classify_wqi(79.99).status, QualityStatus::Average);
        assert_eq!(classify_wqi(60.0).status, QualityStatus::Average);
        assert_eq!(classify_wqi(59.99).status, QualityStatus::Bad);
        assert_eq!(classify_wqi(0.0).status, QualityStatus::Bad);

        let mut last = QualityStatus::Bad;
        for step in 0..=10_000 {
            let status = classify_wqi(step as f64 / 100.0).status;
            // bands only ever move upward as the index rises
            let rank = |s: QualityStatus| match s {
                QualityStatus::Bad => 0,
                QualityStatus::Average => 1,
                QualityStatus::Good => 2,
            };
            assert!(rank(status) >= rank(last));
            last = status;
        }
    }

    #[test]
    fn test_clean_water_is_good_and_rounded() {
        let result = calculate_water_quality(Some(1.3), Some(7.2), Some(24.0), Some(310.0));
        assert_eq!(result.status, QualityStatus::Good);
        assert_eq!(result.color, "green");
        assert_eq!(result.indicator, "🟢");
        assert_eq!(result.wqi, round_to(result.wqi, 2));
        assert!(result.wqi > 90.0);
    }

    #[test]
    fn test_turbid_water_is_bad() {
        let result = calculate_water_quality(Some(45.0), Some(4.0), Some(38.0), Some(1400.0));
        assert_eq!(result.status, QualityStatus::Bad);
        assert_eq!(result.message, "Water quality is poor. Immediate action required.");
    }
}
