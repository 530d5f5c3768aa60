//! Anomaly classification.
//!
//! The outlier model decides *whether* a sample is anomalous; the rule table
//! below decides *what kind*. Rules are evaluated top to bottom and the first
//! match wins, so the table order is the tie-break contract.

use std::sync::Arc;

use crate::error::Result;
use crate::outlier::OutlierScorer;
use crate::signal::{AnomalyResult, AnomalyType, Severity};

/// Normal operating envelope.
pub const PRESSURE_RANGE: (f64, f64) = (2.0, 8.0);
pub const FLOW_RANGE: (f64, f64) = (5.0, 50.0);
pub const TURBIDITY_LIMIT: f64 = 5.0;
/// Expected flow per bar of pressure
pub const FLOW_PER_BAR: f64 = 5.0;
pub const FLOW_PRESSURE_TOLERANCE: f64 = 20.0;

/// The four readings the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub flow_rate: f64,
    pub pressure: f64,
    pub turbidity: f64,
    pub temperature: f64,
}

impl Readings {
    pub fn features(&self) -> [f64; 4] {
        [self.flow_rate, self.pressure, self.turbidity, self.temperature]
    }
}

/// One row of the classification cascade.
pub struct Rule {
    pub kind: AnomalyType,
    pub matches: fn(&Readings) -> bool,
    pub severity: fn(&Readings) -> Severity,
}

pub static RULES: [Rule; 5] = [
    Rule {
        kind: AnomalyType::PressureAnomaly,
        matches: |r| r.pressure < PRESSURE_RANGE.0 || r.pressure > PRESSURE_RANGE.1,
        severity: |r| {
            if r.pressure < 1.0 {
                Severity::Critical
            } else if r.pressure < 1.5 {
                Severity::High
            } else {
                Severity::Medium
            }
        },
    },
    Rule {
        kind: AnomalyType::LowFlow,
        matches: |r| r.flow_rate < FLOW_RANGE.0 * 0.5,
        severity: |r| if r.flow_rate < 1.0 { Severity::High } else { Severity::Medium },
    },
    Rule {
        kind: AnomalyType::Contamination,
        matches: |r| r.turbidity > TURBIDITY_LIMIT,
        severity: |r| {
            if r.turbidity > 10.0 {
                Severity::Critical
            } else if r.turbidity > 7.0 {
                Severity::High
            } else {
                Severity::Medium
            }
        },
    },
    Rule {
        kind: AnomalyType::Leak,
        matches: |r| (r.flow_rate - r.pressure * FLOW_PER_BAR).abs() > FLOW_PRESSURE_TOLERANCE,
        severity: |_| Severity::High,
    },
    Rule {
        kind: AnomalyType::GeneralAnomaly,
        matches: |_| true,
        severity: |_| Severity::Medium,
    },
];

/// First matching rule's type and severity.
pub fn categorize(readings: &Readings) -> Option<(AnomalyType, Severity)> {
    RULES
        .iter()
        .find(|rule| (rule.matches)(readings))
        .map(|rule| (rule.kind, (rule.severity)(readings)))
}

/// Description for a detected anomaly; `None` is the unmapped fallback.
pub fn describe(kind: Option<AnomalyType>, r: &Readings) -> String {
    match kind {
        Some(AnomalyType::PressureAnomaly) => format!(
            "Pressure anomaly detected: {:.2} bar (expected: 2-8 bar)",
            r.pressure
        ),
        Some(AnomalyType::LowFlow) => format!(
            "Low flow rate detected: {:.2} L/min (expected: 5-50 L/min)",
            r.flow_rate
        ),
        Some(AnomalyType::Contamination) => format!(
            "Water quality issue: Turbidity {:.2} NTU (expected: <5 NTU)",
            r.turbidity
        ),
        Some(AnomalyType::Leak) => format!(
            "Possible leak detected: Flow-Pressure mismatch (Flow: {:.2} L/min, Pressure: {:.2} bar)",
            r.flow_rate, r.pressure
        ),
        Some(AnomalyType::GeneralAnomaly) => "Anomaly detected in sensor readings".to_string(),
        None => "Anomaly detected".to_string(),
    }
}

pub fn recommend(kind: Option<AnomalyType>) -> &'static str {
    match kind {
        Some(AnomalyType::PressureAnomaly) => "Check pump operation and pipeline integrity",
        Some(AnomalyType::LowFlow) => "Inspect for blockages or valve issues",
        Some(AnomalyType::Contamination) => {
            "Immediate water quality test required. Notify health authorities."
        }
        Some(AnomalyType::Leak) => {
            "Dispatch field team to investigate leak. Use GPS coordinates for location."
        }
        Some(AnomalyType::GeneralAnomaly) => "Review sensor readings and perform diagnostic check",
        None => "Investigate anomaly",
    }
}

pub const NORMAL_DESCRIPTION: &str = "All parameters within normal range";
pub const NORMAL_ACTION: &str = "Continue monitoring";

/// Outlier verdict plus rule cascade.
#[derive(Clone)]
pub struct AnomalyClassifier {
    scorer: Arc<dyn OutlierScorer>,
}

impl AnomalyClassifier {
    pub fn new(scorer: Arc<dyn OutlierScorer>) -> Self {
        Self { scorer }
    }

    pub fn classify(&self, readings: &Readings) -> Result<AnomalyResult> {
        let verdict = self.scorer.score(&readings.features())?;
        let confidence = (verdict.anomaly_score.abs() * 100.0).min(100.0);

        if !verdict.is_outlier {
            return Ok(AnomalyResult {
                detected: false,
                anomaly_type: None,
                severity: Severity::Low,
                confidence,
                anomaly_score: verdict.anomaly_score,
                description: NORMAL_DESCRIPTION.to_string(),
                recommended_action: NORMAL_ACTION.to_string(),
            });
        }

        let (kind, severity) = match categorize(readings) {
            Some((kind, severity)) => (Some(kind), severity),
            None => (None, Severity::Medium),
        };

        Ok(AnomalyResult {
            detected: true,
            anomaly_type: kind,
            severity,
            confidence,
            anomaly_score: verdict.anomaly_score,
            description: describe(kind, readings),
            recommended_action: recommend(kind).to_string(),
        })
    }
}
