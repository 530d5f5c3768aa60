//! Diagnostic result records.
//!
//! Every detector returns an immutable value object defined here. Field names
//! serialize to the JSON shape the gateway has always emitted, so the boundary
//! can return these records directly.

use serde::{Deserialize, Serialize};

use crate::telemetry::GpsFix;

/// Ordered severity band attached to a detected issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category assigned by the anomaly classifier's rule cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    PressureAnomaly,
    LowFlow,
    Contamination,
    Leak,
    GeneralAnomaly,
}

impl AnomalyType {
    pub const ALL: [AnomalyType; 5] = [
        Self::PressureAnomaly,
        Self::LowFlow,
        Self::Contamination,
        Self::Leak,
        Self::GeneralAnomaly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PressureAnomaly => "pressure_anomaly",
            Self::LowFlow => "low_flow",
            Self::Contamination => "contamination",
            Self::Leak => "leak",
            Self::GeneralAnomaly => "general_anomaly",
        }
    }

    /// Types that warrant the leak analyzer.
    pub fn is_hydraulic(&self) -> bool {
        matches!(self, Self::Leak | Self::PressureAnomaly)
    }

    /// Types that warrant the contamination analyzer.
    pub fn is_quality(&self) -> bool {
        matches!(self, Self::Contamination)
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw verdict from the outlier model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierVerdict {
    pub is_outlier: bool,
    /// Higher = more anomalous, in (0, 1].
    pub anomaly_score: f64,
}

/// Output of the anomaly classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    #[serde(rename = "anomaly_detected")]
    pub detected: bool,
    pub anomaly_type: Option<AnomalyType>,
    pub severity: Severity,
    /// Percentage scale, [0, 100].
    pub confidence: f64,
    pub anomaly_score: f64,
    pub description: String,
    pub recommended_action: String,
}

/// Best-effort location attribution for a detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsEstimate {
    pub lat: f64,
    pub lon: f64,
    pub confidence: f64,
    pub method: String,
}

impl GpsEstimate {
    pub const SENSOR_LOCATION: &'static str = "sensor_location";

    pub fn at_sensor(fix: GpsFix, confidence: f64) -> Self {
        Self {
            lat: fix.lat,
            lon: fix.lon,
            confidence,
            method: Self::SENSOR_LOCATION.to_string(),
        }
    }
}

/// Instantaneous leak verdict for a single sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakResult {
    #[serde(rename = "leak_detected")]
    pub detected: bool,
    /// [0, 1]
    pub confidence: f64,
    pub gps_estimate: Option<GpsEstimate>,
    pub pressure: f64,
    pub flow_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureStats {
    pub mean: f64,
    pub std: f64,
    pub recent: f64,
}

/// Index into the pressure series where the steepest drop occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakLocation {
    pub index: usize,
    pub pressure_drop: f64,
    pub method: String,
}

/// Leak verdict fused from pressure/flow history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakHistoryResult {
    #[serde(rename = "leak_detected")]
    pub detected: bool,
    /// Sum of fired signal weights, capped at 1.0.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leak_location_estimate: Option<LeakLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_drop: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_stats: Option<PressureStats>,
}

impl LeakHistoryResult {
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self {
            detected: false,
            confidence: 0.0,
            message: Some(message.into()),
            leak_location_estimate: None,
            pressure_drop: None,
            correlation: None,
            pressure_stats: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationEstimate {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Multi-sensor leak attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakLocalization {
    pub device_id: String,
    pub estimated_location: LocationEstimate,
    pub confidence: f64,
    pub method: String,
}

/// Threshold-band contamination verdict for a single sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminationResult {
    #[serde(rename = "contamination_detected")]
    pub detected: bool,
    pub severity: Severity,
    /// [0, 1]
    pub confidence: f64,
    pub description: String,
    pub turbidity: f64,
    pub temperature: f64,
    pub gps_estimate: Option<GpsEstimate>,
    pub recommended_action: String,
}

/// Spike/trend contamination verdict over a turbidity series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    #[serde(rename = "contamination_detected")]
    pub detected: bool,
    pub spike_detected: bool,
    pub increasing_trend: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_turbidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_turbidity: Option<f64>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PatternResult {
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self {
            detected: false,
            spike_detected: false,
            increasing_trend: false,
            current_turbidity: None,
            baseline_turbidity: None,
            confidence: 0.0,
            message: Some(message.into()),
        }
    }
}

/// Remaining-time-to-maintenance estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceResult {
    pub maintenance_needed: bool,
    pub days_until_maintenance: Option<f64>,
    pub urgency: Option<Severity>,
    /// min(records / 100, 1.0)
    pub confidence: f64,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MaintenanceResult {
    pub fn insufficient(message: impl Into<String>) -> Self {
        Self {
            maintenance_needed: false,
            days_until_maintenance: None,
            urgency: None,
            confidence: 0.0,
            recommended_actions: Vec::new(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    Good,
    Average,
    Bad,
}

/// Per-parameter sub-scores on the 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub turbidity: f64,
    pub ph: f64,
    pub temperature: f64,
    pub conductivity: f64,
}

/// Water Quality Index with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterQualityResult {
    pub wqi: f64,
    pub status: QualityStatus,
    pub color: String,
    pub indicator: String,
    pub message: String,
    pub sub_scores: SubScores,
}

/// Merged verdict for one telemetry sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratedResult {
    #[serde(rename = "anomaly_detected")]
    pub detected: bool,
    pub anomaly_type: Option<AnomalyType>,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub recommended_action: String,
    pub gps_estimate: Option<GpsEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leak_details: Option<LeakResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contamination_details: Option<ContaminationResult>,
    pub water_quality: WaterQualityResult,
}
