//! Telemetry input types.
//!
//! These are constructed per request by the boundary and handed to the core by
//! reference. Nothing here is retained between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Number of features fed to the outlier model.
pub const NUM_FEATURES: usize = 4;

/// Feature order shared by the outlier model, its training rows and checkpoints.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = ["flow_rate", "pressure", "turbidity", "temperature"];

/// A latitude/longitude pair reported by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
}

impl GpsFix {
    /// Builds a fix only when both coordinates are present.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }
}

/// One real-time sample from a field sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: String,
    /// L/min
    pub flow_rate: f64,
    /// bar
    pub pressure: f64,
    /// NTU
    pub turbidity: f64,
    /// °C
    pub temperature: f64,
    #[serde(default)]
    pub ph: Option<f64>,
    /// µS/cm
    #[serde(default)]
    pub conductivity: Option<f64>,
    #[serde(default)]
    pub gps_lat: Option<f64>,
    #[serde(default)]
    pub gps_lon: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TelemetrySample {
    /// Sample with only the four core readings set.
    pub fn new(
        device_id: impl Into<String>,
        flow_rate: f64,
        pressure: f64,
        turbidity: f64,
        temperature: f64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            flow_rate,
            pressure,
            turbidity,
            temperature,
            ph: None,
            conductivity: None,
            gps_lat: None,
            gps_lon: None,
            timestamp: None,
        }
    }

    pub fn with_gps(mut self, lat: f64, lon: f64) -> Self {
        self.gps_lat = Some(lat);
        self.gps_lon = Some(lon);
        self
    }

    pub fn with_chemistry(mut self, ph: Option<f64>, conductivity: Option<f64>) -> Self {
        self.ph = ph;
        self.conductivity = conductivity;
        self
    }

    pub fn gps(&self) -> Option<GpsFix> {
        GpsFix::from_parts(self.gps_lat, self.gps_lon)
    }

    /// Feature vector in [`FEATURE_NAMES`] order.
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [self.flow_rate, self.pressure, self.turbidity, self.temperature]
    }

    /// Rejects non-finite numbers and physically impossible negatives.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("flow_rate", self.flow_rate)?;
        ensure_non_negative("pressure", self.pressure)?;
        ensure_non_negative("turbidity", self.turbidity)?;
        ensure_finite("temperature", self.temperature)?;
        if let Some(ph) = self.ph {
            ensure_finite("ph", ph)?;
        }
        if let Some(conductivity) = self.conductivity {
            ensure_non_negative("conductivity", conductivity)?;
        }
        if let Some(lat) = self.gps_lat {
            ensure_range("gps_lat", lat, -90.0, 90.0)?;
        }
        if let Some(lon) = self.gps_lon {
            ensure_range("gps_lon", lon, -180.0, 180.0)?;
        }
        Ok(())
    }
}

/// Pump state recorded alongside historical readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpStatus {
    On,
    Off,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One point of a device's structured history (maintenance input).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub flow_rate: f64,
    pub pressure: f64,
    pub turbidity: f64,
    pub temperature: f64,
    pub pump_status: PumpStatus,
}

impl HistoricalRecord {
    pub fn new(flow_rate: f64, pressure: f64, turbidity: f64, temperature: f64, pump_on: bool) -> Self {
        Self {
            timestamp: None,
            flow_rate,
            pressure,
            turbidity,
            temperature,
            pump_status: if pump_on { PumpStatus::On } else { PumpStatus::Off },
        }
    }
}

/// A simultaneous reading from one sensor of a multi-sensor set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default)]
    pub device_id: String,
    pub pressure: f64,
    #[serde(default)]
    pub flow_rate: f64,
    #[serde(default)]
    pub gps_lat: Option<f64>,
    #[serde(default)]
    pub gps_lon: Option<f64>,
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DetectionError::invalid(field, format!("must be finite, got {value}")))
    }
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(DetectionError::invalid(
            field,
            format!("must be non-negative, got {value}"),
        ));
    }
    Ok(())
}

fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    ensure_finite(field, value)?;
    if value < min || value > max {
        return Err(DetectionError::invalid(
            field,
            format!("must be within [{min}, {max}], got {value}"),
        ));
    }
    Ok(())
}

/// Validates every element of a caller-supplied series.
pub(crate) fn ensure_series_finite(field: &'static str, series: &[f64]) -> Result<()> {
    match series.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(DetectionError::invalid(
            field,
            format!("element {idx} is not finite"),
        )),
        None => Ok(()),
    }
}
