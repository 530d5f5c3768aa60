//! Engine and gateway configuration.
//!
//! Defaults carry the design constants; a JSON file may override any subset.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::algo::{ForestParams, RegressionParams};
use crate::error::{DetectionError, Result};

/// Configuration for the maintenance estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub forest: RegressionParams,
    /// Rows in the synthetic cold-start dataset
    pub bootstrap_rows: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            forest: RegressionParams::default(),
            bootstrap_rows: 100,
        }
    }
}

/// Top-level configuration for [`crate::engine::DiagnosticEngine`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub outlier: ForestParams,
    pub maintenance: MaintenanceConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DetectionError::Internal(format!("invalid engine config: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DetectionError::Internal(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}

/// Settings for the `jal-gateway` binary.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding model checkpoints
    pub model_dir: PathBuf,
    /// Optional JSON file with an [`EngineConfig`]
    pub config_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_dir: PathBuf::from("models"),
            config_path: None,
        }
    }
}

impl GatewayConfig {
    /// Reads `HOST`, `PORT`, `MODEL_DIR` and `JAL_CONFIG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            model_dir: lookup("MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model_dir),
            config_path: lookup("JAL_CONFIG").map(PathBuf::from),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
