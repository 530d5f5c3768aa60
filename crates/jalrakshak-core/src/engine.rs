//! Diagnostic Engine
//!
//! Owns every detector and composes them for one telemetry sample:
//!
//! 1. the classifier (backed by the shared outlier model) runs first
//! 2. a hydraulic anomaly (`leak`, `pressure_anomaly`) triggers the leak rules;
//!    a `contamination` anomaly triggers the contamination bands
//! 3. the water quality index is always computed
//!
//! The engine is `Send + Sync`; share it behind an `Arc`. The outlier model is
//! its only mutable state.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::checkpoint::{MAINTENANCE_MODEL_KEY, ModelStore, OUTLIER_MODEL_KEY, PersistHandle};
use crate::classifier::{AnomalyClassifier, Readings};
use crate::config::EngineConfig;
use crate::contamination::ContaminationAnalyzer;
use crate::error::Result;
use crate::leak::LeakAnalyzer;
use crate::maintenance::MaintenanceEstimator;
use crate::outlier::{OutlierModel, OutlierScorer};
use crate::quality::calculate_water_quality;
use crate::signal::{
    LeakHistoryResult, LeakLocalization, MaintenanceResult, OrchestratedResult, PatternResult,
    Severity,
};
use crate::telemetry::{HistoricalRecord, SensorReading, TelemetrySample};

pub struct DiagnosticEngine {
    outlier: Arc<OutlierModel>,
    classifier: AnomalyClassifier,
    leak: LeakAnalyzer,
    contamination: ContaminationAnalyzer,
    maintenance: MaintenanceEstimator,
}

impl DiagnosticEngine {
    pub fn new(outlier: OutlierModel, maintenance: MaintenanceEstimator) -> Self {
        let outlier = Arc::new(outlier);
        let scorer: Arc<dyn OutlierScorer> = outlier.clone();
        Self {
            outlier,
            classifier: AnomalyClassifier::new(scorer),
            leak: LeakAnalyzer,
            contamination: ContaminationAnalyzer,
            maintenance,
        }
    }

    /// Build both models, preferring checkpoints in `store`.
    ///
    /// A missing or rejected checkpoint falls back to a bootstrap fit, which
    /// is written back to the store. Retrains are queued on `persist`.
    pub fn bootstrap(
        config: &EngineConfig,
        store: Option<&dyn ModelStore>,
        persist: Option<PersistHandle>,
    ) -> Result<Self> {
        let mut outlier = match load(store, OUTLIER_MODEL_KEY)
            .map(|bytes| OutlierModel::from_checkpoint(&bytes, config.outlier))
        {
            Some(Ok(model)) => {
                info!(key = OUTLIER_MODEL_KEY, "Outlier model loaded from checkpoint");
                model
            }
            restored => {
                if let Some(Err(e)) = restored {
                    warn!(key = OUTLIER_MODEL_KEY, error = %e, "Checkpoint rejected, refitting");
                }
                let model = OutlierModel::bootstrap(config.outlier)?;
                save(store, OUTLIER_MODEL_KEY, model.checkpoint());
                model
            }
        };
        if let Some(handle) = persist {
            outlier = outlier.with_persistence(handle);
        }

        let maintenance = match load(store, MAINTENANCE_MODEL_KEY)
            .map(|bytes| MaintenanceEstimator::from_checkpoint(&bytes))
        {
            Some(Ok(estimator)) => {
                info!(key = MAINTENANCE_MODEL_KEY, "Maintenance model loaded from checkpoint");
                estimator
            }
            restored => {
                if let Some(Err(e)) = restored {
                    warn!(key = MAINTENANCE_MODEL_KEY, error = %e, "Checkpoint rejected, refitting");
                }
                let estimator = MaintenanceEstimator::bootstrap(&config.maintenance)?;
                save(store, MAINTENANCE_MODEL_KEY, estimator.checkpoint());
                estimator
            }
        };

        Ok(Self::new(outlier, maintenance))
    }

    /// Route classification through a different scorer. The shared outlier
    /// model is still the one retrained by [`Self::retrain_outlier_model`].
    pub fn with_scorer(mut self, scorer: Arc<dyn OutlierScorer>) -> Self {
        self.classifier = AnomalyClassifier::new(scorer);
        self
    }

    pub fn outlier_model(&self) -> &Arc<OutlierModel> {
        &self.outlier
    }

    pub fn maintenance_model(&self) -> &MaintenanceEstimator {
        &self.maintenance
    }

    pub fn evaluate_sample(&self, sample: &TelemetrySample) -> Result<OrchestratedResult> {
        sample.validate()?;

        let readings = Readings {
            flow_rate: sample.flow_rate,
            pressure: sample.pressure,
            turbidity: sample.turbidity,
            temperature: sample.temperature,
        };
        let anomaly = self.classifier.classify(&readings)?;
        let kind = anomaly.anomaly_type.filter(|_| anomaly.detected);

        let leak_details = match kind {
            Some(k) if k.is_hydraulic() => {
                Some(self.leak.detect(sample.pressure, sample.flow_rate, sample.gps())?)
            }
            _ => None,
        };
        let contamination_details = match kind {
            Some(k) if k.is_quality() => Some(self.contamination.detect(
                sample.turbidity,
                sample.temperature,
                sample.gps(),
            )?),
            _ => None,
        };

        let water_quality = calculate_water_quality(
            Some(sample.turbidity),
            sample.ph,
            Some(sample.temperature),
            sample.conductivity,
        );

        if anomaly.detected && anomaly.severity == Severity::Critical {
            warn!(
                device_id = %sample.device_id,
                kind = ?kind,
                score = anomaly.anomaly_score,
                "CRITICAL ANOMALY: {}",
                anomaly.description
            );
        } else {
            debug!(
                device_id = %sample.device_id,
                detected = anomaly.detected,
                kind = ?kind,
                wqi = water_quality.wqi,
                "Sample evaluated"
            );
        }

        Ok(OrchestratedResult {
            detected: anomaly.detected,
            anomaly_type: kind,
            severity: if anomaly.detected { anomaly.severity } else { Severity::Low },
            confidence: anomaly.confidence,
            description: anomaly.description,
            recommended_action: anomaly.recommended_action,
            gps_estimate: leak_details.as_ref().and_then(|l| l.gps_estimate.clone()),
            leak_details,
            contamination_details,
            water_quality,
        })
    }

    pub fn evaluate_leak_history(&self, pressure: &[f64], flow: &[f64]) -> Result<LeakHistoryResult> {
        self.leak.detect_with_history(pressure, flow)
    }

    pub fn evaluate_contamination_pattern(
        &self,
        turbidity: &[f64],
        temperature: &[f64],
    ) -> Result<PatternResult> {
        self.contamination.detect_pattern(turbidity, temperature)
    }

    pub fn localize_leak(
        &self,
        readings: &[SensorReading],
        topology: Option<&serde_json::Value>,
    ) -> Result<Option<LeakLocalization>> {
        self.leak.localize_leak(readings, topology)
    }

    pub fn evaluate_maintenance(&self, history: &[HistoricalRecord]) -> Result<MaintenanceResult> {
        self.maintenance.predict(history)
    }

    /// Refit the outlier model on `rows`. `false` means the rows were
    /// rejected and the previous model is still active.
    pub fn retrain_outlier_model(&self, rows: &[Vec<f64>]) -> bool {
        self.outlier.update(rows).is_ok()
    }
}

fn load(store: Option<&dyn ModelStore>, key: &str) -> Option<Vec<u8>> {
    match store?.load(key) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key, error = %e, "Checkpoint unreadable");
            None
        }
    }
}

fn save(store: Option<&dyn ModelStore>, key: &str, bytes: Result<Vec<u8>>) {
    let Some(store) = store else { return };
    let written = bytes.and_then(|b| Ok(store.save(key, &b)?));
    match written {
        Ok(()) => info!(key, "Bootstrap checkpoint written"),
        Err(e) => warn!(key, error = %e, "Bootstrap checkpoint not written"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::{ForestParams, RegressionParams};
    use crate::config::MaintenanceConfig;
    use crate::signal::{AnomalyType, OutlierVerdict, QualityStatus};

    /// Flags every sample with a fixed score.
    struct AlwaysOutlier;

    impl OutlierScorer for AlwaysOutlier {
        fn score(&self, _features: &[f64; 4]) -> Result<OutlierVerdict> {
            Ok(OutlierVerdict {
                is_outlier: true,
                anomaly_score: 0.68,
            })
        }
    }

    struct NeverOutlier;

    impl OutlierScorer for NeverOutlier {
        fn score(&self, _features: &[f64; 4]) -> Result<OutlierVerdict> {
            Ok(OutlierVerdict {
                is_outlier: false,
                anomaly_score: 0.4,
            })
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            outlier: ForestParams {
                n_trees: 50,
                ..ForestParams::default()
            },
            maintenance: MaintenanceConfig {
                forest: RegressionParams {
                    n_trees: 10,
                    ..RegressionParams::default()
                },
                ..MaintenanceConfig::default()
            },
        }
    }

    fn engine() -> DiagnosticEngine {
        DiagnosticEngine::bootstrap(&config(), None, None).unwrap()
    }

    #[test]
    fn test_pressure_scenario_runs_leak_analyzer() {
        let engine = engine().with_scorer(Arc::new(AlwaysOutlier));
        let sample = TelemetrySample::new("dev-7", 10.0, 1.2, 2.0, 25.0).with_gps(18.5, 73.8);
        let result = engine.evaluate_sample(&sample).unwrap();

        assert!(result.detected);
        assert_eq!(result.anomaly_type, Some(AnomalyType::PressureAnomaly));
        assert_eq!(result.severity, Severity::High);
        let leak = result.leak_details.unwrap();
        assert!(leak.detected);
        assert_eq!(leak.confidence, 0.9);
        assert_eq!(result.gps_estimate.unwrap().confidence, 0.9);
        assert!(result.contamination_details.is_none());
    }

    #[test]
    fn test_turbidity_scenario_runs_contamination_analyzer() {
        let engine = engine().with_scorer(Arc::new(AlwaysOutlier));
        let sample = TelemetrySample::new("dev-9", 25.0, 5.0, 12.0, 25.0);
        let result = engine.evaluate_sample(&sample).unwrap();

        assert_eq!(result.anomaly_type, Some(AnomalyType::Contamination));
        assert_eq!(result.severity, Severity::Critical);
        let contamination = result.contamination_details.unwrap();
        assert_eq!(contamination.severity, Severity::Critical);
        assert_eq!(contamination.confidence, 0.95);
        assert!(result.leak_details.is_none());
        assert!(result.gps_estimate.is_none());
    }

    #[test]
    fn test_general_anomaly_runs_no_analyzer() {
        let engine = engine().with_scorer(Arc::new(AlwaysOutlier));
        let result = engine
            .evaluate_sample(&TelemetrySample::new("d", 25.0, 5.0, 2.0, 25.0))
            .unwrap();
        assert_eq!(result.anomaly_type, Some(AnomalyType::GeneralAnomaly));
        assert!(result.leak_details.is_none());
        assert!(result.contamination_details.is_none());
    }

    #[test]
    fn test_not_detected_is_low_with_quality() {
        let engine = engine().with_scorer(Arc::new(NeverOutlier));
        let sample = TelemetrySample::new("d", 0.5, 0.5, 30.0, 25.0).with_chemistry(Some(7.4), Some(300.0));
        let result = engine.evaluate_sample(&sample).unwrap();

        assert!(!result.detected);
        assert_eq!(result.anomaly_type, None);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.description, "All parameters within normal range");
        assert!(result.leak_details.is_none());
        assert!(result.water_quality.sub_scores.turbidity < 50.0);
    }

    #[test]
    fn test_evaluate_sample_is_idempotent() {
        let engine = engine();
        let sample = TelemetrySample::new("d", 31.0, 3.1, 4.2, 29.0).with_chemistry(Some(6.9), None);
        let a = engine.evaluate_sample(&sample).unwrap();
        let b = engine.evaluate_sample(&sample).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.water_quality.status, QualityStatus::Bad);
    }

    #[test]
    fn test_invalid_sample_rejected() {
        let engine = engine();
        let sample = TelemetrySample::new("d", -1.0, 3.0, 2.0, 25.0);
        assert!(engine.evaluate_sample(&sample).unwrap_err().is_input_error());
    }

    #[test]
    fn test_retrain_reports_success_and_failure() {
        let engine = engine();
        let rows: Vec<Vec<f64>> = crate::outlier::bootstrap_rows();
        assert!(engine.retrain_outlier_model(&rows));
        assert!(!engine.retrain_outlier_model(&[]));
        assert!(!engine.retrain_outlier_model(&[vec![1.0, f64::NAN, 2.0, 3.0]]));
    }

    #[test]
    fn test_maintenance_needs_thirty_records() {
        let engine = engine();
        let history: Vec<HistoricalRecord> = (0..29)
            .map(|_| HistoricalRecord::new(12.0, 4.0, 1.0, 25.0, true))
            .collect();
        let result = engine.evaluate_maintenance(&history).unwrap();
        assert!(!result.maintenance_needed);
        assert_eq!(result.confidence, 0.0);
        assert!(result.message.is_some());
    }
}
