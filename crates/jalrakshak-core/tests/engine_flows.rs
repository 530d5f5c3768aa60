use jalrakshak_core::algo::{ForestParams, RegressionParams};
use jalrakshak_core::checkpoint::{
    FileModelStore, MAINTENANCE_MODEL_KEY, ModelStore, OUTLIER_MODEL_KEY, PersistenceWorker,
};
use jalrakshak_core::config::{EngineConfig, MaintenanceConfig};
use jalrakshak_core::{AnomalyType, DiagnosticEngine, HistoricalRecord, Severity, TelemetrySample};

fn fast_config() -> EngineConfig {
    EngineConfig {
        outlier: ForestParams {
            n_trees: 40,
            ..ForestParams::default()
        },
        maintenance: MaintenanceConfig {
            forest: RegressionParams {
                n_trees: 15,
                ..RegressionParams::default()
            },
            ..MaintenanceConfig::default()
        },
    }
}

#[test]
fn test_cold_start_writes_both_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileModelStore::new(dir.path()).unwrap();

    DiagnosticEngine::bootstrap(&fast_config(), Some(&store), None).unwrap();

    assert!(store.load(OUTLIER_MODEL_KEY).unwrap().is_some());
    assert!(store.load(MAINTENANCE_MODEL_KEY).unwrap().is_some());
}

#[test]
fn test_restart_from_checkpoint_gives_same_verdicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileModelStore::new(dir.path()).unwrap();
    let config = fast_config();

    let first = DiagnosticEngine::bootstrap(&config, Some(&store), None).unwrap();
    let second = DiagnosticEngine::bootstrap(&config, Some(&store), None).unwrap();

    let sample = TelemetrySample::new("pump-3", 38.0, 2.4, 3.9, 31.0);
    assert_eq!(
        first.evaluate_sample(&sample).unwrap(),
        second.evaluate_sample(&sample).unwrap()
    );
}

#[test]
fn test_corrupt_checkpoint_falls_back_to_bootstrap() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileModelStore::new(dir.path()).unwrap();
    store.save(OUTLIER_MODEL_KEY, b"not a checkpoint").unwrap();

    let engine = DiagnosticEngine::bootstrap(&fast_config(), Some(&store), None).unwrap();
    let sample = TelemetrySample::new("pump-3", 11.0, 5.5, 2.5, 25.0);
    assert!(engine.evaluate_sample(&sample).is_ok());

    // The refit replaced the bad bytes
    let bytes = store.load(OUTLIER_MODEL_KEY).unwrap().unwrap();
    assert_ne!(bytes, b"not a checkpoint");
}

#[test]
fn test_retrain_is_persisted_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(FileModelStore::new(dir.path()).unwrap());
    let (worker, handle) = PersistenceWorker::spawn(store.clone()).unwrap();

    let engine =
        DiagnosticEngine::bootstrap(&fast_config(), Some(&*store), Some(handle)).unwrap();
    let before = store.load(OUTLIER_MODEL_KEY).unwrap().unwrap();

    let rows: Vec<Vec<f64>> = (0..60)
        .map(|i| {
            let t = i as f64;
            vec![20.0 + t % 9.0, 3.0 + (t % 5.0) * 0.3, 1.0 + (t % 4.0) * 0.2, 18.0 + t % 7.0]
        })
        .collect();
    assert!(engine.retrain_outlier_model(&rows));

    drop(engine);
    worker.join();

    let after = store.load(OUTLIER_MODEL_KEY).unwrap().unwrap();
    assert_ne!(before, after);
}

#[test]
fn test_leak_history_scenario() {
    let engine = DiagnosticEngine::bootstrap(&fast_config(), None, None).unwrap();
    let pressure: Vec<f64> = (0..10).map(|i| 5.0 - i as f64 * 4.0 / 9.0).collect();
    let flow = vec![20.0; 10];

    let result = engine.evaluate_leak_history(&pressure, &flow).unwrap();
    assert!(result.detected);
    assert!(result.confidence <= 1.0);

    let short = engine.evaluate_leak_history(&pressure[..9], &flow).unwrap();
    assert!(!short.detected);
    assert_eq!(short.confidence, 0.0);
}

#[test]
fn test_maintenance_confidence_independent_of_outcome() {
    let engine = DiagnosticEngine::bootstrap(&fast_config(), None, None).unwrap();
    for n in [30usize, 55, 100, 180] {
        let history: Vec<HistoricalRecord> = (0..n)
            .map(|i| HistoricalRecord::new(15.0 + (i % 3) as f64, 4.0, 1.5, 24.0, i % 2 == 0))
            .collect();
        let result = engine.evaluate_maintenance(&history).unwrap();
        let expected = (n as f64 / 100.0).min(1.0);
        assert!((result.confidence - expected).abs() < 1e-12);
        assert!(result.days_until_maintenance.is_some());
    }
}

#[test]
fn test_cold_start_flags_pressure_collapse() {
    let engine = DiagnosticEngine::bootstrap(&EngineConfig::default(), None, None).unwrap();
    let sample = TelemetrySample::new("node-7", 10.0, 1.2, 2.0, 25.0);

    let result = engine.evaluate_sample(&sample).unwrap();
    assert!(result.detected);
    assert_eq!(result.anomaly_type, Some(AnomalyType::PressureAnomaly));
    assert_eq!(result.severity, Severity::High);
    assert!(result.leak_details.is_some());
    assert!(result.contamination_details.is_none());
}

#[test]
fn test_cold_start_flags_turbid_water_as_contamination() {
    let engine = DiagnosticEngine::bootstrap(&EngineConfig::default(), None, None).unwrap();
    let sample = TelemetrySample::new("node-7", 11.0, 5.5, 12.0, 25.0);

    let result = engine.evaluate_sample(&sample).unwrap();
    assert!(result.detected);
    assert_eq!(result.anomaly_type, Some(AnomalyType::Contamination));
    assert_eq!(result.severity, Severity::Critical);
    let details = result.contamination_details.unwrap();
    assert!(details.detected);
    assert_eq!(details.severity, Severity::Critical);
    assert_eq!(details.confidence, 0.95);
    assert!(result.leak_details.is_none());
}

#[test]
fn test_cold_start_passes_mid_envelope_readings() {
    let engine = DiagnosticEngine::bootstrap(&EngineConfig::default(), None, None).unwrap();
    for (flow, pressure, turbidity, temperature) in [(20.0, 4.0, 1.0, 22.0), (30.0, 6.0, 2.0, 20.0)] {
        let sample = TelemetrySample::new("node-7", flow, pressure, turbidity, temperature);
        let result = engine.evaluate_sample(&sample).unwrap();
        assert!(!result.detected, "{sample:?} flagged as {:?}", result.anomaly_type);
        assert_eq!(result.severity, Severity::Low);
        assert!(result.leak_details.is_none());
    }
}

#[test]
fn test_degenerate_retrain_leaves_detection_intact() {
    let engine = DiagnosticEngine::bootstrap(&fast_config(), None, None).unwrap();
    assert!(!engine.retrain_outlier_model(&[vec![1.0, 2.0, 3.0, 4.0]]));

    let sample = TelemetrySample::new("node-7", 10.0, 1.2, 2.0, 25.0);
    let result = engine.evaluate_sample(&sample).unwrap();
    assert_eq!(result.anomaly_type, Some(AnomalyType::PressureAnomaly));
}
