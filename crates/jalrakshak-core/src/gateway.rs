//! HTTP boundary for the diagnostic engine.
//!
//! Thin axum layer: parse with simd-json, hand typed values to
//! [`DiagnosticEngine`], map [`DetectionError`] to a status code, count things.
//!
//! Routes:
//! - `GET  /health`                        liveness
//! - `GET  /stats`                         model and uptime summary
//! - `GET  /metrics`                       Prometheus text format
//! - `POST /analyze`                       one telemetry sample
//! - `POST /detect-leak`                   pressure/flow history
//! - `POST /localize-leak`                 simultaneous multi-sensor readings
//! - `POST /detect-contamination-pattern`  turbidity/temperature history
//! - `POST /predict-maintenance`           device history
//! - `POST /retrain`                       refit the outlier model

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::engine::DiagnosticEngine;
use crate::error::DetectionError;
use crate::telemetry::{HistoricalRecord, SensorReading, TelemetrySample};

pub const SERVICE_NAME: &str = "jalrakshak-ai";

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

// ============================================================================
// METRICS
// ============================================================================

/// Gateway counters, registered in their own registry.
pub struct GatewayMetrics {
    registry: Registry,
    pub samples_total: IntCounter,
    pub anomalies_total: IntCounter,
    pub leak_requests_total: IntCounter,
    pub maintenance_requests_total: IntCounter,
    /// Labelled `outcome` = `ok` | `rejected`
    pub retrains_total: IntCounterVec,
    pub processing_latency: Histogram,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let samples_total = IntCounter::new("jal_samples_total", "Telemetry samples analysed")?;
        let anomalies_total = IntCounter::new("jal_anomalies_total", "Samples flagged as anomalous")?;
        let leak_requests_total =
            IntCounter::new("jal_leak_requests_total", "Leak history and localization requests")?;
        let maintenance_requests_total =
            IntCounter::new("jal_maintenance_requests_total", "Maintenance predictions requested")?;
        let retrains_total = IntCounterVec::new(
            Opts::new("jal_retrains_total", "Outlier model retrain attempts"),
            &["outcome"],
        )?;
        let processing_latency = Histogram::with_opts(HistogramOpts::new(
            "jal_processing_duration_seconds",
            "Histogram of per-sample evaluation latency",
        ))?;

        registry.register(Box::new(samples_total.clone()))?;
        registry.register(Box::new(anomalies_total.clone()))?;
        registry.register(Box::new(leak_requests_total.clone()))?;
        registry.register(Box::new(maintenance_requests_total.clone()))?;
        registry.register(Box::new(retrains_total.clone()))?;
        registry.register(Box::new(processing_latency.clone()))?;

        Ok(Self {
            registry,
            samples_total,
            anomalies_total,
            leak_requests_total,
            maintenance_requests_total,
            retrains_total,
            processing_latency,
        })
    }

    pub fn render(&self) -> Result<String, ApiError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| ApiError::internal(e.to_string()))
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error body `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(e: DetectionError) -> Self {
        if e.is_input_error() {
            Self::bad_request(e.to_string())
        } else {
            warn!(error = %e, "Detection failed");
            Self::internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// ============================================================================
// SIMD-JSON EXTRACTOR
// ============================================================================

pub struct SimdJson<T>(pub T);

impl<T, S> FromRequest<S> for SimdJson<T>
where
    T: for<'de> Deserialize<'de> + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| e.into_response())?;
        let mut bytes_vec = bytes.to_vec();

        let val = simd_json::from_slice::<T>(&mut bytes_vec)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")).into_response())?;

        Ok(SimdJson(val))
    }
}

// ============================================================================
// DATA TYPES
// ============================================================================

/// `/analyze` body. Missing core readings read as 0.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    pub device_id: String,
    pub flow_rate: f64,
    pub pressure: f64,
    pub turbidity: f64,
    pub temperature: f64,
    pub ph: Option<f64>,
    pub conductivity: Option<f64>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<AnalyzeRequest> for TelemetrySample {
    fn from(r: AnalyzeRequest) -> Self {
        Self {
            device_id: r.device_id,
            flow_rate: r.flow_rate,
            pressure: r.pressure,
            turbidity: r.turbidity,
            temperature: r.temperature,
            ph: r.ph,
            conductivity: r.conductivity,
            gps_lat: r.gps_lat,
            gps_lon: r.gps_lon,
            timestamp: r.timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeakHistoryRequest {
    pub device_id: Option<String>,
    pub pressure_data: Vec<f64>,
    pub flow_data: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LocalizeRequest {
    pub readings: Vec<SensorReading>,
    pub topology: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternRequest {
    pub device_id: Option<String>,
    pub turbidity_data: Vec<f64>,
    pub temperature_data: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MaintenanceRequest {
    pub device_id: Option<String>,
    pub historical_data: Vec<HistoricalRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RetrainRequest {
    pub rows: Vec<Vec<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrainResponse {
    pub success: bool,
}

#[derive(Serialize)]
struct StatsResponse {
    service: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    outlier_trees: usize,
    sample_size: usize,
    contamination: f64,
    threshold: f64,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DiagnosticEngine>,
    pub metrics: Arc<GatewayMetrics>,
}

// ============================================================================
// HANDLERS
// ============================================================================

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": SERVICE_NAME }))
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let model = state.engine.outlier_model().stats();
    Json(StatsResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: STARTED_AT.elapsed().as_secs(),
        outlier_trees: model.trees,
        sample_size: model.sample_size,
        contamination: model.contamination,
        threshold: model.threshold,
    })
}

async fn metrics_handler(State(state): State<AppState>) -> Result<String, ApiError> {
    state.metrics.render()
}

async fn analyze(
    State(state): State<AppState>,
    SimdJson(body): SimdJson<AnalyzeRequest>,
) -> Result<Response, ApiError> {
    state.metrics.samples_total.inc();
    let timer = state.metrics.processing_latency.start_timer();

    let sample = TelemetrySample::from(body);
    let result = state.engine.evaluate_sample(&sample)?;
    timer.observe_duration();

    if result.detected {
        state.metrics.anomalies_total.inc();
    }
    Ok(Json(result).into_response())
}

async fn detect_leak(
    State(state): State<AppState>,
    SimdJson(body): SimdJson<LeakHistoryRequest>,
) -> Result<Response, ApiError> {
    state.metrics.leak_requests_total.inc();
    let result = state
        .engine
        .evaluate_leak_history(&body.pressure_data, &body.flow_data)?;
    if result.detected {
        info!(
            device_id = body.device_id.as_deref().unwrap_or("unknown"),
            confidence = result.confidence,
            "Leak detected from history"
        );
    }
    Ok(Json(result).into_response())
}

async fn localize_leak(
    State(state): State<AppState>,
    SimdJson(body): SimdJson<LocalizeRequest>,
) -> Result<Response, ApiError> {
    state.metrics.leak_requests_total.inc();
    let result = state
        .engine
        .localize_leak(&body.readings, body.topology.as_ref())?;
    Ok(Json(result).into_response())
}

async fn detect_contamination_pattern(
    State(state): State<AppState>,
    SimdJson(body): SimdJson<PatternRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .engine
        .evaluate_contamination_pattern(&body.turbidity_data, &body.temperature_data)?;
    Ok(Json(result).into_response())
}

async fn predict_maintenance(
    State(state): State<AppState>,
    SimdJson(body): SimdJson<MaintenanceRequest>,
) -> Result<Response, ApiError> {
    state.metrics.maintenance_requests_total.inc();
    let result = state.engine.evaluate_maintenance(&body.historical_data)?;
    Ok(Json(result).into_response())
}

async fn retrain(
    State(state): State<AppState>,
    SimdJson(body): SimdJson<RetrainRequest>,
) -> Result<Json<RetrainResponse>, ApiError> {
    let engine = Arc::clone(&state.engine);
    let rows = body.rows.len();
    // Fitting is CPU-bound; keep it off the async workers
    let success = tokio::task::spawn_blocking(move || engine.retrain_outlier_model(&body.rows))
        .await
        .map_err(|e| ApiError::internal(format!("retrain task failed: {e}")))?;

    let outcome = if success { "ok" } else { "rejected" };
    state.metrics.retrains_total.with_label_values(&[outcome]).inc();
    info!(rows, success, "Retrain requested");
    Ok(Json(RetrainResponse { success }))
}

pub fn router(state: AppState) -> Router {
    Lazy::force(&STARTED_AT);
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .route("/analyze", post(analyze))
        .route("/detect-leak", post(detect_leak))
        .route("/localize-leak", post(localize_leak))
        .route("/detect-contamination-pattern", post(detect_contamination_pattern))
        .route("/predict-maintenance", post(predict_maintenance))
        .route("/retrain", post(retrain))
        .with_state(state)
}
