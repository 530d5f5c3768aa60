//! jal-gateway: HTTP front for the diagnostic engine.
//!
//! Environment: `HOST`, `PORT` (default 5000), `MODEL_DIR` (default `models`),
//! `JAL_CONFIG` (optional engine config JSON), `RUST_LOG`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jalrakshak_core::{
    checkpoint::{FileModelStore, PersistenceWorker},
    config::{EngineConfig, GatewayConfig},
    engine::DiagnosticEngine,
    gateway::{self, AppState, GatewayMetrics},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let gateway_config = GatewayConfig::from_env();
    info!("Initializing Jalrakshak diagnostic gateway");

    let engine_config = match &gateway_config.config_path {
        Some(path) => {
            info!(path = %path.display(), "Loading engine config");
            EngineConfig::from_json_file(path)?
        }
        None => EngineConfig::default(),
    };

    let store = Arc::new(FileModelStore::new(&gateway_config.model_dir)?);
    info!(model_dir = %store.dir().display(), "Model store ready");

    let (persistence, persist_handle) = PersistenceWorker::spawn(Arc::clone(&store))?;

    // Model fitting is blocking work; run it before the runtime starts serving
    let engine = {
        let store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || {
            DiagnosticEngine::bootstrap(&engine_config, Some(&*store), Some(persist_handle))
        })
        .await??
    };
    let state = AppState {
        engine: Arc::new(engine),
        metrics: Arc::new(GatewayMetrics::new()?),
    };

    let app = gateway::router(state.clone());

    let addr = gateway_config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "Gateway listening.");
    info!("Endpoints:");
    info!("  POST /analyze                      - Single sample diagnosis");
    info!("  POST /detect-leak                  - Leak detection from history");
    info!("  POST /localize-leak                - Multi-sensor leak localization");
    info!("  POST /detect-contamination-pattern - Turbidity spike/trend analysis");
    info!("  POST /predict-maintenance          - Maintenance estimate");
    info!("  POST /retrain                      - Refit outlier model");
    info!("  GET  /metrics                      - Prometheus metrics");
    info!("  GET  /health                       - Health check");
    info!("  GET  /stats                        - Model stats");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            info!("Shutting down...");
        })
        .await?;

    // Releases the last persistence handle so the worker can drain and exit
    drop(state);
    persistence.join();
    info!("Checkpoints flushed. Goodbye.");
    Ok(())
}
