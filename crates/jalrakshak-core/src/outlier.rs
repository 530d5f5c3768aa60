//! Shared outlier model: a [`StandardScaler`] feeding an [`IsolationForest`].
//!
//! The fitted pair is an immutable snapshot behind an `RwLock<Arc<_>>`.
//! Scorers clone the `Arc` under a short read lock; retrain fits a complete
//! replacement outside the lock and swaps it in with one write, so a reader
//! sees either the old or the new model and never a mix.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::algo::{ForestParams, IsolationForest, StandardScaler};
use crate::checkpoint::{self, OUTLIER_MODEL_KEY, PersistHandle};
use crate::error::{DetectionError, Result};
use crate::signal::OutlierVerdict;
use crate::telemetry::{FEATURE_NAMES, NUM_FEATURES, ensure_finite};

/// Anything that can turn a feature vector into an outlier verdict.
///
/// Implemented by [`OutlierModel`]; the classifier only depends on this.
pub trait OutlierScorer: Send + Sync {
    fn score(&self, features: &[f64; NUM_FEATURES]) -> Result<OutlierVerdict>;
}

/// Scaler and forest fitted together on the same rows.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FittedOutlier {
    scaler: StandardScaler,
    forest: IsolationForest,
}

impl FittedOutlier {
    pub fn fit(rows: &[Vec<f64>], params: &ForestParams) -> Result<Self> {
        let dims = crate::algo::scaler::validate_rows(rows)?;
        if dims != NUM_FEATURES {
            return Err(DetectionError::Retrain(format!(
                "expected {NUM_FEATURES} features per row, got {dims}"
            )));
        }
        let scaler = StandardScaler::fit(rows)?;
        let normalized = scaler.transform_all(rows)?;
        let forest = IsolationForest::fit(&normalized, params)?;
        Ok(Self { scaler, forest })
    }

    fn verdict(&self, features: &[f64; NUM_FEATURES]) -> Result<OutlierVerdict> {
        let normalized = self.scaler.transform(features)?;
        let (anomaly_score, is_outlier) = self.forest.predict(&normalized)?;
        Ok(OutlierVerdict {
            is_outlier,
            anomaly_score,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.forest.threshold()
    }

    pub fn stats(&self) -> ModelStats {
        let (trees, sample_size) = self.forest.get_stats();
        ModelStats {
            trees,
            sample_size,
            contamination: self.forest.contamination(),
            threshold: self.forest.threshold(),
        }
    }
}

/// Shape of the forest currently serving verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelStats {
    pub trees: usize,
    pub sample_size: usize,
    pub contamination: f64,
    pub threshold: f64,
}

pub const BOOTSTRAP_ROWS: usize = 512;
const BOOTSTRAP_SEED: u64 = 7;

/// Per feature: (mean, sigma, lower, upper). The bounds are the normal
/// operating envelope; draws outside it are redrawn.
const NOMINAL: [(f64, f64, f64, f64); NUM_FEATURES] = [
    (25.0, 8.0, 5.0, 50.0),
    (5.0, 1.2, 2.0, 8.0),
    (2.0, 1.0, 0.0, 5.0),
    (25.0, 3.5, 15.0, 35.0),
];

/// Reference sample of normal operation used when no checkpoint exists.
///
/// Gaussian around a nominal operating point, truncated to the envelope
/// (flow 5–50 L/min, pressure 2–8 bar, turbidity 0–5 NTU, temperature
/// 15–35 °C). Seeded, so the fit is reproducible.
pub fn bootstrap_rows() -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(BOOTSTRAP_SEED);
    (0..BOOTSTRAP_ROWS)
        .map(|_| {
            NOMINAL
                .iter()
                .map(|&(mean, sigma, lo, hi)| truncated_draw(&mut rng, mean, sigma, lo, hi))
                .collect()
        })
        .collect()
}

fn truncated_draw(rng: &mut StdRng, mean: f64, sigma: f64, lo: f64, hi: f64) -> f64 {
    let Ok(dist) = Normal::new(mean, sigma) else {
        return mean.clamp(lo, hi);
    };
    // Bounds sit at 2σ or more, so a handful of tries almost always lands
    for _ in 0..32 {
        let v = dist.sample(rng);
        if (lo..=hi).contains(&v) {
            return v;
        }
    }
    mean.clamp(lo, hi)
}

pub struct OutlierModel {
    params: ForestParams,
    state: RwLock<Arc<FittedOutlier>>,
    persist: Option<PersistHandle>,
}

impl OutlierModel {
    pub fn from_fitted(fitted: FittedOutlier, params: ForestParams) -> Self {
        Self {
            params,
            state: RwLock::new(Arc::new(fitted)),
            persist: None,
        }
    }

    /// Fit on [`bootstrap_rows`].
    pub fn bootstrap(params: ForestParams) -> Result<Self> {
        let rows = bootstrap_rows();
        let fitted = FittedOutlier::fit(&rows, &params)?;
        info!(rows = rows.len(), threshold = fitted.threshold(), "Outlier model bootstrapped");
        Ok(Self::from_fitted(fitted, params))
    }

    /// Restore from checkpoint bytes written by [`Self::checkpoint`].
    pub fn from_checkpoint(bytes: &[u8], params: ForestParams) -> Result<Self> {
        let fitted: FittedOutlier = checkpoint::decode(OUTLIER_MODEL_KEY, bytes)?;
        Ok(Self::from_fitted(fitted, params))
    }

    /// Queue a checkpoint after every successful retrain.
    pub fn with_persistence(mut self, handle: PersistHandle) -> Self {
        self.persist = Some(handle);
        self
    }

    fn snapshot(&self) -> Arc<FittedOutlier> {
        // Swaps are a single pointer store, so a poisoned lock still holds a whole model
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn checkpoint(&self) -> Result<Vec<u8>> {
        Ok(checkpoint::encode(OUTLIER_MODEL_KEY, self.snapshot().as_ref())?)
    }

    /// Refit from scratch on `rows` and swap the result in.
    ///
    /// On error the current model is left untouched. A failed checkpoint write
    /// is logged but does not fail the retrain.
    pub fn update(&self, rows: &[Vec<f64>]) -> Result<()> {
        let fitted = match FittedOutlier::fit(rows, &self.params) {
            Ok(fitted) => Arc::new(fitted),
            Err(e) => {
                warn!(rows = rows.len(), error = %e, "Outlier retrain rejected");
                return Err(e);
            }
        };

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&fitted);
        info!(rows = rows.len(), threshold = fitted.threshold(), "Outlier model retrained");

        if let Some(handle) = &self.persist {
            let queued = checkpoint::encode(OUTLIER_MODEL_KEY, fitted.as_ref())
                .and_then(|bytes| handle.submit(OUTLIER_MODEL_KEY, bytes));
            if let Err(e) = queued {
                warn!(error = %e, "Outlier checkpoint not queued");
            }
        }
        Ok(())
    }

    /// Configured params; used for the next retrain.
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Stats of the fitted model, which may differ from [`Self::params`]
    /// after a checkpoint restore.
    pub fn stats(&self) -> ModelStats {
        self.snapshot().stats()
    }
}

impl OutlierScorer for OutlierModel {
    fn score(&self, features: &[f64; NUM_FEATURES]) -> Result<OutlierVerdict> {
        for (name, value) in FEATURE_NAMES.into_iter().zip(features) {
            ensure_finite(name, *value)?;
        }
        let verdict = self.snapshot().verdict(features)?;
        debug!(score = verdict.anomaly_score, outlier = verdict.is_outlier, "Outlier verdict");
        Ok(verdict)
    }
}
