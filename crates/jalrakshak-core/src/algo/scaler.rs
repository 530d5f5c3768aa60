//! Per-feature standardization (zero mean, unit variance).

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};
use crate::stats;

/// Feature-wise location/scale fitted from a reference dataset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fits column means and population standard deviations.
    ///
    /// A constant column gets scale 1.0 so it passes through centred but
    /// unscaled.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let dims = validate_rows(rows)?;

        let mut mean = Vec::with_capacity(dims);
        let mut scale = Vec::with_capacity(dims);
        let mut column = Vec::with_capacity(rows.len());
        for d in 0..dims {
            column.clear();
            column.extend(rows.iter().map(|r| r[d]));
            mean.push(stats::mean(&column));
            let std = stats::std_dev(&column);
            scale.push(if std < 1e-12 { 1.0 } else { std });
        }

        Ok(Self { mean, scale })
    }

    pub fn dimensions(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dimensions() {
            return Err(DetectionError::invalid(
                "features",
                format!("expected {} features, got {}", self.dimensions(), row.len()),
            ));
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

/// Checks a training matrix is non-empty, rectangular and finite.
///
/// Returns the column count.
pub fn validate_rows(rows: &[Vec<f64>]) -> Result<usize> {
    let first = rows
        .first()
        .ok_or_else(|| DetectionError::Retrain("training rows are empty".into()))?;
    let dims = first.len();
    if dims == 0 {
        return Err(DetectionError::Retrain("training rows have no features".into()));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != dims {
            return Err(DetectionError::Retrain(format!(
                "ragged training rows: row {i} has {} features, expected {dims}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::Retrain(format!(
                "row {i} contains a non-finite value"
            )));
        }
    }
    Ok(dims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();

        let t = scaler.transform(&[3.0, 12.0]).unwrap();
        assert!((t[0] - 1.0).abs() < 1e-9);
        // constant column: centred, scale 1
        assert!((t[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_rows() {
        assert!(matches!(StandardScaler::fit(&[]), Err(DetectionError::Retrain(_))));
        let ragged = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(matches!(StandardScaler::fit(&ragged), Err(DetectionError::Retrain(_))));
        let nan = vec![vec![1.0, f64::NAN]];
        assert!(matches!(StandardScaler::fit(&nan), Err(DetectionError::Retrain(_))));
    }

    #[test]
    fn test_transform_dimension_mismatch() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert!(scaler.transform(&[1.0]).is_err());
    }
}
