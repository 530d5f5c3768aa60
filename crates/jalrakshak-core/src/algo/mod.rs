pub mod isolation_forest;
pub mod regression_forest;
pub mod scaler;

// Re-exports for convenience
pub use isolation_forest::{ForestParams, IsolationForest};
pub use regression_forest::{RegressionForest, RegressionParams};
pub use scaler::StandardScaler;
