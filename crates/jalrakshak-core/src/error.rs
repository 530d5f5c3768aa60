//! Error types crossing the core boundary.
//!
//! Every fallible core operation returns [`DetectionError`]. The boundary maps
//! it to a user-facing response; the core itself knows nothing about HTTP.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DetectionError>;

/// The single failure type surfaced by the detection core.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// A numeric input violated the finite / non-negative contract.
    #[error("invalid input for `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Training rows were rejected; the previously fitted model is untouched.
    #[error("retrain rejected: {0}")]
    Retrain(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("internal detection failure: {0}")]
    Internal(String),
}

impl DetectionError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the caller supplied bad data (as opposed to an internal fault).
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::Retrain(_))
    }
}

/// Errors raised while encoding, decoding or storing model checkpoints.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("unsupported checkpoint version: {found} (max supported: {max_supported})")]
    UnsupportedVersion { found: u32, max_supported: u32 },

    #[error("checkpoint kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    #[error("checksum mismatch: expected {expected:#018x}, computed {computed:#018x}")]
    ChecksumMismatch { expected: u64, computed: u64 },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
