//! Error types for the normalizer

use recon_schema::SchemaError;

/// Errors converting raw grid data into the canonical schema
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    /// Raw data matches none of the recognized shapes
    #[error("malformed grid shape: {reason}")]
    MalformedShape {
        /// What was found instead
        reason: String,
    },

    /// Snapshot record could not be read
    #[error("invalid snapshot record: {reason}")]
    InvalidSnapshot {
        /// Parse failure
        reason: String,
    },

    /// The converted grid still violates a schema invariant
    #[error("schema invariant violated: {0}")]
    Schema(#[from] SchemaError),
}

impl NormalizeError {
    /// Create malformed-shape error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedShape {
            reason: reason.into(),
        }
    }

    /// Create invalid-snapshot error
    pub fn invalid_snapshot(reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            reason: reason.into(),
        }
    }
}
