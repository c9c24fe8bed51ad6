//! Merge errors

use recon_normalize::NormalizeError;
use recon_schema::SchemaError;

/// Fatal merge failures
///
/// Unmatched values are not errors; they are reported as
/// [`MergeAmbiguity`](crate::MergeAmbiguity) drops.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// Snapshot grid payload could not be normalized
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Growing the live grid broke a schema invariant
    #[error("merged grid invalid: {0}")]
    Schema(#[from] SchemaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_sources() {
        let err: MergeError = SchemaError::DuplicateRow("row1".into()).into();
        assert_eq!(err.to_string(), "merged grid invalid: duplicate row id: row1");
        let err: MergeError = NormalizeError::malformed("x").into();
        assert_eq!(err.to_string(), "malformed grid shape: x");
    }
}
