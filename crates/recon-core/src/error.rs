//! Error types for reconciliation and live edits

use recon_merge::MergeError;
use recon_normalize::NormalizeError;
use recon_schema::{CellKind, SchemaError};

use crate::lock::LockKind;

/// Errors that abort reconciling one issue
///
/// A batch never aborts on these; the failing record is skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    /// Snapshot record or grid payload unreadable
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Merge onto the master failed
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Issue would have neither a grid nor a narrative-only declaration
    #[error("FATAL: issue {issue_id} has no grid and is not narrative-only")]
    EmptyIssue {
        /// Resolved id of the rejected issue
        issue_id: String,
    },

    /// No master template for a fresh issue
    #[error("no master template for issue {0}")]
    UnknownMaster(String),
}

impl ReconcileError {
    /// Construction-time invariant violations
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::EmptyIssue { .. } => true,
            Self::Normalize(err) | Self::Merge(MergeError::Normalize(err)) => {
                matches!(err, NormalizeError::MalformedShape { .. })
            }
            Self::Merge(MergeError::Schema(_)) | Self::UnknownMaster(_) => false,
        }
    }
}

/// Errors applying an edit to a live issue
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    /// The lock guarding this edit is held
    #[error("{edit} rejected: {lock} is locked")]
    Locked {
        /// Lock that rejected the edit
        lock: LockKind,
        /// Edit kind
        edit: &'static str,
    },

    /// No issue with this id in the case
    #[error("no issue {0} in case")]
    UnknownIssue(String),

    /// No such row or column
    #[error("no cell at row {row} column {column}")]
    UnknownCell { row: String, column: String },

    /// Labels and formula results are not editable
    #[error("cell at row {row} column {column} is {kind:?}, not input")]
    ReadOnlyCell {
        row: String,
        column: String,
        kind: CellKind,
    },

    /// Issue has no grid to edit
    #[error("issue has no grid")]
    NoGrid,

    /// Fixed-row grids cannot grow
    #[error("grid rows are fixed")]
    FixedRows,

    /// Rebinding to a blank id
    #[error("issue id must not be blank")]
    BlankIdentity,

    /// Growing the grid broke an invariant
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
