//! What a merge kept, grew and dropped

use std::fmt;

use recon_schema::CellValue;

/// Why a snapshot value was not adopted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No master column by id, nor by generic position
    UnmatchedColumn,
    /// Row beyond the master's rows under a fixed row policy
    RowOverflow,
    /// Master declares no grid
    NoMasterGrid,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnmatchedColumn => "no matching master column",
            Self::RowOverflow => "row beyond fixed master rows",
            Self::NoMasterGrid => "master has no grid",
        })
    }
}

/// A snapshot value that could not be placed
#[derive(Debug, Clone, PartialEq)]
pub struct MergeAmbiguity {
    /// Snapshot row index
    pub row: usize,
    /// Snapshot column id
    pub column: String,
    /// The dropped value
    pub value: CellValue,
    /// Why
    pub reason: DropReason,
}

impl fmt::Display for MergeAmbiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dropped {:?} at row {} column {}: {}",
            self.value.to_string(),
            self.row,
            self.column,
            self.reason
        )
    }
}

/// Merge bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// Values copied into master cells
    pub adopted: usize,
    /// Values not copied because the master cell is a formula or a label
    pub protected: usize,
    /// Ids of rows cloned from the prototype row
    pub cloned_rows: Vec<String>,
    /// Snapshot variables overlaid on master defaults
    pub variables_overlaid: usize,
    /// Values that could not be placed
    pub dropped: Vec<MergeAmbiguity>,
}

impl MergeReport {
    /// Nothing dropped
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}
