//! Recon Merge
//!
//! Rebuilds a live issue template from the current master and a snapshot's
//! stored values.
//!
//! # Core Concepts
//!
//! - [`MergeEngine`]: deep-copies the master and adopts snapshot values only
//! - [`SnapshotValues`]: the normalized value-bearing parts of a snapshot
//! - [`MergeReport`] / [`MergeAmbiguity`]: adopted, protected and dropped values
//! - Dynamic grids grow by cloning the first master row with re-derived bindings
//!
//! # Example
//!
//! ```rust
//! use recon_merge::{MergeEngine, SnapshotValues};
//! use recon_normalize::Normalizer;
//! use recon_schema::{Cell, CellValue, Column, GridSchema, IssueTemplate, Row};
//! use serde_json::json;
//!
//! let master = IssueTemplate::new("GST-1", "Short payment").with_grid(
//!     GridSchema::new(
//!         vec![Column::label_column("desc", "Description"), Column::new("cgst", "CGST")],
//!         vec![Row::new("row0")
//!             .with_cell("desc", Cell::label("Tax"))
//!             .with_cell("cgst", Cell::bound_input("tax_cgst"))],
//!     )
//!     .unwrap(),
//! );
//! let snapshot = SnapshotValues {
//!     grid: Some(Normalizer::default().normalize(&json!([["Tax", 250]])).unwrap()),
//!     ..SnapshotValues::default()
//! };
//!
//! let merged = MergeEngine::new().merge(&master, &snapshot).unwrap();
//! assert_eq!(merged.variables["tax_cgst"], CellValue::Number(250.0));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod engine;
mod error;
mod rebind;
mod report;

pub use engine::{MergeEngine, Merged, SnapshotValues};
pub use error::MergeError;
pub use rebind::{clone_prototype, rebind_var};
pub use report::{DropReason, MergeAmbiguity, MergeReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use proptest::prelude::*;
    use recon_normalize::{Normalizer, Snapshot};
    use recon_schema::{Cell, CellValue, Column, GridSchema, IssueTemplate, Row};
    use serde_json::{json, Value};

    fn master() -> IssueTemplate {
        IssueTemplate::new("GST-3", "ITC mismatch").with_grid(
            GridSchema::new(
                vec![Column::label_column("desc", "Description"), Column::new("cgst", "CGST")],
                vec![
                    Row::new("row0")
                        .with_cell("desc", Cell::label("Particulars"))
                        .with_cell("cgst", Cell::bound_input("row0_cgst")),
                    Row::new("row1")
                        .with_cell("desc", Cell::label("Taxable value"))
                        .with_cell("cgst", Cell::bound_input("row1_cgst")),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn positional_rows_project_into_master_variable() {
        let snapshot = Snapshot::from_json(&json!({
            "origin": "SCRUTINY",
            "table_data": [["Header Desc", "Header CGST"], ["Taxable Supply", 5000]]
        }))
        .unwrap();
        let values = SnapshotValues::from_snapshot(&snapshot, &Normalizer::default()).unwrap();
        let merged = MergeEngine::new().merge(&master(), &values).unwrap();

        assert_eq!(values.row_offset, 1);
        assert_eq!(merged.variables["row1_cgst"], CellValue::Number(5000.0));
        assert_eq!(merged.variables["row0_cgst"], CellValue::zero());
        assert_eq!(merged.template.column_labels(), ["Description", "CGST"]);
        assert!(merged.report.is_clean());
    }

    #[test]
    fn malformed_grid_is_an_error() {
        let snapshot = Snapshot::from_json(&json!({"grid_data": 17})).unwrap();
        assert!(SnapshotValues::from_snapshot(&snapshot, &Normalizer::default()).is_err());
    }

    proptest! {
        #[test]
        fn merge_never_changes_master_structure(
            rows in prop::collection::vec(prop::collection::vec(-1000i64..1000, 0..5), 1..6)
        ) {
            let raw = Value::Array(rows.into_iter().map(|r| json!(r)).collect());
            let Ok(grid) = Normalizer::default().normalize(&raw) else {
                return Ok(());
            };
            let values = SnapshotValues { grid: Some(grid), ..SnapshotValues::default() };
            let master = master();
            let merged = MergeEngine::new().merge(&master, &values).unwrap();
            let live = merged.template.grid.unwrap();
            let expected = master.grid.unwrap();
            prop_assert_eq!(live.columns(), expected.columns());
            prop_assert_eq!(live.rows().len(), expected.rows().len());
            prop_assert_eq!(live.structure_json(), expected.structure_json());
        }
    }
}
