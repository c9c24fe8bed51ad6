//! Recon Schema
//!
//! The canonical model every reconciled issue is normalized into.
//!
//! # Core Concepts
//!
//! - [`GridSchema`]: validated Columns × Rows × Cells table
//! - [`Cell`]: value plus behaviour (`static` / `input` / `formula`) and binding
//! - [`IssueTemplate`]: master definition of an issue type
//! - [`CellValue`] / [`Variables`]: values and the variable namespace
//! - [`SchemaHash`]: Blake3 hash over template structure
//!
//! # Example
//!
//! ```rust
//! use recon_schema::{Cell, Column, GridSchema, Row};
//!
//! let grid = GridSchema::new(
//!     vec![Column::label_column("desc", "Description"), Column::new("cgst", "CGST")],
//!     vec![Row::new("row0")
//!         .with_cell("desc", Cell::label("Tax"))
//!         .with_cell("cgst", Cell::bound_input("tax_cgst"))],
//! )
//! .unwrap();
//! assert_eq!(grid.column_labels(), ["Description", "CGST"]);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod canonical;
mod grid;
mod hash;
mod template;
mod value;

pub use canonical::canonical_json;
pub use grid::{
    generic_column_id, parse_generic_column_id, Cell, CellKind, CellStyle, Column, GridSchema,
    Provenance, Row, RowPolicy, RowRole, SchemaError, TaxHead,
};
pub use hash::{HashError, SchemaHash};
pub use template::{
    CalcLogic, Derivation, IssueTemplate, NarrativeSection, NarrativeSections, TaxDemandMapping,
};
pub use value::{CellValue, Variables};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
