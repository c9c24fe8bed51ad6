//! Recon Normalize
//!
//! Turns stored grid payloads of any era into the canonical
//! [`GridSchema`](recon_schema::GridSchema), and defines the persisted
//! [`Snapshot`] record those payloads arrive in.
//!
//! # Core Concepts
//!
//! - [`RawGrid`]: classified raw payload (canonical, header/rows, flat rows, scalars)
//! - [`Normalizer`]: `RawGrid` → `GridSchema`, with a [`Repair`] log
//! - [`HeaderClassifier`]: pluggable column-role inference for legacy headers
//! - [`Snapshot`]: stage snapshot record with grid payload precedence
//!
//! # Example
//!
//! ```rust
//! use recon_normalize::Normalizer;
//! use serde_json::json;
//!
//! let grid = Normalizer::default()
//!     .normalize(&json!([["Description", "CGST"], ["Taxable Supply", 5000]]))
//!     .unwrap();
//! assert_eq!(grid.column_labels(), ["Description", "CGST"]);
//! assert_eq!(grid.rows().len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod classify;
mod error;
mod normalize;
mod raw;
mod snapshot;

pub use classify::{ColumnRole, HeaderClassifier, KeywordClassifier};
pub use error::NormalizeError;
pub use normalize::{NormalizeConfig, Normalized, Normalizer, Repair};
pub use raw::{RawGrid, ShapeKind};
pub use snapshot::{GridSource, Origin, OriginKind, Snapshot, TemplateFragment};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
