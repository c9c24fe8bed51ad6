//! Recon Core
//!
//! Turns persisted stage snapshots of case issues into live issues bound to
//! the current master templates.
//!
//! # Core Concepts
//!
//! - [`Reconciler`]: normalize → resolve identity → merge onto master →
//!   recompute formulas and totals
//! - [`IdentityResolver`]: explicit id, fragment id, reference point,
//!   deterministic surrogate; stale surrogates self-correct
//! - [`IssueInstance`]: the live issue; built only through
//!   [`IssueInstance::construct`], edited through [`IssueInstance::apply_edit`]
//! - [`Locks`]: pure `(origin, stage)` edit policy
//! - [`CaseIssues`]: batch hydration with a single totals notification
//! - [`MasterStore`]: read-only master lookup, [`InMemoryMasterStore`] on `dashmap`
//!
//! # Example
//!
//! ```rust
//! use recon_core::{EngineConfig, InMemoryMasterStore, Reconciler, WorkflowStage};
//! use recon_schema::{Cell, Column, GridSchema, IssueTemplate, Row};
//! use serde_json::json;
//!
//! let grid = GridSchema::new(
//!     vec![Column::label_column("desc", "Description"), Column::new("cgst", "CGST")],
//!     vec![Row::new("row0")
//!         .with_cell("desc", Cell::label("Tax"))
//!         .with_cell("cgst", Cell::bound_input("tax_cgst"))],
//! )
//! .unwrap();
//! let store = InMemoryMasterStore::new()
//!     .with_master(Some(1), IssueTemplate::new("GST-1", "Short payment").with_grid(grid));
//!
//! let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
//! let issue = reconciler
//!     .hydrate_json(&json!({"origin": "ASMT10", "sop_point": 1, "grid_data": [["Tax", 90]]}), WorkflowStage::Draft)
//!     .unwrap();
//! assert_eq!(issue.issue_id(), "GST-1");
//! assert_eq!(issue.locked_headers(), ["Description", "CGST"]);
//! assert!(issue.locks().lock_structure);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod hydrate;
mod identity;
mod instance;
mod lock;
mod observer;
mod reconcile;
mod store;

pub use config::{ConfigError, EngineConfig, IdentityConfig};
pub use error::{EditError, ReconcileError};
pub use hydrate::{CaseIssues, HydrationReport, SkippedRecord};
pub use identity::{IdentityResolver, IdentitySource, Resolution};
pub use instance::{CellChange, Edit, EditOutcome, InstanceSpec, IssueInstance};
pub use lock::{LifecycleStage, LockKind, Locks, WorkflowStage};
pub use observer::{NoopObserver, RenderAdapter, TotalsObserver};
pub use reconcile::Reconciler;
pub use store::{InMemoryMasterStore, MasterStore};

pub use recon_formula::DemandTotals;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use recon_schema::{Cell, CellValue, Column, GridSchema, IssueTemplate, Row, TaxDemandMapping};
    use serde_json::json;

    struct Capture(Vec<(Vec<String>, Locks)>);

    impl RenderAdapter for Capture {
        fn render(&mut self, grid: &GridSchema, locked_headers: &[String], locks: Locks) {
            assert_eq!(grid.columns().len(), locked_headers.len());
            self.0.push((locked_headers.to_vec(), locks));
        }
    }

    #[test]
    fn hydrate_edit_resave_round_trip() {
        let grid = GridSchema::new(
            vec![Column::label_column("desc", "Description"), Column::new("amt", "Amount")],
            vec![Row::new("row0")
                .with_cell("desc", Cell::label("Tax"))
                .with_cell("amt", Cell::bound_input("tax"))],
        )
        .unwrap();
        let store = InMemoryMasterStore::new().with_master(
            None,
            IssueTemplate::new("GST-1", "Short payment")
                .with_grid(grid)
                .with_demand_mapping(TaxDemandMapping {
                    tax: vec!["tax".into()],
                    ..TaxDemandMapping::default()
                }),
        );
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let mut issue = reconciler
            .hydrate_json(&json!({"issue_id": "GST-1", "origin": "MANUAL", "grid_data": [["Tax", 10]]}), WorkflowStage::Draft)
            .unwrap();

        issue
            .apply_edit(
                Edit::SetCell {
                    row: "row0".into(),
                    column: "amt".into(),
                    value: CellValue::Number(25.0),
                },
                &mut NoopObserver,
            )
            .unwrap();
        let reloaded = reconciler.hydrate(&issue.to_snapshot(), WorkflowStage::View).unwrap();
        assert_eq!(reloaded.variables()["tax"], CellValue::Number(25.0));
        assert_eq!(reloaded.totals(), issue.totals());

        let mut capture = Capture(Vec::new());
        reloaded.render(&mut capture);
        assert_eq!(capture.0, vec![(vec!["Description".to_string(), "Amount".to_string()], Locks::ALL)]);
    }
}
