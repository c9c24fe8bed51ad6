//! Snapshot → live instance
//!
//! The [`Reconciler`] runs one snapshot through normalization, identity
//! resolution, the master merge and formula recomputation. It holds no
//! mutable state and never writes to the master store.

use chrono::Utc;
use recon_formula::FormulaEngine;
use recon_merge::{MergeEngine, SnapshotValues};
use recon_normalize::{Normalizer, Origin, Snapshot};
use recon_schema::{IssueTemplate, Provenance};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::error::ReconcileError;
use crate::identity::{IdentityResolver, Resolution};
use crate::instance::{InstanceSpec, IssueInstance};
use crate::lock::{LifecycleStage, WorkflowStage};
use crate::store::MasterStore;

/// Rebuilds live issues from snapshots against a master store
pub struct Reconciler<'a> {
    config: EngineConfig,
    store: &'a dyn MasterStore,
    normalizer: Normalizer,
    resolver: IdentityResolver,
    formulas: FormulaEngine,
}

impl std::fmt::Debug for Reconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] when `config` fails validation.
    pub fn new(config: EngineConfig, store: &'a dyn MasterStore) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            normalizer: Normalizer::new(config.normalize.clone()),
            resolver: IdentityResolver::new(config.identity.clone())?,
            formulas: FormulaEngine::new(config.formula.clone()),
            config,
            store,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Identity of `snapshot`, without building anything
    pub fn resolve(&self, snapshot: &Snapshot) -> Resolution {
        self.resolver.resolve(snapshot, self.store)
    }

    /// Parse a raw record and hydrate it
    ///
    /// # Errors
    /// See [`hydrate`](Self::hydrate); an unreadable record is
    /// [`NormalizeError::InvalidSnapshot`](recon_normalize::NormalizeError::InvalidSnapshot).
    pub fn hydrate_json(&self, raw: &Value, stage: WorkflowStage) -> Result<IssueInstance, ReconcileError> {
        let snapshot = Snapshot::from_json(raw)?;
        self.hydrate(&snapshot, stage)
    }

    /// Rebuild the live issue stored in `snapshot`
    ///
    /// The master found under the resolved id supplies structure; the
    /// snapshot supplies values only. Without a master the normalized
    /// snapshot grid becomes the structure.
    ///
    /// # Errors
    /// - [`ReconcileError::Normalize`] / [`ReconcileError::Merge`] for an
    ///   unrecognizable grid payload
    /// - [`ReconcileError::EmptyIssue`] when the result has no grid and is
    ///   not narrative-only
    pub fn hydrate(&self, snapshot: &Snapshot, stage: WorkflowStage) -> Result<IssueInstance, ReconcileError> {
        let resolution = self.resolve(snapshot);
        let values = SnapshotValues::from_snapshot(snapshot, &self.normalizer)?;

        let (master, values) = match self.store.get(&resolution.issue_id) {
            Some(master) => (master, values),
            None => {
                debug!(issue_id = %resolution.issue_id, "no master; using snapshot structure");
                let master = ad_hoc_master(&resolution, snapshot, &values);
                (master, values.aligned_to_body())
            }
        };

        let mut merge = MergeEngine::new();
        if self.config.stamp_provenance {
            merge = merge.with_provenance(Provenance {
                origin_stage: snapshot.origin.as_str().to_string(),
                source_case_id: None,
                converted_at: Some(Utc::now()),
            });
        }
        let merged = merge.merge(&master, &values)?;
        if !merged.report.is_clean() {
            warn!(
                issue_id = %resolution.issue_id,
                dropped = merged.report.dropped.len(),
                "snapshot values did not fit the master"
            );
        }

        let mut template = merged.template;
        template.narrative_only |= snapshot.narrative_only();

        let mut structure_version = snapshot.structure_version.unwrap_or(0);
        let current_hash = template.compute_schema_hash().to_string();
        if let Some(stored) = snapshot.template_schema_hash.as_deref() {
            if stored != current_hash {
                structure_version += 1;
                info!(
                    issue_id = %resolution.issue_id,
                    structure_version,
                    "master structure changed since snapshot was saved"
                );
            }
        }

        let spec = InstanceSpec {
            template,
            variables: merged.variables,
            origin: snapshot.origin.clone(),
            status: snapshot.status.clone(),
            sop_point: snapshot.sop_point,
            lifecycle: LifecycleStage::Hydrating,
            stage,
            resolution,
            baseline: merged.baseline,
            structure_version,
            merge_report: merged.report,
        };
        let instance = IssueInstance::construct(spec, &self.formulas)?;
        debug!(
            issue_id = %instance.issue_id(),
            source = %instance.resolution().source,
            corrected = instance.resolution().corrected,
            tax = instance.totals().tax,
            "hydrated issue"
        );
        Ok(instance)
    }

    /// Fresh issue from the master `issue_id`, values zeroed
    ///
    /// # Errors
    /// [`ReconcileError::UnknownMaster`] when the store has no such master;
    /// [`ReconcileError::EmptyIssue`] for a master with neither grid nor
    /// narrative-only flag.
    pub fn create_new(
        &self,
        issue_id: &str,
        origin: Origin,
        stage: WorkflowStage,
    ) -> Result<IssueInstance, ReconcileError> {
        let mut template = self
            .store
            .get(issue_id)
            .ok_or_else(|| ReconcileError::UnknownMaster(issue_id.to_string()))?;
        if let Some(grid) = template.grid.as_mut() {
            grid.clear_values();
        }
        IssueInstance::construct(InstanceSpec::fresh(template, origin, stage), &self.formulas)
    }
}

/// Structure for an issue whose master is unknown: the snapshot's own grid
fn ad_hoc_master(resolution: &Resolution, snapshot: &Snapshot, values: &SnapshotValues) -> IssueTemplate {
    let mut template = IssueTemplate::new(
        resolution.issue_id.clone(),
        snapshot.issue_name().unwrap_or_default(),
    )
    .with_narrative_only(snapshot.narrative_only());
    template.grid = values.grid.clone();
    template
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMasterStore;
    use pretty_assertions::assert_eq;
    use recon_schema::{Cell, CellValue, Column, GridSchema, Row, TaxDemandMapping};
    use serde_json::json;

    fn store() -> InMemoryMasterStore {
        let grid = GridSchema::new(
            vec![
                Column::label_column("desc", "Description"),
                Column::new("cgst", "CGST"),
                Column::new("sgst", "SGST"),
            ],
            vec![Row::new("row0")
                .with_cell("desc", Cell::label("Short paid"))
                .with_cell("cgst", Cell::bound_input("tax_cgst"))
                .with_cell("sgst", Cell::bound_input("tax_sgst"))],
        )
        .unwrap();
        InMemoryMasterStore::new().with_master(
            Some(3),
            IssueTemplate::new("GST-3", "Short payment")
                .with_grid(grid)
                .with_variable("interest", 12.5)
                .with_demand_mapping(TaxDemandMapping {
                    tax: vec!["tax_cgst".into(), "tax_sgst".into()],
                    interest: vec!["interest".into()],
                    penalty: Vec::new(),
                }),
        )
    }

    #[test]
    fn hydrates_against_master() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let issue = reconciler
            .hydrate_json(
                &json!({"issue_id": "GST-3", "grid_data": [["Short paid", 100, 80]]}),
                WorkflowStage::Draft,
            )
            .unwrap();

        assert_eq!(issue.locked_headers(), ["Description", "CGST", "SGST"]);
        assert_eq!(issue.totals().tax, 180.0);
        assert_eq!(issue.totals().interest, 12.5);
        assert_eq!(issue.lifecycle(), LifecycleStage::Hydrating);
        let cell = issue.grid().unwrap().cell(0, "cgst").unwrap();
        assert_eq!(cell.provenance.as_ref().unwrap().origin_stage, "SCN");
    }

    #[test]
    fn unknown_master_keeps_snapshot_structure() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let issue = reconciler
            .hydrate_json(
                &json!({"origin": "MANUAL", "template": {"issue_name": "Ad hoc"},
                        "summary_table": {"headers": ["Head", "Amount"], "rows": [["Tax", 40]]}}),
                WorkflowStage::Draft,
            )
            .unwrap();
        assert!(reconciler.resolver().is_surrogate(issue.issue_id()));
        assert_eq!(issue.locked_headers(), ["Head", "Amount"]);
        assert_eq!(issue.template().issue_name, "Ad hoc");
    }

    #[test]
    fn nothing_to_show_is_fatal() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let err = reconciler.hydrate_json(&json!({"issue_id": "GST-77"}), WorkflowStage::Draft).unwrap_err();
        assert!(err.is_fatal());

        let issue = reconciler
            .hydrate_json(
                &json!({"issue_id": "GST-77", "template": {"narrative_only": true}}),
                WorkflowStage::Draft,
            )
            .unwrap();
        assert!(issue.grid().is_none());
    }

    #[test]
    fn create_new_zeroes_values() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let issue = reconciler.create_new("GST-3", Origin::Manual, WorkflowStage::Draft).unwrap();
        assert_eq!(issue.lifecycle(), LifecycleStage::ConstructingNew);
        assert_eq!(issue.variables()["tax_cgst"], CellValue::zero());
        assert_eq!(issue.totals().tax, 0.0);
        assert!(matches!(
            reconciler.create_new("GST-404", Origin::Manual, WorkflowStage::Draft),
            Err(ReconcileError::UnknownMaster(_))
        ));
    }

    #[test]
    fn stale_schema_hash_bumps_structure_version() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let issue = reconciler
            .hydrate_json(
                &json!({"issue_id": "GST-3", "grid_data": [["x", 1, 2]],
                        "template_schema_hash": "00", "structure_version": 4}),
                WorkflowStage::Draft,
            )
            .unwrap();
        assert_eq!(issue.structure_version(), 5);

        let resaved = reconciler
            .hydrate(&issue.to_snapshot(), WorkflowStage::Draft)
            .unwrap();
        assert_eq!(resaved.structure_version(), 5);
    }

    #[test]
    fn invalid_config_rejected() {
        let store = store();
        let config = EngineConfig::default().with_formula(recon_formula::FormulaConfig::default().with_passes(0));
        assert!(Reconciler::new(config, &store).is_err());
    }
}
