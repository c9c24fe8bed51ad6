//! Live issue instances and the edit pipeline
//!
//! An [`IssueInstance`] owns a private copy of its master template, the
//! resolved variable namespace and the demand totals derived from them.
//! The only way to obtain one is [`IssueInstance::construct`], which enforces
//! that every issue has a grid or declares itself narrative-only.
//!
//! Edits run as one synchronous pipeline:
//! cell update → formula recompute → totals recompute → single notification.

use recon_formula::{DemandTotals, FormulaEngine, FormulaFailure, TotalsSource};
use recon_merge::{clone_prototype, MergeReport};
use recon_normalize::{Origin, Snapshot, TemplateFragment};
use recon_schema::{
    CellKind, CellValue, GridSchema, IssueTemplate, NarrativeSection, RowPolicy, Variables,
};
use serde::Serialize;
use serde_json::Map;
use tracing::{debug, error, info};

use crate::error::{EditError, ReconcileError};
use crate::identity::{IdentitySource, Resolution};
use crate::lock::{LifecycleStage, LockKind, Locks, WorkflowStage};
use crate::observer::{RenderAdapter, TotalsObserver};

/// Everything needed to construct an instance
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    /// Private copy of the master, values merged in
    pub template: IssueTemplate,
    /// Resolved namespace before recomputation
    pub variables: Variables,
    pub origin: Origin,
    pub status: String,
    pub sop_point: Option<u64>,
    pub lifecycle: LifecycleStage,
    pub stage: WorkflowStage,
    /// How the id was decided; its id overrides the template's
    pub resolution: Resolution,
    /// Frozen reference grid
    pub baseline: Option<GridSchema>,
    pub structure_version: u64,
    /// Bookkeeping of the merge that produced `template`
    pub merge_report: MergeReport,
}

impl InstanceSpec {
    /// Spec for a fresh issue from `template`, explicitly identified
    ///
    /// Bound input cells seed the namespace, blanks as zero.
    pub fn fresh(template: IssueTemplate, origin: Origin, stage: WorkflowStage) -> Self {
        let mut variables = template.variables.clone();
        if let Some(grid) = &template.grid {
            for (_, _, cell) in grid.bound_cells().filter(|(_, _, cell)| !cell.is_formula()) {
                if let Some(var) = &cell.var {
                    variables.entry(var.clone()).or_insert_with(|| {
                        if cell.value.is_blank() {
                            CellValue::zero()
                        } else {
                            cell.value.clone()
                        }
                    });
                }
            }
        }
        let resolution = Resolution {
            issue_id: template.issue_id.clone(),
            source: IdentitySource::Explicit,
            corrected: false,
        };
        Self {
            variables,
            template,
            origin,
            status: String::new(),
            sop_point: None,
            lifecycle: LifecycleStage::ConstructingNew,
            stage,
            resolution,
            baseline: None,
            structure_version: 0,
            merge_report: MergeReport::default(),
        }
    }
}

/// An edit to a live issue
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace the value of an input cell
    SetCell {
        row: String,
        column: String,
        value: CellValue,
    },
    /// Replace one narrative block
    SetNarrative { section: NarrativeSection, text: String },
    /// Grow a dynamic grid by one prototype row
    AppendRow,
    /// Move the issue to another id
    RebindIdentity { issue_id: String },
}

impl Edit {
    /// Lock that guards this edit
    #[must_use]
    pub fn lock(&self) -> LockKind {
        match self {
            Self::SetCell { .. } | Self::AppendRow => LockKind::Structure,
            Self::SetNarrative { .. } => LockKind::Content,
            Self::RebindIdentity { .. } => LockKind::Identity,
        }
    }

    /// Short name for logs and errors
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetCell { .. } => "cell edit",
            Self::SetNarrative { .. } => "narrative edit",
            Self::AppendRow => "row append",
            Self::RebindIdentity { .. } => "identity rebind",
        }
    }
}

/// Result of a successful edit
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    /// Formulas that kept their prior value during the recompute
    pub failures: Vec<FormulaFailure>,
    /// Totals after the edit
    pub totals: DemandTotals,
    /// Whether the observer was notified
    pub notified: bool,
}

/// A cell whose value moved away from the baseline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellChange {
    pub row: String,
    pub column: String,
    pub baseline: CellValue,
    pub current: CellValue,
}

/// A live, master-bound issue
#[derive(Debug, Clone)]
pub struct IssueInstance {
    template: IssueTemplate,
    variables: Variables,
    origin: Origin,
    status: String,
    sop_point: Option<u64>,
    lifecycle: LifecycleStage,
    stage: WorkflowStage,
    resolution: Resolution,
    baseline: Option<GridSchema>,
    structure_version: u64,
    locked_headers: Vec<String>,
    totals: DemandTotals,
    totals_source: TotalsSource,
    formula_failures: Vec<FormulaFailure>,
    merge_report: MergeReport,
    formulas: FormulaEngine,
}

impl IssueInstance {
    /// Build an instance, recomputing formulas and totals
    ///
    /// # Errors
    /// [`ReconcileError::EmptyIssue`] when the template has no grid rows and
    /// is not narrative-only.
    pub fn construct(spec: InstanceSpec, formulas: &FormulaEngine) -> Result<Self, ReconcileError> {
        let InstanceSpec {
            mut template,
            mut variables,
            origin,
            status,
            sop_point,
            lifecycle,
            stage,
            resolution,
            baseline,
            structure_version,
            merge_report,
        } = spec;

        template.issue_id.clone_from(&resolution.issue_id);
        if !template.has_grid() && !template.narrative_only {
            error!(issue_id = %template.issue_id, %origin, "FATAL: issue has neither grid nor narrative-only flag");
            return Err(ReconcileError::EmptyIssue {
                issue_id: template.issue_id,
            });
        }

        let formula_failures = formulas.apply(&mut template, &mut variables);
        let (totals, totals_source) = formulas.totals(&template, &variables);
        template.refresh_schema_hash();

        Ok(Self {
            locked_headers: template.column_labels(),
            template,
            variables,
            origin,
            status,
            sop_point,
            lifecycle,
            stage,
            resolution,
            baseline,
            structure_version,
            totals,
            totals_source,
            formula_failures,
            merge_report,
            formulas: formulas.clone(),
        })
    }

    #[inline]
    pub fn issue_id(&self) -> &str {
        &self.template.issue_id
    }

    #[inline]
    pub fn template(&self) -> &IssueTemplate {
        &self.template
    }

    #[inline]
    pub fn grid(&self) -> Option<&GridSchema> {
        self.template.grid.as_ref()
    }

    #[inline]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    #[inline]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    #[inline]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[inline]
    pub fn lifecycle(&self) -> LifecycleStage {
        self.lifecycle
    }

    #[inline]
    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    /// Move the issue to another workflow stage
    pub fn set_stage(&mut self, stage: WorkflowStage) {
        self.stage = stage;
    }

    #[inline]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Master column labels; never taken from snapshot headers
    #[inline]
    pub fn locked_headers(&self) -> &[String] {
        &self.locked_headers
    }

    #[inline]
    pub fn totals(&self) -> DemandTotals {
        self.totals
    }

    #[inline]
    pub fn totals_source(&self) -> &TotalsSource {
        &self.totals_source
    }

    /// Failures of the latest recompute
    #[inline]
    pub fn formula_failures(&self) -> &[FormulaFailure] {
        &self.formula_failures
    }

    #[inline]
    pub fn merge_report(&self) -> &MergeReport {
        &self.merge_report
    }

    #[inline]
    pub fn baseline(&self) -> Option<&GridSchema> {
        self.baseline.as_ref()
    }

    /// Structural edits applied since the issue was first saved
    #[inline]
    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }

    /// Locks in force, recomputed on every call
    #[must_use]
    pub fn locks(&self) -> Locks {
        Locks::for_issue(&self.origin, self.stage)
    }

    /// Cells whose value differs from the baseline grid
    #[must_use]
    pub fn changes_since_baseline(&self) -> Vec<CellChange> {
        let (Some(baseline), Some(grid)) = (&self.baseline, &self.template.grid) else {
            return Vec::new();
        };
        baseline
            .rows()
            .iter()
            .zip(grid.rows())
            .flat_map(|(before, after)| {
                before.cells.iter().filter_map(move |(column, cell)| {
                    let current = after.cell(column)?;
                    (current.value != cell.value).then(|| CellChange {
                        row: after.id.clone(),
                        column: column.clone(),
                        baseline: cell.value.clone(),
                        current: current.value.clone(),
                    })
                })
            })
            .collect()
    }

    /// Hand the grid and locks to a renderer; narrative-only issues render nothing
    pub fn render(&self, adapter: &mut dyn RenderAdapter) {
        if let Some(grid) = &self.template.grid {
            adapter.render(grid, &self.locked_headers, self.locks());
        }
    }

    /// Apply `edit`, then recompute and notify where figures can change
    ///
    /// # Errors
    /// [`EditError::Locked`] when the guarding lock is held; the other
    /// variants when the edit does not fit the grid. A rejected edit leaves
    /// the instance untouched.
    pub fn apply_edit(
        &mut self,
        edit: Edit,
        observer: &mut dyn TotalsObserver,
    ) -> Result<EditOutcome, EditError> {
        let lock = edit.lock();
        if self.locks().is_locked(lock) {
            debug!(issue_id = %self.issue_id(), edit = edit.name(), %lock, "edit rejected by lock");
            return Err(EditError::Locked {
                lock,
                edit: edit.name(),
            });
        }

        match edit {
            Edit::SetCell { row, column, value } => self.set_cell(&row, &column, value)?,
            Edit::AppendRow => self.append_row()?,
            Edit::SetNarrative { section, text } => {
                self.template.narrative.set(section, text);
                return Ok(self.unchanged_outcome());
            }
            Edit::RebindIdentity { issue_id } => {
                let issue_id = issue_id.trim();
                if issue_id.is_empty() {
                    return Err(EditError::BlankIdentity);
                }
                info!(from = %self.issue_id(), to = issue_id, "rebound issue identity");
                self.template.issue_id = issue_id.to_string();
                self.resolution = Resolution {
                    issue_id: issue_id.to_string(),
                    source: IdentitySource::Explicit,
                    corrected: false,
                };
                return Ok(self.unchanged_outcome());
            }
        }

        self.recompute_formulas();
        self.recompute_totals();
        observer.issue_totals_changed(self.issue_id(), &self.totals);
        Ok(EditOutcome {
            failures: self.formula_failures.clone(),
            totals: self.totals,
            notified: true,
        })
    }

    fn unchanged_outcome(&self) -> EditOutcome {
        EditOutcome {
            failures: Vec::new(),
            totals: self.totals,
            notified: false,
        }
    }

    fn set_cell(&mut self, row: &str, column: &str, value: CellValue) -> Result<(), EditError> {
        let grid = self.template.grid.as_mut().ok_or(EditError::NoGrid)?;
        let unknown = || EditError::UnknownCell {
            row: row.to_string(),
            column: column.to_string(),
        };
        let row_index = grid.row_index(row).ok_or_else(unknown)?;
        let cell = grid.cell_mut(row_index, column).ok_or_else(unknown)?;
        if cell.kind != CellKind::Input {
            return Err(EditError::ReadOnlyCell {
                row: row.to_string(),
                column: column.to_string(),
                kind: cell.kind,
            });
        }
        if let Some(var) = &cell.var {
            self.variables.insert(var.clone(), value.clone());
        }
        cell.value = value;
        Ok(())
    }

    fn append_row(&mut self) -> Result<(), EditError> {
        let grid = self.template.grid.as_mut().ok_or(EditError::NoGrid)?;
        if grid.row_policy() != RowPolicy::Dynamic {
            return Err(EditError::FixedRows);
        }
        let prototype = grid.rows().first().ok_or(EditError::NoGrid)?;
        let id = grid.next_row_id();
        let row = clone_prototype(prototype, &id);
        for cell in row.cells.values() {
            if let Some(var) = &cell.var {
                self.variables.entry(var.clone()).or_insert_with(|| cell.value.clone());
            }
        }
        grid.push_row(row)?;
        self.structure_version += 1;
        self.template.refresh_schema_hash();
        debug!(issue_id = %self.template.issue_id, row = %id, version = self.structure_version, "appended row");
        Ok(())
    }

    fn recompute_formulas(&mut self) {
        self.formula_failures = self.formulas.apply(&mut self.template, &mut self.variables);
    }

    fn recompute_totals(&mut self) {
        let (totals, source) = self.formulas.totals(&self.template, &self.variables);
        self.totals = totals;
        self.totals_source = source;
    }

    /// Persisted form: canonical grid, schema hash and structure version
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        let variables: Map<String, serde_json::Value> = self
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Snapshot {
            issue_id: Some(self.template.issue_id.clone()),
            origin: self.origin.clone(),
            status: self.status.clone(),
            sop_point: self.sop_point,
            template: Some(TemplateFragment {
                issue_id: Some(self.template.issue_id.clone()),
                issue_name: Some(self.template.issue_name.clone()).filter(|n| !n.is_empty()),
                grid_data: None,
                narrative: Some(self.template.narrative.clone()),
                narrative_only: self.template.narrative_only,
            }),
            grid_data: self.grid().and_then(|g| serde_json::to_value(g).ok()),
            table_data: None,
            summary_table: None,
            baseline_grid_data: self.baseline.as_ref().and_then(|g| serde_json::to_value(g).ok()),
            variables: Some(variables),
            template_schema_hash: Some(self.template.compute_schema_hash().to_string()),
            structure_version: Some(self.structure_version),
        }
    }
}
