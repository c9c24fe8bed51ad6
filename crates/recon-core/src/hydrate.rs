//! Batch hydration of a case's issues

use recon_formula::DemandTotals;
use recon_normalize::Snapshot;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{EditError, ReconcileError};
use crate::instance::{Edit, EditOutcome, IssueInstance};
use crate::lock::WorkflowStage;
use crate::observer::{NoopObserver, TotalsObserver};
use crate::reconcile::Reconciler;

/// A record left out of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    /// Position in the batch
    pub index: usize,
    /// Stored id, if the record had one
    pub issue_id: Option<String>,
    /// Why it was skipped
    pub reason: String,
    /// Construction-time invariant violation
    pub fatal: bool,
}

/// Outcome of [`CaseIssues::hydrate`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HydrationReport {
    /// Issues added to the case
    pub loaded: usize,
    /// Records skipped, in batch order
    pub skipped: Vec<SkippedRecord>,
    /// The case was already initialized; nothing was done
    pub already_initialized: bool,
    /// Case totals after the batch
    pub totals: DemandTotals,
}

/// The live issues of one case
#[derive(Debug, Clone)]
pub struct CaseIssues {
    case_id: String,
    issues: Vec<IssueInstance>,
    totals: DemandTotals,
    initialized: bool,
}

impl CaseIssues {
    pub fn new(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            issues: Vec::new(),
            totals: DemandTotals::default(),
            initialized: false,
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn issues(&self) -> &[IssueInstance] {
        &self.issues
    }

    pub fn get(&self, issue_id: &str) -> Option<&IssueInstance> {
        self.issues.iter().find(|i| i.issue_id() == issue_id)
    }

    pub fn totals(&self) -> DemandTotals {
        self.totals
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Hydrate every record, once
    ///
    /// Broken records are skipped with a logged reason. Case totals are
    /// recomputed and `observer` notified exactly once, after the last
    /// record. A second call on an initialized case does nothing.
    pub fn hydrate(
        &mut self,
        reconciler: &Reconciler<'_>,
        records: &[Value],
        stage: WorkflowStage,
        observer: &mut dyn TotalsObserver,
    ) -> HydrationReport {
        if self.initialized {
            info!(case_id = %self.case_id, "case already hydrated");
            return HydrationReport {
                already_initialized: true,
                totals: self.totals,
                ..HydrationReport::default()
            };
        }

        let mut report = HydrationReport::default();
        for (index, raw) in records.iter().enumerate() {
            match reconciler.hydrate_json(raw, stage) {
                Ok(issue) => {
                    self.issues.push(issue);
                    report.loaded += 1;
                }
                Err(error) => report.skipped.push(skip(index, raw, &error)),
            }
        }
        self.initialized = true;

        self.recompute_totals();
        report.totals = self.totals;
        observer.case_totals_changed(&self.case_id, &self.totals);
        info!(
            case_id = %self.case_id,
            loaded = report.loaded,
            skipped = report.skipped.len(),
            tax = self.totals.tax,
            "hydrated case issues"
        );
        report
    }

    /// Apply `edit` to one issue, then notify the case totals once
    ///
    /// # Errors
    /// [`EditError::UnknownIssue`] when no issue has `issue_id`; otherwise
    /// whatever the issue rejects the edit with.
    pub fn apply_edit(
        &mut self,
        issue_id: &str,
        edit: Edit,
        observer: &mut dyn TotalsObserver,
    ) -> Result<EditOutcome, EditError> {
        let issue = self
            .issues
            .iter_mut()
            .find(|i| i.issue_id() == issue_id)
            .ok_or_else(|| EditError::UnknownIssue(issue_id.to_string()))?;
        let outcome = issue.apply_edit(edit, &mut NoopObserver)?;
        if outcome.notified {
            self.recompute_totals();
            observer.case_totals_changed(&self.case_id, &self.totals);
        }
        Ok(outcome)
    }

    /// Persisted form of every issue
    pub fn to_snapshots(&self) -> Vec<Snapshot> {
        self.issues.iter().map(IssueInstance::to_snapshot).collect()
    }

    fn recompute_totals(&mut self) {
        self.totals = self.issues.iter().map(IssueInstance::totals).sum();
    }
}

fn skip(index: usize, raw: &Value, error: &ReconcileError) -> SkippedRecord {
    let issue_id = raw.get("issue_id").and_then(Value::as_str).map(str::to_string);
    warn!(index, issue_id = ?issue_id, %error, fatal = error.is_fatal(), "skipped snapshot record");
    SkippedRecord {
        index,
        issue_id,
        reason: error.to_string(),
        fatal: error.is_fatal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::InMemoryMasterStore;
    use recon_schema::{Cell, CellValue, Column, GridSchema, IssueTemplate, Row, TaxDemandMapping};
    use serde_json::json;

    #[derive(Default)]
    struct CaseRecorder(Vec<DemandTotals>);

    impl TotalsObserver for CaseRecorder {
        fn issue_totals_changed(&mut self, _issue_id: &str, _totals: &DemandTotals) {}

        fn case_totals_changed(&mut self, _case_id: &str, totals: &DemandTotals) {
            self.0.push(*totals);
        }
    }

    fn store() -> InMemoryMasterStore {
        let grid = GridSchema::new(
            vec![Column::label_column("desc", "Description"), Column::new("amt", "Amount")],
            vec![Row::new("row0")
                .with_cell("desc", Cell::label("Tax"))
                .with_cell("amt", Cell::bound_input("tax"))],
        )
        .unwrap();
        InMemoryMasterStore::new().with_master(
            None,
            IssueTemplate::new("GST-1", "Short payment")
                .with_grid(grid)
                .with_demand_mapping(TaxDemandMapping {
                    tax: vec!["tax".into()],
                    ..TaxDemandMapping::default()
                }),
        )
    }

    #[test]
    fn batch_skips_broken_records_and_notifies_once() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let records = vec![
            json!({"issue_id": "GST-1", "grid_data": [["Tax", 100]]}),
            json!("not a record"),
            json!({"issue_id": "GST-404"}),
            json!({"issue_id": "GST-1", "variables": {"tax": 50}}),
        ];
        let mut case = CaseIssues::new("CASE-1");
        let mut observer = CaseRecorder::default();
        let report = case.hydrate(&reconciler, &records, WorkflowStage::Draft, &mut observer);

        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].index, 1);
        assert!(!report.skipped[0].fatal);
        assert_eq!(report.skipped[1].issue_id.as_deref(), Some("GST-404"));
        assert!(report.skipped[1].fatal);
        assert_eq!(case.totals().tax, 150.0);
        assert_eq!(observer.0, vec![case.totals()]);
    }

    #[test]
    fn second_hydration_is_a_no_op() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let records = vec![json!({"issue_id": "GST-1", "grid_data": [["Tax", 100]]})];
        let mut case = CaseIssues::new("CASE-2");
        let mut observer = CaseRecorder::default();
        case.hydrate(&reconciler, &records, WorkflowStage::Draft, &mut observer);
        let again = case.hydrate(&reconciler, &records, WorkflowStage::Draft, &mut observer);

        assert!(again.already_initialized);
        assert_eq!(again.loaded, 0);
        assert_eq!(case.issues().len(), 1);
        assert_eq!(observer.0.len(), 1);
    }

    #[test]
    fn case_edit_refreshes_case_totals() {
        let store = store();
        let reconciler = Reconciler::new(EngineConfig::default(), &store).unwrap();
        let mut case = CaseIssues::new("CASE-3");
        case.hydrate(
            &reconciler,
            &[json!({"issue_id": "GST-1", "grid_data": [["Tax", 100]]})],
            WorkflowStage::Draft,
            &mut NoopObserver,
        );
        let mut observer = CaseRecorder::default();
        case.apply_edit(
            "GST-1",
            Edit::SetCell {
                row: "row0".into(),
                column: "amt".into(),
                value: CellValue::Number(70.0),
            },
            &mut observer,
        )
        .unwrap();
        assert_eq!(case.totals().tax, 70.0);
        assert_eq!(observer.0.len(), 1);
        assert!(case.apply_edit("GST-9", Edit::AppendRow, &mut observer).is_err());
        assert_eq!(case.to_snapshots().len(), 1);
    }
}
