//! Outward collaborators: rendering and totals notification

use recon_formula::DemandTotals;
use recon_schema::GridSchema;

use crate::lock::Locks;

/// Receives the grid of an issue together with the locks in force
pub trait RenderAdapter {
    /// Draw `grid`; `locked_headers` are the master column labels
    fn render(&mut self, grid: &GridSchema, locked_headers: &[String], locks: Locks);
}

/// Notified once per edit or once per hydrated batch
pub trait TotalsObserver {
    /// Totals of one issue after an edit
    fn issue_totals_changed(&mut self, issue_id: &str, totals: &DemandTotals);

    /// Totals of a whole case after a batch or a case-level edit
    fn case_totals_changed(&mut self, case_id: &str, totals: &DemandTotals) {
        let _ = (case_id, totals);
    }
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TotalsObserver for NoopObserver {
    fn issue_totals_changed(&mut self, _issue_id: &str, _totals: &DemandTotals) {}
}
