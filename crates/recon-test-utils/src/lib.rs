//! Testing utilities for the reconciliation workspace
//!
//! Shared master templates, sample snapshots and recording collaborators.

#![allow(missing_docs)]

use recon_core::{DemandTotals, InMemoryMasterStore, Locks, RenderAdapter, TotalsObserver};
use recon_schema::{
    Cell, Column, Derivation, GridSchema, IssueTemplate, Row, RowPolicy, RowRole,
    TaxDemandMapping, TaxHead,
};
use serde_json::{json, Value};

pub const SHORT_PAYMENT_ID: &str = "SOP-01";
pub const INVOICE_LIST_ID: &str = "SOP-04";
pub const NARRATIVE_ID: &str = "SOP-09";

const HEADS: [(&str, &str, TaxHead); 4] = [
    ("igst", "IGST", TaxHead::Igst),
    ("cgst", "CGST", TaxHead::Cgst),
    ("sgst", "SGST", TaxHead::Sgst),
    ("cess", "Cess", TaxHead::Cess),
];

pub fn gst_columns() -> Vec<Column> {
    let mut columns = vec![Column::label_column("desc", "Description")];
    columns.extend(HEADS.iter().map(|(id, label, head)| Column::new(*id, *label).with_tax_head(*head)));
    columns
}

fn input_row(id: &str, label: &str, prefix: &str) -> Row {
    HEADS.iter().fold(Row::new(id).with_cell("desc", Cell::label(label)), |row, (head, _, _)| {
        row.with_cell(*head, Cell::bound_input(format!("{prefix}_{head}")))
    })
}

/// Five-column short payment master: liability, paid, formula difference
pub fn gst_master() -> IssueTemplate {
    let difference = HEADS.iter().fold(
        Row::new("row2")
            .with_role(RowRole::Difference)
            .with_cell("desc", Cell::label("Difference")),
        |row, (head, _, _)| {
            row.with_cell(
                *head,
                Cell::formula(format!("diff_{head}"), format!("max(liab_{head} - paid_{head}, 0)")),
            )
        },
    );
    let grid = GridSchema::new(
        gst_columns(),
        vec![
            input_row("row0", "Tax liability as per return", "liab"),
            input_row("row1", "Tax paid", "paid"),
            difference,
        ],
    )
    .unwrap();
    IssueTemplate::new(SHORT_PAYMENT_ID, "Short payment of tax")
        .with_grid(grid)
        .with_variable("interest_rate", 18.0)
        .with_calc_logic(vec![Derivation::new(
            "interest",
            "round((diff_igst + diff_cgst + diff_sgst + diff_cess) * interest_rate / 100, 2)",
        )])
        .with_demand_mapping(TaxDemandMapping {
            tax: HEADS.iter().map(|(head, _, _)| format!("diff_{head}")).collect(),
            interest: vec!["interest".into()],
            penalty: Vec::new(),
        })
}

/// Dynamic invoice list; new rows clone the first
pub fn invoice_master() -> IssueTemplate {
    let grid = GridSchema::new(
        gst_columns(),
        vec![input_row("row0", "Invoice", "row0")],
    )
    .unwrap()
    .with_row_policy(RowPolicy::Dynamic);
    IssueTemplate::new(INVOICE_LIST_ID, "Ineligible ITC on invoices").with_grid(grid)
}

/// Narrative-only master
pub fn narrative_master() -> IssueTemplate {
    IssueTemplate::new(NARRATIVE_ID, "Non-filing of returns").with_narrative_only(true)
}

/// Store with all fixture masters, reference points 1, 4 and 9
pub fn master_store() -> InMemoryMasterStore {
    InMemoryMasterStore::new()
        .with_master(Some(1), gst_master())
        .with_master(Some(4), invoice_master())
        .with_master(Some(9), narrative_master())
}

/// The fixture masters as a masters file document
pub fn masters_json() -> Value {
    let entry = |point: u64, template: IssueTemplate| {
        let mut value = serde_json::to_value(template).unwrap();
        value["sop_point"] = json!(point);
        value
    };
    json!([
        entry(1, gst_master()),
        entry(4, invoice_master()),
        entry(9, narrative_master())
    ])
}

/// Pre-notice intimation record with only a scalar list
pub fn asmt10_legacy_snapshot() -> Value {
    json!({
        "origin": "ASMT10",
        "sop_point": 1,
        "grid_data": [{"value": 100}]
    })
}

/// Scrutiny record with a header/row summary block
pub fn scrutiny_table_snapshot() -> Value {
    json!({
        "origin": "SCRUTINY",
        "sop_point": 1,
        "summary_table": {
            "headers": ["Description", "IGST", "CGST"],
            "rows": [
                ["Tax liability as per return", 0, 5000],
                ["Tax paid", 0, 3000]
            ]
        }
    })
}

/// Notice-native record in canonical form, addressed by id
pub fn canonical_snapshot(liability: f64, paid: f64) -> Value {
    json!({
        "issue_id": SHORT_PAYMENT_ID,
        "origin": "SCN",
        "status": "draft",
        "variables": {"liab_cgst": liability, "paid_cgst": paid}
    })
}

/// Records every notification
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub issue: Vec<(String, DemandTotals)>,
    pub case: Vec<(String, DemandTotals)>,
}

impl TotalsObserver for RecordingObserver {
    fn issue_totals_changed(&mut self, issue_id: &str, totals: &DemandTotals) {
        self.issue.push((issue_id.to_string(), *totals));
    }

    fn case_totals_changed(&mut self, case_id: &str, totals: &DemandTotals) {
        self.case.push((case_id.to_string(), *totals));
    }
}

/// Records every render call
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: Vec<(GridSchema, Vec<String>, Locks)>,
}

impl RenderAdapter for RecordingRenderer {
    fn render(&mut self, grid: &GridSchema, locked_headers: &[String], locks: Locks) {
        self.frames.push((grid.clone(), locked_headers.to_vec(), locks));
    }
}
