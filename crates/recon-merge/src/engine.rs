//! Master/snapshot merge
//!
//! The master decides structure: columns, rows, bindings, cell kinds,
//! formulas. The snapshot only ever contributes values. The merge never
//! touches the shared master; it works on a deep copy that the caller owns.

use std::collections::BTreeMap;

use recon_normalize::{Normalizer, Snapshot};
use recon_schema::{
    parse_generic_column_id, CellKind, CellValue, GridSchema, IssueTemplate, NarrativeSections,
    Provenance, RowPolicy, Variables,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::MergeError;
use crate::rebind::clone_prototype;
use crate::report::{DropReason, MergeAmbiguity, MergeReport};

/// The value-bearing parts of a snapshot, normalized
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotValues {
    /// Normalized grid payload
    pub grid: Option<GridSchema>,
    /// Frozen reference grid
    pub baseline: Option<GridSchema>,
    /// Header rows stripped from the grid payload; row `i` of `grid` lines up
    /// with master row `i + row_offset`
    pub row_offset: usize,
    /// Same for `baseline`
    pub baseline_row_offset: usize,
    /// Stored variables, blanks removed
    pub variables: Variables,
    /// Stored narrative
    pub narrative: Option<NarrativeSections>,
}

impl SnapshotValues {
    /// Normalize the payloads of `snapshot`
    ///
    /// A malformed baseline is logged and ignored; a malformed main grid is
    /// an error.
    ///
    /// # Errors
    /// [`MergeError::Normalize`] when the main grid payload is not a recognized shape.
    pub fn from_snapshot(snapshot: &Snapshot, normalizer: &Normalizer) -> Result<Self, MergeError> {
        let grid = match snapshot.raw_grid() {
            Some((payload, source)) => {
                debug!(%source, "normalizing snapshot grid");
                Some(normalizer.normalize_report(payload)?)
            }
            None => None,
        };
        let baseline = snapshot
            .baseline_grid_data
            .as_ref()
            .filter(|v| !v.is_null())
            .and_then(|payload| match normalizer.normalize_report(payload) {
                Ok(normalized) => Some(normalized),
                Err(error) => {
                    warn!(%error, "ignoring unreadable baseline grid");
                    None
                }
            });
        Ok(Self {
            row_offset: grid.as_ref().map_or(0, |n| n.row_offset),
            baseline_row_offset: baseline.as_ref().map_or(0, |n| n.row_offset),
            grid: grid.map(|n| n.grid),
            baseline: baseline.map(|n| n.grid),
            variables: snapshot.variables.as_ref().map(non_blank_values).unwrap_or_default(),
            narrative: snapshot.narrative().filter(|n| !n.is_empty()).cloned(),
        })
    }

    /// Values whose grid is its own structure: rows line up one to one
    #[must_use]
    pub fn aligned_to_body(self) -> Self {
        Self {
            row_offset: 0,
            baseline_row_offset: 0,
            ..self
        }
    }
}

fn non_blank_values(raw: &Map<String, Value>) -> Variables {
    raw.iter()
        .map(|(name, value)| (name.clone(), CellValue::from_json(value)))
        .filter(|(_, value)| !value.is_blank())
        .collect()
}

/// Merge result: a live template owned by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    /// Master structure with snapshot values
    pub template: IssueTemplate,
    /// Resolved variable namespace
    pub variables: Variables,
    /// Baseline merged onto a second copy of the master grid
    pub baseline: Option<GridSchema>,
    /// Bookkeeping
    pub report: MergeReport,
}

/// Merges snapshot values into master structure
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    provenance: Option<Provenance>,
}

impl MergeEngine {
    /// Engine without provenance stamping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every adopted cell with `provenance`
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Merge `snapshot` onto a deep copy of `master`
    ///
    /// # Errors
    /// [`MergeError::Schema`] if growing a dynamic grid breaks an invariant.
    pub fn merge(
        &self,
        master: &IssueTemplate,
        snapshot: &SnapshotValues,
    ) -> Result<Merged, MergeError> {
        let mut template = master.clone();
        let mut report = MergeReport::default();
        let mut adopted_vars = Variables::new();

        match (template.grid.as_mut(), snapshot.grid.as_ref()) {
            (Some(grid), Some(values)) => {
                self.merge_grid(grid, values, snapshot.row_offset, &mut report, &mut adopted_vars)?;
            }
            (None, Some(values)) => {
                for (row_index, row) in values.rows().iter().enumerate() {
                    for (column, cell) in &row.cells {
                        drop_value(&mut report, row_index, column, &cell.value, DropReason::NoMasterGrid);
                    }
                }
            }
            (_, None) => {}
        }

        if let Some(narrative) = &snapshot.narrative {
            template.narrative = narrative.clone();
        }

        let variables = resolve_variables(&mut template, snapshot, adopted_vars, &mut report);

        let baseline = match (master.grid.as_ref(), snapshot.baseline.as_ref()) {
            (Some(master_grid), Some(values)) => {
                let mut grid = master_grid.clone();
                let mut baseline_report = MergeReport::default();
                self.merge_grid(
                    &mut grid,
                    values,
                    snapshot.baseline_row_offset,
                    &mut baseline_report,
                    &mut Variables::new(),
                )?;
                debug!(
                    adopted = baseline_report.adopted,
                    dropped = baseline_report.dropped.len(),
                    "merged baseline grid"
                );
                Some(grid)
            }
            _ => None,
        };

        debug!(
            issue_id = %template.issue_id,
            adopted = report.adopted,
            protected = report.protected,
            cloned = report.cloned_rows.len(),
            dropped = report.dropped.len(),
            "merged snapshot onto master"
        );
        Ok(Merged {
            template,
            variables,
            baseline,
            report,
        })
    }

    fn merge_grid(
        &self,
        grid: &mut GridSchema,
        values: &GridSchema,
        row_offset: usize,
        report: &mut MergeReport,
        adopted_vars: &mut Variables,
    ) -> Result<(), MergeError> {
        for (row_index, snapshot_row) in values.rows().iter().enumerate() {
            let target_row = row_index + row_offset;
            let mut fits = target_row < grid.rows().len();
            while !fits && self.grow(grid, report)? {
                fits = target_row < grid.rows().len();
            }
            if !fits {
                for (column, cell) in &snapshot_row.cells {
                    drop_value(report, row_index, column, &cell.value, DropReason::RowOverflow);
                }
                continue;
            }

            for (position, (column, cell)) in snapshot_row.cells.iter().enumerate() {
                if cell.value.is_blank() {
                    continue;
                }
                let Some(target_column) = match_column(grid, column, position) else {
                    drop_value(report, row_index, column, &cell.value, DropReason::UnmatchedColumn);
                    continue;
                };
                let Some(target) = grid.cell_mut(target_row, &target_column) else {
                    continue;
                };
                let protected = target.kind == CellKind::Formula
                    || (target.kind == CellKind::Static && !target.value.is_blank());
                if protected {
                    report.protected += 1;
                    continue;
                }
                target.value = cell.value.clone();
                if let Some(provenance) = &self.provenance {
                    target.provenance = Some(provenance.clone());
                }
                if let Some(var) = &target.var {
                    adopted_vars.insert(var.clone(), cell.value.clone());
                }
                report.adopted += 1;
            }
        }
        Ok(())
    }

    /// Append a prototype clone; false when the grid may not grow
    fn grow(&self, grid: &mut GridSchema, report: &mut MergeReport) -> Result<bool, MergeError> {
        if grid.row_policy() != RowPolicy::Dynamic {
            return Ok(false);
        }
        let Some(prototype) = grid.rows().first() else {
            return Ok(false);
        };
        let id = grid.next_row_id();
        let row = clone_prototype(prototype, &id);
        grid.push_row(row)?;
        report.cloned_rows.push(id);
        Ok(true)
    }
}

/// Column of the live grid a snapshot column maps to
///
/// Id match first; a generic `col<i>` id falls back to position `i`, and
/// failing that, to the cell's position within the snapshot row.
///
/// The fallback is purely positional. A tax head the normalizer read from
/// legacy header text is not consulted, so a figure under a "CGST" header
/// in position 1 lands in whatever master column sits at position 1 (IGST
/// in the usual desc/IGST/CGST/SGST/Cess layout).
fn match_column(grid: &GridSchema, column: &str, position: usize) -> Option<String> {
    if grid.column_index(column).is_some() {
        return Some(column.to_string());
    }
    let index = parse_generic_column_id(column)?;
    let fallback = if index < grid.columns().len() { index } else { position };
    grid.columns().get(fallback).map(|c| c.id.clone())
}

fn drop_value(
    report: &mut MergeReport,
    row: usize,
    column: &str,
    value: &CellValue,
    reason: DropReason,
) {
    if value.is_blank() {
        return;
    }
    let ambiguity = MergeAmbiguity {
        row,
        column: column.to_string(),
        value: value.clone(),
        reason,
    };
    warn!(%ambiguity, "merge ambiguity");
    report.dropped.push(ambiguity);
}

/// Master defaults, then snapshot variables, then adopted cell values;
/// bound cells missing from all three contribute their master value
fn resolve_variables(
    template: &mut IssueTemplate,
    snapshot: &SnapshotValues,
    adopted: Variables,
    report: &mut MergeReport,
) -> Variables {
    let mut variables = template.variables.clone();
    for (name, value) in &snapshot.variables {
        variables.insert(name.clone(), value.clone());
        report.variables_overlaid += 1;
    }
    variables.extend(adopted);

    if let Some(grid) = template.grid.as_mut() {
        let cell_values: BTreeMap<String, CellValue> = grid
            .bound_cells()
            .filter_map(|(_, _, cell)| Some((cell.var.clone()?, cell.value.clone())))
            .collect();
        for (name, value) in cell_values {
            variables.entry(name).or_insert(value);
        }
        grid.project(&variables);
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recon_schema::{Cell, Column, Row, TaxHead};
    use serde_json::json;

    /// Five columns, master-defined bindings
    fn master() -> IssueTemplate {
        let columns = vec![
            Column::label_column("desc", "Description"),
            Column::new("igst", "IGST").with_tax_head(TaxHead::Igst),
            Column::new("cgst", "CGST").with_tax_head(TaxHead::Cgst),
            Column::new("sgst", "SGST").with_tax_head(TaxHead::Sgst),
            Column::new("cess", "Cess").with_tax_head(TaxHead::Cess),
        ];
        let row = |id: &str, label: &str, prefix: &str| {
            Row::new(id)
                .with_cell("desc", Cell::label(label))
                .with_cell("igst", Cell::bound_input(format!("{prefix}_igst")))
                .with_cell("cgst", Cell::bound_input(format!("{prefix}_cgst")))
                .with_cell("sgst", Cell::bound_input(format!("{prefix}_sgst")))
                .with_cell("cess", Cell::bound_input(format!("{prefix}_cess")))
        };
        let grid = GridSchema::new(
            columns,
            vec![row("row0", "Tax payable", "tax"), row("row1", "Tax paid", "paid")],
        )
        .unwrap();
        IssueTemplate::new("GST-5", "Short payment")
            .with_grid(grid)
            .with_variable("rate", 18.0)
    }

    fn values(raw: Value) -> SnapshotValues {
        let normalized = Normalizer::default().normalize_report(&raw).unwrap();
        SnapshotValues {
            grid: Some(normalized.grid),
            row_offset: normalized.row_offset,
            ..SnapshotValues::default()
        }
    }

    #[test]
    fn narrow_snapshot_keeps_master_structure() {
        let snapshot = values(json!([["Tax payable", 700]]));
        let merged = MergeEngine::new().merge(&master(), &snapshot).unwrap();
        let grid = merged.template.grid.as_ref().unwrap();

        assert_eq!(grid.columns().len(), 5);
        assert_eq!(grid.cell(0, "igst").unwrap().var.as_deref(), Some("tax_igst"));
        // positional: snapshot col1 lands in master column 1
        assert_eq!(grid.cell(0, "igst").unwrap().value, CellValue::Number(700.0));
        assert_eq!(merged.variables["tax_igst"], CellValue::Number(700.0));
        assert_eq!(merged.variables["tax_cgst"], CellValue::zero());
        assert!(grid.bound_cells().all(|(_, _, c)| !c.var.as_deref().unwrap().starts_with("row")));
    }

    #[test]
    fn header_row_keeps_its_place_in_row_alignment() {
        let grid = GridSchema::new(
            vec![Column::label_column("desc", "Description"), Column::new("cgst", "CGST")],
            vec![
                Row::new("row0")
                    .with_cell("desc", Cell::label("Particulars"))
                    .with_cell("cgst", Cell::bound_input("row0_cgst")),
                Row::new("row1")
                    .with_cell("desc", Cell::label("Taxable Supply"))
                    .with_cell("cgst", Cell::bound_input("row1_cgst")),
            ],
        )
        .unwrap();
        let master = IssueTemplate::new("GST-2", "Taxable supply").with_grid(grid);
        let snapshot = values(json!([["Header Desc", "Header CGST"], ["Taxable Supply", 5000]]));
        assert_eq!(snapshot.row_offset, 1);

        let merged = MergeEngine::new().merge(&master, &snapshot).unwrap();
        assert_eq!(merged.variables["row1_cgst"], CellValue::Number(5000.0));
        assert_eq!(merged.variables["row0_cgst"], CellValue::zero());
        assert!(merged.report.is_clean());

        let aligned = MergeEngine::new().merge(&master, &snapshot.aligned_to_body()).unwrap();
        assert_eq!(aligned.variables["row0_cgst"], CellValue::Number(5000.0));
    }

    #[test]
    fn master_is_not_mutated() {
        let master = master();
        let before = master.clone();
        let _ = MergeEngine::new()
            .merge(&master, &values(json!([["x", 1, 2, 3, 4]])))
            .unwrap();
        assert_eq!(master, before);
    }

    #[test]
    fn labels_and_formulas_are_protected() {
        let mut master = master();
        if let Some(cell) = master.grid.as_mut().unwrap().cell_mut(1, "cess") {
            *cell = Cell::formula("paid_cess", "tax_cess");
        }
        let snapshot = values(json!({
            "columns": [{"id": "desc", "label": "D"}, {"id": "cess", "label": "C"}],
            "rows": [
                {"id": "a", "role": "base", "cells": {"desc": "Renamed", "cess": 5}},
                {"id": "b", "role": "base", "cells": {"desc": "", "cess": 9}}
            ]
        }));
        let merged = MergeEngine::new().merge(&master, &snapshot).unwrap();
        let grid = merged.template.grid.as_ref().unwrap();
        assert_eq!(grid.row_label(0).as_deref(), Some("Tax payable"));
        assert_eq!(grid.cell(0, "cess").unwrap().value, CellValue::Number(5.0));
        assert_eq!(grid.cell(1, "cess").unwrap().formula.as_deref(), Some("tax_cess"));
        assert_eq!(merged.report.protected, 2);
    }

    #[test]
    fn unmatched_columns_are_dropped_and_reported() {
        let snapshot = values(json!({
            "columns": [{"id": "desc", "label": "D"}, {"id": "remarks", "label": "R"}],
            "rows": [{"id": "a", "role": "base", "cells": {"desc": "", "remarks": "see annexure"}}]
        }));
        let merged = MergeEngine::new().merge(&master(), &snapshot).unwrap();
        assert_eq!(merged.report.dropped.len(), 1);
        assert_eq!(merged.report.dropped[0].reason, DropReason::UnmatchedColumn);
        assert_eq!(merged.report.dropped[0].column, "remarks");
    }

    #[test]
    fn fixed_grid_drops_extra_rows() {
        let snapshot = values(json!([[1, 2], [3, 4], [5, 6], [7, 8]]));
        let merged = MergeEngine::new().merge(&master(), &snapshot).unwrap();
        assert_eq!(merged.template.grid.as_ref().unwrap().rows().len(), 2);
        assert!(merged
            .report
            .dropped
            .iter()
            .all(|d| d.reason == DropReason::RowOverflow && d.row >= 2));
        assert_eq!(merged.report.dropped.len(), 4);
    }

    #[test]
    fn dynamic_grid_clones_prototype_rows() {
        let mut master = master();
        master.grid = master.grid.map(|g| g.with_row_policy(RowPolicy::Dynamic));
        let snapshot = values(json!([[1, 10], [2, 20], [3, 30]]));
        let merged = MergeEngine::new().merge(&master, &snapshot).unwrap();
        let grid = merged.template.grid.as_ref().unwrap();
        assert_eq!(grid.rows().len(), 3);
        assert_eq!(merged.report.cloned_rows, ["row2"]);
        assert_eq!(grid.cell(2, "igst").unwrap().var.as_deref(), Some("tax_igst_row2"));
        assert_eq!(merged.variables["tax_igst_row2"], CellValue::Number(30.0));
        assert_eq!(grid.row_label(2).as_deref(), Some("Tax payable"));
    }

    #[test]
    fn variables_overlay_skips_blanks() {
        let snapshot = SnapshotValues {
            variables: non_blank_values(
                json!({"rate": null, "tax_cgst": 42, "extra": ""}).as_object().unwrap(),
            ),
            ..SnapshotValues::default()
        };
        let merged = MergeEngine::new().merge(&master(), &snapshot).unwrap();
        assert_eq!(merged.variables["rate"], CellValue::Number(18.0));
        assert_eq!(merged.variables["tax_cgst"], CellValue::Number(42.0));
        assert!(!merged.variables.contains_key("extra"));
        let grid = merged.template.grid.as_ref().unwrap();
        assert_eq!(grid.cell(0, "cgst").unwrap().value, CellValue::Number(42.0));
    }

    #[test]
    fn baseline_merges_onto_its_own_copy() {
        let snapshot = SnapshotValues {
            baseline: Some(Normalizer::default().normalize(&json!([["Tax payable", 50]])).unwrap()),
            ..values(json!([["Tax payable", 80]]))
        };
        let merged = MergeEngine::new().merge(&master(), &snapshot).unwrap();
        let baseline = merged.baseline.unwrap();
        assert_eq!(baseline.cell(0, "igst").unwrap().value, CellValue::Number(50.0));
        let live = merged.template.grid.unwrap();
        assert_eq!(live.cell(0, "igst").unwrap().value, CellValue::Number(80.0));
    }

    #[test]
    fn provenance_stamped_on_adopted_cells() {
        let engine = MergeEngine::new().with_provenance(Provenance {
            origin_stage: "SCRUTINY".into(),
            source_case_id: Some("CASE-1".into()),
            converted_at: None,
        });
        let merged = engine.merge(&master(), &values(json!([["x", 5]]))).unwrap();
        let grid = merged.template.grid.unwrap();
        assert_eq!(
            grid.cell(0, "igst").unwrap().provenance.as_ref().map(|p| p.origin_stage.as_str()),
            Some("SCRUTINY")
        );
        assert!(grid.cell(0, "cgst").unwrap().provenance.is_none());
    }

    #[test]
    fn narrative_only_master_drops_grid_values() {
        let master = IssueTemplate::new("N-1", "Narrative").with_narrative_only(true);
        let merged = MergeEngine::new().merge(&master, &values(json!([5, 6]))).unwrap();
        assert!(merged.template.grid.is_none());
        assert_eq!(merged.report.dropped.len(), 2);
        assert!(merged.report.dropped.iter().all(|d| d.reason == DropReason::NoMasterGrid));
    }
}
