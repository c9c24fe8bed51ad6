//! Raw grid → canonical [`GridSchema`]
//!
//! The normalizer is total over the recognized shapes: ragged rows, string
//! columns, missing headers and textual figures are repaired and reported,
//! never rejected. Only a payload matching no shape at all is an error.

use std::collections::HashSet;
use std::fmt;

use recon_schema::{
    generic_column_id, Cell, CellKind, CellValue, Column, GridSchema, Row, RowPolicy, RowRole,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::classify::{HeaderClassifier, KeywordClassifier};
use crate::error::NormalizeError;
use crate::raw::{RawGrid, ShapeKind};

/// Normalizer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Tables with at most this many rows get their last row tagged DIFFERENCE
    pub difference_row_threshold: usize,
    /// Turn numeric text (`"5,000"`) in value columns into numbers
    pub coerce_numeric_text: bool,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            difference_row_threshold: 3,
            coerce_numeric_text: true,
        }
    }
}

impl NormalizeConfig {
    /// Builder: role-inference threshold
    #[inline]
    #[must_use]
    pub fn with_difference_row_threshold(mut self, threshold: usize) -> Self {
        self.difference_row_threshold = threshold;
        self
    }

    /// Builder: numeric text coercion
    #[inline]
    #[must_use]
    pub fn with_coerce_numeric_text(mut self, coerce: bool) -> Self {
        self.coerce_numeric_text = coerce;
        self
    }
}

/// A non-fatal fix applied while normalizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The payload was a JSON-encoded string
    DecodedJsonString,
    /// Plain-string column upgraded to a column object
    UpgradedColumn {
        /// Position
        index: usize,
        /// Label text kept from the string
        label: String,
    },
    /// Column id already taken, replaced by a generic one
    RenamedColumn {
        /// Original id
        from: String,
        /// Replacement
        to: String,
    },
    /// Placeholder headers generated
    GeneratedHeaders {
        /// How many
        count: usize,
    },
    /// Short row zero-padded
    PaddedRow {
        /// Row id
        row: String,
        /// Cells added
        missing: usize,
    },
    /// Long row truncated
    TruncatedRow {
        /// Row id
        row: String,
        /// Cells dropped
        extra: usize,
    },
    /// Numeric text stored as a number
    CoercedNumber {
        /// Row id
        row: String,
        /// Column id
        column: String,
    },
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecodedJsonString => f.write_str("decoded JSON-encoded grid string"),
            Self::UpgradedColumn { index, label } => {
                write!(f, "upgraded string column {index} ({label:?})")
            }
            Self::RenamedColumn { from, to } => write!(f, "renamed duplicate column {from} to {to}"),
            Self::GeneratedHeaders { count } => write!(f, "generated {count} placeholder headers"),
            Self::PaddedRow { row, missing } => write!(f, "padded row {row} with {missing} cells"),
            Self::TruncatedRow { row, extra } => write!(f, "truncated {extra} cells from row {row}"),
            Self::CoercedNumber { row, column } => {
                write!(f, "coerced numeric text at {row}/{column}")
            }
        }
    }
}

/// Normalization result with its repair log
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The canonical grid
    pub grid: GridSchema,
    /// Shape the payload was recognized as
    pub shape: ShapeKind,
    /// Whether the payload was a legacy shape (or upgraded string columns)
    pub legacy: bool,
    /// Fixes applied, in order
    pub repairs: Vec<Repair>,
    /// Header rows taken off the top of a row array; body row `i` sat at
    /// position `i + row_offset` of the payload
    pub row_offset: usize,
}

/// Converts any recognized raw grid into a [`GridSchema`]
pub struct Normalizer {
    config: NormalizeConfig,
    classifier: Box<dyn HeaderClassifier>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizeConfig::default())
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Normalizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// One row, pulled apart into per-column slots
struct RawRow {
    id: Option<String>,
    role: Option<RowRole>,
    slots: Vec<Option<Value>>,
    overflow: usize,
}

impl Normalizer {
    /// Normalizer with the keyword header classifier
    #[must_use]
    pub fn new(config: NormalizeConfig) -> Self {
        Self {
            config,
            classifier: Box::new(KeywordClassifier),
        }
    }

    /// Swap the header classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl HeaderClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Normalize, discarding the repair log
    ///
    /// # Errors
    /// Returns [`NormalizeError::MalformedShape`] if `raw` is not a recognized shape.
    pub fn normalize(&self, raw: &Value) -> Result<GridSchema, NormalizeError> {
        self.normalize_report(raw).map(|n| n.grid)
    }

    /// Normalize and report what was repaired
    ///
    /// # Errors
    /// Returns [`NormalizeError::MalformedShape`] if `raw` is not a recognized shape.
    pub fn normalize_report(&self, raw: &Value) -> Result<Normalized, NormalizeError> {
        let mut repairs = Vec::new();
        if raw.is_string() {
            repairs.push(Repair::DecodedJsonString);
        }
        let detected = RawGrid::detect(raw)?;
        let shape = detected.shape();
        debug!(?shape, "detected grid shape");

        let (columns, rows, row_policy, mut legacy, row_offset) = match detected {
            RawGrid::Canonical {
                columns,
                rows,
                row_policy,
            } => {
                let columns = self.canonical_columns(&columns, &mut repairs)?;
                let upgraded = repairs
                    .iter()
                    .any(|r| matches!(r, Repair::UpgradedColumn { .. }));
                let rows: Vec<RawRow> = rows.iter().map(|row| split_row(row, &columns)).collect();
                let policy = row_policy
                    .and_then(|p| serde_json::from_value::<RowPolicy>(p).ok())
                    .unwrap_or_default();
                (columns, rows, policy, upgraded, 0)
            }
            RawGrid::HeaderRows { headers, rows } => {
                if headers.is_empty() {
                    return Err(NormalizeError::malformed("header list is empty"));
                }
                let labels: Vec<String> = headers.iter().map(header_text).collect();
                let columns = self.legacy_columns(labels, &mut repairs);
                let rows: Vec<RawRow> = rows.iter().map(|row| split_row(row, &columns)).collect();
                (columns, rows, RowPolicy::Fixed, true, 0)
            }
            RawGrid::FlatRows(items) => {
                let (columns, rows, offset) = self.flat_rows(&items, &mut repairs)?;
                (columns, rows, RowPolicy::Fixed, true, offset)
            }
            RawGrid::Scalars(items) => {
                let columns = vec![Column::new(generic_column_id(0), "Col 1")];
                let rows: Vec<RawRow> = items
                    .into_iter()
                    .map(|item| RawRow {
                        id: None,
                        role: None,
                        slots: vec![Some(item)],
                        overflow: 0,
                    })
                    .collect();
                (columns, rows, RowPolicy::Fixed, true, 0)
            }
        };
        legacy |= shape != ShapeKind::Canonical;

        let grid = self.assemble(columns, rows, legacy, &mut repairs)?;
        for repair in &repairs {
            debug!(%repair, "grid repair");
        }
        Ok(Normalized {
            grid: grid.with_row_policy(row_policy),
            shape,
            legacy,
            repairs,
            row_offset,
        })
    }

    fn canonical_columns(
        &self,
        raw: &[Value],
        repairs: &mut Vec<Repair>,
    ) -> Result<Vec<Column>, NormalizeError> {
        if raw.is_empty() {
            return Err(NormalizeError::malformed("column list is empty"));
        }
        let mut columns: Vec<Column> = Vec::with_capacity(raw.len());
        for (index, entry) in raw.iter().enumerate() {
            let mut column = match entry {
                Value::String(label) => {
                    repairs.push(Repair::UpgradedColumn {
                        index,
                        label: label.clone(),
                    });
                    self.classifier.column(generic_column_id(index), label, index)
                }
                Value::Object(map) => object_column(map, index)?,
                other => {
                    return Err(NormalizeError::malformed(format!(
                        "column {index} is neither an object nor a string: {other}"
                    )))
                }
            };
            if columns.iter().any(|c| c.id == column.id) {
                let to = free_column_id(&columns, index);
                repairs.push(Repair::RenamedColumn {
                    from: std::mem::replace(&mut column.id, to.clone()),
                    to,
                });
            }
            columns.push(column);
        }
        Ok(columns)
    }

    fn legacy_columns(&self, labels: Vec<String>, repairs: &mut Vec<Repair>) -> Vec<Column> {
        let mut generated = 0;
        let columns = labels
            .into_iter()
            .enumerate()
            .map(|(index, label)| {
                let label = if label.trim().is_empty() {
                    generated += 1;
                    format!("Col {}", index + 1)
                } else {
                    label
                };
                self.classifier.column(generic_column_id(index), &label, index)
            })
            .collect();
        if generated > 0 {
            repairs.push(Repair::GeneratedHeaders { count: generated });
        }
        columns
    }

    fn flat_rows(
        &self,
        items: &[Value],
        repairs: &mut Vec<Repair>,
    ) -> Result<(Vec<Column>, Vec<RawRow>, usize), NormalizeError> {
        if let Some(Value::Object(first)) = items.first() {
            // Map rows without a header list: the first row's keys are the columns
            let columns: Vec<Column> = first
                .keys()
                .enumerate()
                .map(|(index, key)| self.classifier.column(key.clone(), key, index))
                .collect();
            let rows = items
                .iter()
                .map(|row| split_row(row, &columns))
                .collect();
            return Ok((columns, rows, 0));
        }

        let has_header = items.len() > 1 && items.first().is_some_and(is_header_row);
        let (labels, body) = if has_header {
            let labels: Vec<String> = items[0]
                .as_array()
                .map(|cells| cells.iter().map(header_text).collect())
                .unwrap_or_default();
            (labels, &items[1..])
        } else {
            let width = items
                .iter()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .max()
                .unwrap_or(0);
            if width > 0 {
                repairs.push(Repair::GeneratedHeaders { count: width });
            }
            ((1..=width).map(|n| format!("Col {n}")).collect(), items)
        };
        if labels.is_empty() {
            return Err(NormalizeError::malformed("row arrays carry no columns"));
        }
        let columns = self.legacy_columns(labels, repairs);
        let rows = body
            .iter()
            .map(|row| split_row(row, &columns))
            .collect();
        Ok((columns, rows, usize::from(has_header)))
    }

    fn assemble(
        &self,
        columns: Vec<Column>,
        raw_rows: Vec<RawRow>,
        legacy: bool,
        repairs: &mut Vec<Repair>,
    ) -> Result<GridSchema, NormalizeError> {
        let roles_declared = raw_rows.iter().any(|r| r.role.is_some());
        let row_count = raw_rows.len();
        let mut taken: HashSet<String> = HashSet::with_capacity(row_count);
        let mut rows = Vec::with_capacity(row_count);

        for (index, raw) in raw_rows.into_iter().enumerate() {
            let id = match raw.id {
                Some(id) if !id.is_empty() && !taken.contains(&id) => id,
                _ => (index..)
                    .map(|n| format!("row{n}"))
                    .find(|candidate| !taken.contains(candidate))
                    .unwrap_or_default(),
            };
            taken.insert(id.clone());

            let missing = raw.slots.iter().filter(|s| s.is_none()).count();
            if missing > 0 {
                repairs.push(Repair::PaddedRow {
                    row: id.clone(),
                    missing,
                });
            }
            if raw.overflow > 0 {
                repairs.push(Repair::TruncatedRow {
                    row: id.clone(),
                    extra: raw.overflow,
                });
            }

            let mut row = Row::new(id.clone()).with_role(raw.role.unwrap_or_default());
            for (column, slot) in columns.iter().zip(raw.slots) {
                let cell = match slot {
                    Some(value) => self.cell(&value, column, &id, repairs),
                    None => padding_cell(column),
                };
                row.cells.insert(column.id.clone(), cell);
            }
            rows.push(row);
        }

        if !roles_declared && row_count > 0 && row_count <= self.config.difference_row_threshold {
            if let Some(last) = rows.last_mut() {
                last.role = RowRole::Difference;
            }
        }
        if legacy {
            bind_difference_cells(&columns, &mut rows);
        }
        Ok(GridSchema::new(columns, rows)?)
    }

    fn cell(&self, raw: &Value, column: &Column, row: &str, repairs: &mut Vec<Repair>) -> Cell {
        let mut cell = parse_cell(raw, column);
        if self.config.coerce_numeric_text && !column.is_static && cell.kind == CellKind::Input {
            if let CellValue::Text(_) = cell.value {
                if let Some(n) = cell.value.as_number() {
                    cell.value = CellValue::Number(n);
                    repairs.push(Repair::CoercedNumber {
                        row: row.to_string(),
                        column: column.id.clone(),
                    });
                }
            }
        }
        cell
    }
}

fn object_column(map: &Map<String, Value>, index: usize) -> Result<Column, NormalizeError> {
    let mut entry = map.clone();
    let id_missing = !entry
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if id_missing {
        entry.insert("id".into(), Value::String(generic_column_id(index)));
    }
    if !entry.contains_key("label") {
        let label = entry
            .get("header")
            .or_else(|| entry.get("name"))
            .and_then(Value::as_str)
            .map_or_else(|| format!("Col {}", index + 1), str::to_string);
        entry.insert("label".into(), Value::String(label));
    }
    serde_json::from_value(Value::Object(entry))
        .map_err(|e| NormalizeError::malformed(format!("column {index}: {e}")))
}

fn free_column_id(columns: &[Column], index: usize) -> String {
    (index..)
        .map(generic_column_id)
        .find(|id| columns.iter().all(|c| &c.id != id))
        .unwrap_or_default()
}

fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => map
            .get("label")
            .or_else(|| map.get("value"))
            .map(header_text)
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

fn is_header_row(value: &Value) -> bool {
    value.as_array().is_some_and(|cells| {
        !cells.is_empty()
            && cells.iter().all(|cell| {
                let value = CellValue::from_json(cell);
                value.as_text().is_some() && !value.is_numeric()
            })
    })
}

/// Pull a row apart into one slot per column
fn split_row(raw: &Value, columns: &[Column]) -> RawRow {
    match raw {
        Value::Array(cells) => {
            let mut slots: Vec<Option<Value>> =
                cells.iter().take(columns.len()).cloned().map(Some).collect();
            slots.resize(columns.len(), None);
            RawRow {
                id: None,
                role: None,
                slots,
                overflow: cells.len().saturating_sub(columns.len()),
            }
        }
        Value::Object(map) => {
            if let Some(Value::Object(cells)) = map.get("cells") {
                let mut row = split_map(cells, columns);
                row.id = map.get("id").and_then(Value::as_str).map(str::to_string);
                row.role = map
                    .get("role")
                    .and_then(|r| serde_json::from_value::<RowRole>(r.clone()).ok());
                return row;
            }
            split_map(map, columns)
        }
        scalar => {
            // Lone scalar where a row was expected: first column only
            let mut slots = vec![None; columns.len()];
            if let Some(first) = slots.first_mut() {
                *first = Some(scalar.clone());
            }
            RawRow {
                id: None,
                role: None,
                slots,
                overflow: 0,
            }
        }
    }
}

/// Map row: keyed by column id, else by label; positional when neither matches
fn split_map(map: &Map<String, Value>, columns: &[Column]) -> RawRow {
    let mut used = 0;
    let mut slots: Vec<Option<Value>> = columns
        .iter()
        .map(|column| {
            let found = map.get(&column.id).or_else(|| map.get(&column.label)).cloned();
            used += usize::from(found.is_some());
            found
        })
        .collect();

    if used == 0 && !map.is_empty() {
        slots = map.values().take(columns.len()).cloned().map(Some).collect();
        used = slots.len();
        slots.resize(columns.len(), None);
    }
    RawRow {
        id: None,
        role: None,
        slots,
        overflow: map.len().saturating_sub(used),
    }
}

fn parse_cell(raw: &Value, column: &Column) -> Cell {
    if let Value::Object(map) = raw {
        if map.contains_key("value") || map.contains_key("type") {
            if let Ok(cell) = serde_json::from_value::<Cell>(raw.clone()) {
                return cell;
            }
        }
    }
    let value = CellValue::from_json(raw);
    if column.is_static {
        Cell {
            kind: CellKind::Static,
            ..Cell::input(value)
        }
    } else {
        Cell::input(value)
    }
}

fn padding_cell(column: &Column) -> Cell {
    if column.is_static {
        Cell::label("")
    } else {
        Cell::input(CellValue::zero())
    }
}

/// Give unbound value cells of DIFFERENCE rows a `<row>_<column>` binding
fn bind_difference_cells(columns: &[Column], rows: &mut [Row]) {
    for row in rows.iter_mut().filter(|r| r.role == RowRole::Difference) {
        for column in columns.iter().filter(|c| !c.is_static) {
            if let Some(cell) = row.cells.get_mut(&column.id) {
                if cell.var.is_none() && cell.kind == CellKind::Input {
                    cell.var = Some(format!("{}_{}", row.id, column.id));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recon_schema::TaxHead;
    use serde_json::json;

    fn normalize(raw: Value) -> Normalized {
        Normalizer::default().normalize_report(&raw).unwrap()
    }

    #[test]
    fn string_columns_upgrade_without_losing_labels() {
        let out = normalize(json!({
            "columns": ["Description", "IGST", "CGST"],
            "rows": [{"Description": "Tax", "IGST": 10, "CGST": 5}]
        }));
        let columns = out.grid.columns();
        assert_eq!(
            columns.iter().map(|c| (c.id.as_str(), c.label.as_str())).collect::<Vec<_>>(),
            [("col0", "Description"), ("col1", "IGST"), ("col2", "CGST")]
        );
        assert!(out.legacy);
        assert_eq!(out.grid.cell(0, "col1").unwrap().value, CellValue::Number(10.0));
        assert_eq!(
            out.repairs.iter().filter(|r| matches!(r, Repair::UpgradedColumn { .. })).count(),
            3
        );
    }

    #[test]
    fn canonical_grid_kept_as_is() {
        let raw = json!({
            "columns": [
                {"id": "desc", "label": "Description", "static": true},
                {"id": "cgst", "label": "CGST", "tax_head": "CGST"}
            ],
            "rows": [
                {"id": "r1", "cells": {
                    "desc": {"value": "Tax", "type": "static"},
                    "cgst": {"value": 12, "type": "input", "var": "tax_cgst"}
                }}
            ],
            "row_policy": "dynamic"
        });
        let out = normalize(raw);
        assert!(!out.legacy);
        assert_eq!(out.grid.row_policy(), RowPolicy::Dynamic);
        let cell = out.grid.cell(0, "cgst").unwrap();
        assert_eq!(cell.var.as_deref(), Some("tax_cgst"));
        assert_eq!(cell.value, CellValue::Number(12.0));
    }

    #[test]
    fn header_rows_classify_columns() {
        let out = normalize(json!({
            "headers": ["Particulars", "IGST", "Cess"],
            "rows": [["Declared", 100, 1], ["Reported", 80, 1], ["Difference", 20, 0]]
        }));
        let columns = out.grid.columns();
        assert!(columns[0].is_static);
        assert_eq!(columns[1].tax_head, Some(TaxHead::Igst));
        assert_eq!(columns[2].tax_head, Some(TaxHead::Cess));
        assert_eq!(out.grid.rows()[2].role, RowRole::Difference);
        assert_eq!(out.grid.rows()[0].role, RowRole::Base);
        assert_eq!(
            out.grid.cell(2, "col1").unwrap().var.as_deref(),
            Some("row2_col1")
        );
        assert!(out.grid.cell(0, "col1").unwrap().var.is_none());
    }

    #[test]
    fn ragged_rows_are_padded_and_truncated() {
        let out = normalize(json!([["A", "B", "C"], [1], [1, 2, 3, 4]]));
        assert_eq!(out.grid.rows().len(), 2);
        assert!(out.grid.rows().iter().all(|r| r.cells.len() == 3));
        assert_eq!(out.grid.cell(0, "col2").unwrap().value, CellValue::zero());
        assert!(out.repairs.contains(&Repair::PaddedRow { row: "row0".into(), missing: 2 }));
        assert!(out.repairs.contains(&Repair::TruncatedRow { row: "row1".into(), extra: 1 }));
    }

    #[test]
    fn missing_headers_are_generated() {
        let out = normalize(json!([[1, 2], [3, 4]]));
        assert_eq!(out.grid.column_labels(), ["Col 1", "Col 2"]);
        assert_eq!(out.grid.rows().len(), 2);
    }

    #[test]
    fn map_rows_use_first_row_keys() {
        let out = normalize(json!([{"desc": "Tax", "sgst": "1,200"}, {"desc": "Paid"}]));
        assert_eq!(out.grid.columns()[1].id, "sgst");
        assert_eq!(out.grid.cell(0, "sgst").unwrap().value, CellValue::Number(1200.0));
        assert!(out.repairs.contains(&Repair::CoercedNumber { row: "row0".into(), column: "sgst".into() }));
    }

    #[test]
    fn scalar_list_becomes_single_column() {
        let out = normalize(json!([{"value": 100}, 250]));
        assert_eq!(out.shape, ShapeKind::Scalars);
        assert_eq!(out.grid.columns().len(), 1);
        assert_eq!(out.grid.columns()[0].id, "col0");
        assert_eq!(out.grid.cell(0, "col0").unwrap().value, CellValue::Number(100.0));
        assert_eq!(out.grid.cell(1, "col0").unwrap().value, CellValue::Number(250.0));
    }

    #[test]
    fn declared_roles_disable_inference() {
        let out = normalize(json!({
            "columns": [{"id": "a", "label": "A"}],
            "rows": [{"id": "x", "role": "difference", "cells": {"a": 1}}, {"id": "y", "cells": {"a": 2}}]
        }));
        assert_eq!(out.grid.rows()[0].role, RowRole::Difference);
        assert_eq!(out.grid.rows()[1].role, RowRole::Base);
    }

    #[test]
    fn larger_tables_get_no_difference_row() {
        let out = normalize(json!([[1], [2], [3], [4]]));
        assert!(out.grid.rows().iter().all(|r| r.role == RowRole::Base));
    }

    #[test]
    fn duplicate_canonical_ids_are_renamed() {
        let out = normalize(json!({
            "columns": [{"id": "a", "label": "A"}, {"id": "a", "label": "B"}],
            "rows": []
        }));
        assert_eq!(out.grid.columns()[1].id, "col1");
    }

    #[test]
    fn empty_columns_are_malformed_in_every_shape() {
        for raw in [
            json!({"columns": [], "rows": []}),
            json!({"headers": [], "rows": [[1, 2]]}),
            json!([[], []]),
        ] {
            let err = Normalizer::default().normalize(&raw);
            assert!(matches!(err, Err(NormalizeError::MalformedShape { .. })), "{raw}: {err:?}");
        }
    }

    #[test]
    fn header_row_offset_is_reported() {
        let out = normalize(json!([["Header Desc", "Header CGST"], ["Taxable Supply", 5000]]));
        assert_eq!(out.row_offset, 1);
        assert_eq!(out.grid.rows().len(), 1);
        assert_eq!(normalize(json!([["Inv 1", 10], ["Inv 2", 20]])).row_offset, 0);
        assert_eq!(
            normalize(json!({"headers": ["Desc", "IGST"], "rows": [["x", 1]]})).row_offset,
            0
        );
    }

    #[test]
    fn non_finite_text_stays_text() {
        let out = normalize(json!([["Desc", "IGST"], ["Tax", "nan"], ["Paid", "inf"]]));
        assert_eq!(out.row_offset, 1);
        assert_eq!(out.grid.cell(0, "col1").unwrap().value, CellValue::from("nan"));
        assert_eq!(out.grid.cell(1, "col1").unwrap().value, CellValue::from("inf"));
        assert!(!out.repairs.iter().any(|r| matches!(r, Repair::CoercedNumber { .. })));

        let saved = serde_json::to_value(&out.grid).unwrap();
        let reloaded = normalize(saved);
        assert_eq!(reloaded.grid.cell(1, "col1").unwrap().value, CellValue::from("inf"));
    }

    #[test]
    fn encoded_string_payload() {
        let out = normalize(json!("{\"headers\":[\"Desc\",\"IGST\"],\"rows\":[[\"x\",1]]}"));
        assert_eq!(out.shape, ShapeKind::HeaderRows);
        assert_eq!(out.repairs[0], Repair::DecodedJsonString);
    }
}
