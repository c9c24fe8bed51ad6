//! Canonical grid schema: Columns × Rows × Cells
//!
//! Every issue table, whatever era or code path produced it, is held in
//! this one shape once it is past the normalizer.
//!
//! # Invariants
//! - A [`GridSchema`] always has at least one column
//! - Column ids are unique
//! - Every row holds exactly one cell per column (rectangular)
//!
//! Construction goes through [`GridSchema::new`] (and serde, which routes
//! through the same check), so a grid that exists is a valid grid.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{CellValue, Variables};

/// Tax-head classification of a value column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaxHead {
    /// Integrated tax
    Igst,
    /// Central tax
    Cgst,
    /// State / union territory tax
    Sgst,
    /// Compensation cess
    Cess,
}

impl TaxHead {
    /// All heads, in detection order
    pub const ALL: [Self; 4] = [Self::Igst, Self::Cgst, Self::Sgst, Self::Cess];

    /// Keyword matched against header text
    #[inline]
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Igst => "IGST",
            Self::Cgst => "CGST",
            Self::Sgst => "SGST",
            Self::Cess => "CESS",
        }
    }

    /// Case-insensitive substring detection on a header label
    #[must_use]
    pub fn detect(label: &str) -> Option<Self> {
        let upper = label.to_ascii_uppercase();
        Self::ALL.into_iter().find(|head| upper.contains(head.keyword()))
    }
}

/// Display column of a grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Stable short key, referenced by row cells
    pub id: String,
    /// Display text
    pub label: String,
    /// Tax-head classification, if this column carries a tax figure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_head: Option<TaxHead>,
    /// Label column (true) or value column (false)
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl Column {
    /// Value column
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            tax_head: None,
            is_static: false,
        }
    }

    /// Static label column
    #[must_use]
    pub fn label_column(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            is_static: true,
            ..Self::new(id, label)
        }
    }

    /// Set the tax head
    #[must_use]
    pub fn with_tax_head(mut self, head: TaxHead) -> Self {
        self.tax_head = Some(head);
        self
    }

    /// Tax head, falling back to keyword detection on the label
    #[must_use]
    pub fn effective_tax_head(&self) -> Option<TaxHead> {
        self.tax_head.or_else(|| TaxHead::detect(&self.label))
    }

    /// Position encoded in a generic `col<i>` id
    #[inline]
    #[must_use]
    pub fn generic_index(&self) -> Option<usize> {
        parse_generic_column_id(&self.id)
    }
}

/// Generic positional column id (`col0`, `col1`, ...)
#[inline]
#[must_use]
pub fn generic_column_id(index: usize) -> String {
    format!("col{index}")
}

/// Parse a generic positional column id back to its index
#[must_use]
pub fn parse_generic_column_id(id: &str) -> Option<usize> {
    let digits = id.strip_prefix("col")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Cell behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    /// Fixed label text
    Static,
    /// Editable figure
    #[default]
    Input,
    /// Derived from other variables
    Formula,
}

/// Display emphasis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStyle {
    /// Plain
    #[default]
    Normal,
    /// Bold
    Bold,
    /// Highlighted
    Emphasis,
}

impl CellStyle {
    fn is_normal(&self) -> bool {
        *self == Self::Normal
    }
}

/// Where a value came from when it was carried across stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Stage the value originated in (e.g. `SCRUTINY`)
    pub origin_stage: String,
    /// Case the value was copied from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_case_id: Option<String>,
    /// When the value was converted into the canonical grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_at: Option<DateTime<Utc>>,
}

/// One grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Current value
    #[serde(default)]
    pub value: CellValue,
    /// Behaviour
    #[serde(rename = "type", default)]
    pub kind: CellKind,
    /// Binding into the variable namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
    /// Display emphasis
    #[serde(default, skip_serializing_if = "CellStyle::is_normal")]
    pub style: CellStyle,
    /// Expression, only meaningful for formula cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Carry-forward provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Cell {
    /// Unbound input cell holding `value`
    #[must_use]
    pub fn input(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            kind: CellKind::Input,
            var: None,
            style: CellStyle::Normal,
            formula: None,
            provenance: None,
        }
    }

    /// Input cell bound to `var`, starting at zero
    #[must_use]
    pub fn bound_input(var: impl Into<String>) -> Self {
        Self {
            var: Some(var.into()),
            ..Self::input(CellValue::zero())
        }
    }

    /// Static label cell
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Static,
            ..Self::input(CellValue::Text(text.into()))
        }
    }

    /// Formula cell writing its result into `var`
    #[must_use]
    pub fn formula(var: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Formula,
            var: Some(var.into()),
            formula: Some(expression.into()),
            ..Self::input(CellValue::zero())
        }
    }

    /// Empty unbound input, used to pad short rows
    #[must_use]
    pub fn blank() -> Self {
        Self::input(CellValue::Empty)
    }

    /// Set style
    #[must_use]
    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }

    /// Set provenance
    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Whether the cell is derived
    #[inline]
    #[must_use]
    pub fn is_formula(&self) -> bool {
        self.kind == CellKind::Formula
    }
}

/// Row role, inferred for legacy tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowRole {
    /// Ordinary figure row
    #[default]
    Base,
    /// Authoritative derived figure (declared minus reported)
    Difference,
}

/// Ordered mapping of column id to cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Row key, unique inside the grid
    pub id: String,
    /// Role tag
    #[serde(default)]
    pub role: RowRole,
    /// Cells keyed by column id, in column order
    pub cells: IndexMap<String, Cell>,
}

impl Row {
    /// Empty row
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: RowRole::Base,
            cells: IndexMap::new(),
        }
    }

    /// Builder: add a cell
    #[must_use]
    pub fn with_cell(mut self, column: impl Into<String>, cell: Cell) -> Self {
        self.cells.insert(column.into(), cell);
        self
    }

    /// Builder: set role
    #[must_use]
    pub fn with_role(mut self, role: RowRole) -> Self {
        self.role = role;
        self
    }

    /// Cell under a column
    #[inline]
    #[must_use]
    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }
}

/// Whether the merge engine may grow the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowPolicy {
    /// Row count is the master's
    #[default]
    Fixed,
    /// Extra snapshot rows clone a prototype row
    Dynamic,
}

/// Canonical table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridSchemaRepr")]
pub struct GridSchema {
    columns: Vec<Column>,
    rows: Vec<Row>,
    #[serde(default)]
    row_policy: RowPolicy,
}

#[derive(Deserialize)]
struct GridSchemaRepr {
    columns: Vec<Column>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    row_policy: RowPolicy,
}

impl TryFrom<GridSchemaRepr> for GridSchema {
    type Error = SchemaError;

    fn try_from(repr: GridSchemaRepr) -> Result<Self, Self::Error> {
        Ok(Self::new(repr.columns, repr.rows)?.with_row_policy(repr.row_policy))
    }
}

impl GridSchema {
    /// Validated constructor
    ///
    /// # Errors
    /// - [`SchemaError::EmptyColumns`] when `columns` is empty
    /// - [`SchemaError::DuplicateColumn`] / [`SchemaError::DuplicateRow`] on repeated keys
    /// - [`SchemaError::RaggedRow`] / [`SchemaError::UnknownColumn`] when a row is not rectangular
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::EmptyColumns);
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.id == column.id) {
                return Err(SchemaError::DuplicateColumn(column.id.clone()));
            }
        }
        let grid = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
            row_policy: RowPolicy::Fixed,
        };
        rows.into_iter().try_fold(grid, |mut grid, row| {
            grid.push_row(row)?;
            Ok(grid)
        })
    }

    /// Set the row policy
    #[must_use]
    pub fn with_row_policy(mut self, policy: RowPolicy) -> Self {
        self.row_policy = policy;
        self
    }

    /// Columns in display order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows in display order
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row policy
    #[inline]
    #[must_use]
    pub fn row_policy(&self) -> RowPolicy {
        self.row_policy
    }

    /// True when the grid carries no rows
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row after checking it is rectangular
    ///
    /// Cells are reordered to column order.
    ///
    /// # Errors
    /// Returns error if the row id is taken or the row's cells do not match the columns.
    pub fn push_row(&mut self, mut row: Row) -> Result<(), SchemaError> {
        if self.rows.iter().any(|r| r.id == row.id) {
            return Err(SchemaError::DuplicateRow(row.id));
        }
        if row.cells.len() != self.columns.len() {
            return Err(SchemaError::RaggedRow {
                row: row.id,
                expected: self.columns.len(),
                actual: row.cells.len(),
            });
        }
        let mut ordered = IndexMap::with_capacity(self.columns.len());
        for column in &self.columns {
            let Some(cell) = row.cells.shift_remove(&column.id) else {
                return Err(SchemaError::UnknownColumn {
                    row: row.id,
                    column: row.cells.keys().next().cloned().unwrap_or_default(),
                });
            };
            ordered.insert(column.id.clone(), cell);
        }
        row.cells = ordered;
        self.rows.push(row);
        Ok(())
    }

    /// Position of a column id
    #[must_use]
    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Position of a row id
    #[must_use]
    pub fn row_index(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    /// Column labels in display order
    #[must_use]
    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    /// The column holding row labels: first static column, else the first column
    #[must_use]
    pub fn label_column(&self) -> &Column {
        self.columns
            .iter()
            .find(|c| c.is_static)
            .unwrap_or(&self.columns[0])
    }

    /// Text label of a row
    #[must_use]
    pub fn row_label(&self, row_index: usize) -> Option<String> {
        let column = &self.label_column().id;
        self.rows
            .get(row_index)
            .and_then(|row| row.cell(column))
            .map(|cell| cell.value.to_string())
    }

    /// Cell lookup
    #[must_use]
    pub fn cell(&self, row_index: usize, column: &str) -> Option<&Cell> {
        self.rows.get(row_index)?.cells.get(column)
    }

    /// Mutable cell lookup; replacing cell contents keeps the grid rectangular
    pub fn cell_mut(&mut self, row_index: usize, column: &str) -> Option<&mut Cell> {
        self.rows.get_mut(row_index)?.cells.get_mut(column)
    }

    /// Set the role of a row
    pub fn set_row_role(&mut self, row_index: usize, role: RowRole) {
        if let Some(row) = self.rows.get_mut(row_index) {
            row.role = role;
        }
    }

    /// First row id of the form `row<n>` not yet used, starting at the row count
    #[must_use]
    pub fn next_row_id(&self) -> String {
        (self.rows.len()..)
            .map(|n| format!("row{n}"))
            .find(|id| self.row_index(id).is_none())
            .unwrap_or_default()
    }

    /// Every cell with a variable binding, in row-major order
    pub fn bound_cells(&self) -> impl Iterator<Item = (usize, &str, &Cell)> {
        self.rows.iter().enumerate().flat_map(|(i, row)| {
            row.cells
                .iter()
                .filter(|(_, cell)| cell.var.is_some())
                .map(move |(column, cell)| (i, column.as_str(), cell))
        })
    }

    /// Find the cell bound to `var`
    #[must_use]
    pub fn cell_for_var(&self, var: &str) -> Option<(usize, &str)> {
        self.bound_cells()
            .find(|(_, _, cell)| cell.var.as_deref() == Some(var))
            .map(|(row, column, _)| (row, column))
    }

    /// Values of bound, non-formula cells that hold something
    #[must_use]
    pub fn input_values(&self) -> Variables {
        self.bound_cells()
            .filter(|(_, _, cell)| !cell.is_formula() && !cell.value.is_blank())
            .filter_map(|(_, _, cell)| Some((cell.var.clone()?, cell.value.clone())))
            .collect()
    }

    /// Write variable values into the cells bound to them
    pub fn project(&mut self, variables: &Variables) {
        for row in &mut self.rows {
            for cell in row.cells.values_mut() {
                if let Some(value) = cell.var.as_ref().and_then(|var| variables.get(var)) {
                    cell.value = value.clone();
                }
            }
        }
    }

    /// Reset every non-static value to zero (fresh instance)
    pub fn clear_values(&mut self) {
        for row in &mut self.rows {
            for cell in row.cells.values_mut() {
                if cell.kind != CellKind::Static {
                    cell.value = CellValue::zero();
                }
            }
        }
    }

    /// Structure-only JSON, the input to the schema hash
    #[must_use]
    pub fn structure_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let cells: serde_json::Map<String, serde_json::Value> = row
                    .cells
                    .iter()
                    .map(|(column, cell)| {
                        (
                            column.clone(),
                            serde_json::json!({
                                "type": cell.kind,
                                "var": cell.var,
                                "style": cell.style,
                                "formula": cell.formula,
                            }),
                        )
                    })
                    .collect();
                serde_json::json!({ "id": row.id, "role": row.role, "cells": cells })
            })
            .collect();
        serde_json::json!({
            "columns": self.columns,
            "rows": rows,
            "row_policy": self.row_policy,
        })
    }
}

/// Grid invariant violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Grid with no columns
    #[error("grid schema must define at least one column")]
    EmptyColumns,

    /// Two columns share an id
    #[error("duplicate column id: {0}")]
    DuplicateColumn(String),

    /// Two rows share an id
    #[error("duplicate row id: {0}")]
    DuplicateRow(String),

    /// Row cell count differs from column count
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: String,
        expected: usize,
        actual: usize,
    },

    /// Row keyed by a column the grid does not define
    #[error("row {row} references unknown column {column}")]
    UnknownColumn { row: String, column: String },
}
