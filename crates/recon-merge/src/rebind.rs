//! Prototype row cloning for dynamic grids

use std::collections::HashMap;

use recon_schema::{CellKind, CellValue, Row, RowRole};

/// Derive the binding of a cloned cell from the prototype's
///
/// `row0_igst` → `row3_igst`; a binding without the row prefix gets the new
/// row id appended (`igst` → `igst_row3`).
#[must_use]
pub fn rebind_var(var: &str, prototype_row: &str, new_row: &str) -> String {
    match var.strip_prefix(prototype_row).and_then(|rest| rest.strip_prefix('_')) {
        Some(rest) => format!("{new_row}_{rest}"),
        None => format!("{var}_{new_row}"),
    }
}

/// Clone `prototype` as a fresh row `new_id`
///
/// Bindings are re-derived with [`rebind_var`] and formulas are rewritten to
/// reference the re-derived names. Static labels are kept, values reset.
#[must_use]
pub fn clone_prototype(prototype: &Row, new_id: &str) -> Row {
    let renames: HashMap<String, String> = prototype
        .cells
        .values()
        .filter_map(|cell| cell.var.as_deref())
        .map(|var| (var.to_string(), rebind_var(var, &prototype.id, new_id)))
        .collect();

    let mut row = Row::new(new_id).with_role(RowRole::Base);
    for (column, cell) in &prototype.cells {
        let mut cell = cell.clone();
        cell.var = cell.var.as_ref().and_then(|v| renames.get(v).cloned());
        cell.formula = cell.formula.as_deref().map(|f| rename_identifiers(f, &renames));
        if cell.kind != CellKind::Static {
            cell.value = CellValue::zero();
        }
        cell.provenance = None;
        row.cells.insert(column.clone(), cell);
    }
    row
}

/// Replace whole identifiers found in `renames`
fn rename_identifiers(source: &str, renames: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut ident = String::new();
    let mut in_number = false;

    let flush = |ident: &mut String, out: &mut String| {
        if !ident.is_empty() {
            out.push_str(renames.get(ident.as_str()).map_or(ident.as_str(), String::as_str));
            ident.clear();
        }
    };

    for c in source.chars() {
        let ident_char = c.is_ascii_alphanumeric() || c == '_';
        if ident_char && !in_number && (c.is_ascii_alphabetic() || c == '_' || !ident.is_empty()) {
            ident.push(c);
            continue;
        }
        flush(&mut ident, &mut out);
        // digits/exponents of a literal never start an identifier
        in_number = ident_char || (in_number && c == '.');
        out.push(c);
    }
    flush(&mut ident, &mut out);
    out
}
