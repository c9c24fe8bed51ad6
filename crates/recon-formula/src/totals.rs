//! Tax / interest / penalty demand totals

use recon_schema::{CellValue, IssueTemplate, Variables};
use serde::{Deserialize, Serialize};

use crate::expr::round_to;

/// Row labels the fallback scan accepts
const TOTAL_ROW_KEYWORDS: [&str; 3] = ["difference", "tax", "total"];

/// Demand figures handed to the totals consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DemandTotals {
    /// Tax demanded
    pub tax: f64,
    /// Interest
    pub interest: f64,
    /// Penalty
    pub penalty: f64,
}

impl DemandTotals {
    /// Sum of all three
    #[inline]
    #[must_use]
    pub fn total(&self) -> f64 {
        self.tax + self.interest + self.penalty
    }

    /// Rounded to `digits` decimals
    #[must_use]
    pub fn rounded(self, digits: u32) -> Self {
        let digits = f64::from(digits);
        Self {
            tax: round_to(self.tax, digits),
            interest: round_to(self.interest, digits),
            penalty: round_to(self.penalty, digits),
        }
    }
}

impl std::ops::Add for DemandTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            tax: self.tax + rhs.tax,
            interest: self.interest + rhs.interest,
            penalty: self.penalty + rhs.penalty,
        }
    }
}

impl std::iter::Sum for DemandTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, t| acc + t)
    }
}

/// Where the tax figure came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TotalsSource {
    /// `tax_demand_mapping` variables
    Mapping,
    /// Tax-head cells of the named grid row
    GridRow(String),
    /// Nothing usable; tax is zero
    Unresolved,
}

/// Compute demand totals
///
/// Interest and penalty always come from the mapping. Tax comes from the
/// mapping when at least one mapped tax variable holds a number; otherwise
/// the first grid row whose label mentions difference, tax or total is
/// summed across its tax-head columns.
#[must_use]
pub fn demand_totals(template: &IssueTemplate, variables: &Variables) -> (DemandTotals, TotalsSource) {
    let mapping = &template.tax_demand_mapping;
    let mut totals = DemandTotals {
        tax: 0.0,
        interest: sum_mapped(&mapping.interest, variables),
        penalty: sum_mapped(&mapping.penalty, variables),
    };

    let tax_populated = mapping
        .tax
        .iter()
        .any(|name| variables.get(name).is_some_and(CellValue::is_numeric));
    if tax_populated {
        totals.tax = sum_mapped(&mapping.tax, variables);
        return (totals, TotalsSource::Mapping);
    }

    match fallback_row_tax(template) {
        Some((row, tax)) => {
            totals.tax = tax;
            (totals, TotalsSource::GridRow(row))
        }
        None => (totals, TotalsSource::Unresolved),
    }
}

fn sum_mapped(names: &[String], variables: &Variables) -> f64 {
    names
        .iter()
        .filter_map(|name| variables.get(name).and_then(CellValue::as_number))
        .sum()
}

fn fallback_row_tax(template: &IssueTemplate) -> Option<(String, f64)> {
    let grid = template.grid.as_ref()?;
    let tax_columns: Vec<&str> = grid
        .columns()
        .iter()
        .filter(|c| c.effective_tax_head().is_some())
        .map(|c| c.id.as_str())
        .collect();
    if tax_columns.is_empty() {
        return None;
    }
    let index = (0..grid.rows().len()).find(|&i| {
        grid.row_label(i).is_some_and(|label| {
            let label = label.to_lowercase();
            TOTAL_ROW_KEYWORDS.iter().any(|k| label.contains(k))
        })
    })?;
    let tax = tax_columns
        .iter()
        .filter_map(|column| grid.cell(index, column)?.value.as_number())
        .sum();
    Some((grid.rows()[index].id.clone(), tax))
}
