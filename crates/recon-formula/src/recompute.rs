//! Bounded recomputation of formula cells and derivations

use std::collections::BTreeMap;

use recon_schema::{CellValue, IssueTemplate, Variables};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::FormulaError;
use crate::expr::Expr;
use crate::totals::{demand_totals, DemandTotals, TotalsSource};

/// Formula layer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaConfig {
    /// Passes over all formulas; forward references resolve within this bound
    pub passes: usize,
    /// Decimal places demand totals are rounded to
    pub totals_precision: Option<u32>,
}

impl Default for FormulaConfig {
    fn default() -> Self {
        Self {
            passes: 2,
            totals_precision: Some(2),
        }
    }
}

impl FormulaConfig {
    /// Builder: pass bound
    #[inline]
    #[must_use]
    pub fn with_passes(mut self, passes: usize) -> Self {
        self.passes = passes;
        self
    }

    /// Builder: totals rounding
    #[inline]
    #[must_use]
    pub fn with_totals_precision(mut self, precision: Option<u32>) -> Self {
        self.totals_precision = precision;
        self
    }
}

/// One formula that kept its prior value
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaFailure {
    /// Variable the formula writes
    pub target: String,
    /// Expression text
    pub expression: String,
    /// Why it failed
    pub error: FormulaError,
}

/// Outcome of [`FormulaEngine::recompute`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeReport {
    /// Namespace after recomputation
    pub variables: Variables,
    /// Formulas that failed in the final pass, or never parsed
    pub failures: Vec<FormulaFailure>,
    /// Passes actually run
    pub passes: usize,
}

struct Compiled {
    target: String,
    source: String,
    expr: Expr,
}

/// Evaluates a template's formula cells and `calc_logic`
#[derive(Debug, Clone, Default)]
pub struct FormulaEngine {
    config: FormulaConfig,
}

impl FormulaEngine {
    /// Engine with `config`
    #[must_use]
    pub fn new(config: FormulaConfig) -> Self {
        Self { config }
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &FormulaConfig {
        &self.config
    }

    /// Recompute every formula target, leaving `variables` untouched
    ///
    /// Grid formula cells run first in row-major order, then `calc_logic`
    /// steps in declaration order, for up to `passes` passes. A failing
    /// formula keeps its prior value; the others carry on.
    #[must_use]
    pub fn recompute(&self, template: &IssueTemplate, variables: &Variables) -> RecomputeReport {
        let namespace = template.variable_namespace();
        let mut failures = Vec::new();
        let mut compiled = Vec::new();

        for (target, source) in formula_sources(template) {
            match Expr::parse_in(&source, &namespace) {
                Ok(expr) => compiled.push(Compiled {
                    target,
                    source,
                    expr,
                }),
                Err(error) => failures.push(FormulaFailure {
                    target,
                    expression: source,
                    error,
                }),
            }
        }

        let mut values = variables.clone();
        let mut pending: BTreeMap<String, FormulaFailure> = BTreeMap::new();
        let mut passes = 0;

        while passes < self.config.passes {
            passes += 1;
            let mut changed = false;
            for formula in &compiled {
                match formula.expr.eval(&values) {
                    Ok(result) => {
                        pending.remove(&formula.target);
                        let next = CellValue::Number(result);
                        if values.get(&formula.target) != Some(&next) {
                            values.insert(formula.target.clone(), next);
                            changed = true;
                        }
                    }
                    Err(error) => {
                        pending.insert(
                            formula.target.clone(),
                            FormulaFailure {
                                target: formula.target.clone(),
                                expression: formula.source.clone(),
                                error,
                            },
                        );
                    }
                }
            }
            if !changed {
                break;
            }
        }

        failures.extend(pending.into_values());
        for failure in &failures {
            warn!(
                target = %failure.target,
                expression = %failure.expression,
                error = %failure.error,
                "formula kept its prior value"
            );
        }
        debug!(formulas = compiled.len(), passes, "recomputed formulas");

        RecomputeReport {
            variables: values,
            failures,
            passes,
        }
    }

    /// Recompute, store the namespace and project it into the grid
    pub fn apply(
        &self,
        template: &mut IssueTemplate,
        variables: &mut Variables,
    ) -> Vec<FormulaFailure> {
        let report = self.recompute(template, variables);
        *variables = report.variables;
        if let Some(grid) = template.grid.as_mut() {
            grid.project(variables);
        }
        report.failures
    }

    /// Demand totals, rounded per config
    #[must_use]
    pub fn totals(
        &self,
        template: &IssueTemplate,
        variables: &Variables,
    ) -> (DemandTotals, TotalsSource) {
        let (totals, source) = demand_totals(template, variables);
        let totals = match self.config.totals_precision {
            Some(digits) => totals.rounded(digits),
            None => totals,
        };
        (totals, source)
    }
}

/// `(target, expression)` pairs in evaluation order
fn formula_sources(template: &IssueTemplate) -> Vec<(String, String)> {
    let mut sources: Vec<(String, String)> = template
        .grid
        .iter()
        .flat_map(|grid| grid.bound_cells())
        .filter(|(_, _, cell)| cell.is_formula())
        .filter_map(|(_, _, cell)| Some((cell.var.clone()?, cell.formula.clone()?)))
        .collect();
    if let Some(logic) = &template.calc_logic {
        sources.extend(
            logic
                .steps
                .iter()
                .map(|step| (step.target.clone(), step.expression.clone())),
        );
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use recon_schema::{Cell, Column, Derivation, GridSchema, Row};

    fn template() -> IssueTemplate {
        let grid = GridSchema::new(
            vec![Column::label_column("desc", "Description"), Column::new("igst", "IGST")],
            vec![
                Row::new("row0")
                    .with_cell("desc", Cell::label("Declared"))
                    .with_cell("igst", Cell::bound_input("declared")),
                Row::new("row1")
                    .with_cell("desc", Cell::label("Paid"))
                    .with_cell("igst", Cell::bound_input("paid")),
                // refers forward to `rate_adj`, computed by calc_logic below
                Row::new("row2")
                    .with_cell("desc", Cell::label("Difference"))
                    .with_cell("igst", Cell::formula("diff", "(declared - paid) * rate_adj")),
            ],
        )
        .unwrap();
        IssueTemplate::new("T-1", "Test")
            .with_grid(grid)
            .with_variable("rate", 1.0)
            .with_calc_logic(vec![
                Derivation::new("rate_adj", "rate * 2"),
                Derivation::new("interest", "round(diff * 0.18, 2)"),
            ])
    }

    fn inputs() -> Variables {
        [("declared", 100.0), ("paid", 60.0), ("rate", 1.0), ("rate_adj", 0.0)]
            .iter()
            .map(|(k, v)| ((*k).to_string(), CellValue::Number(*v)))
            .collect()
    }

    #[test]
    fn forward_reference_resolves_in_second_pass() {
        let report = FormulaEngine::default().recompute(&template(), &inputs());
        assert!(report.failures.is_empty());
        assert_eq!(report.variables["diff"], CellValue::Number(80.0));
        assert_eq!(report.variables["rate_adj"], CellValue::Number(2.0));
        // interest saw diff = 0 in pass 1 and 80 in pass 2
        assert_eq!(report.variables["interest"], CellValue::Number(14.4));
    }

    #[test]
    fn single_pass_leaves_stale_values() {
        let engine = FormulaEngine::new(FormulaConfig::default().with_passes(1));
        let report = engine.recompute(&template(), &inputs());
        assert_eq!(report.variables["diff"], CellValue::Number(0.0));
        assert_eq!(report.passes, 1);
    }

    #[test]
    fn failing_formula_keeps_prior_value() {
        let mut vars = inputs();
        vars.insert("rate".into(), CellValue::from("n/a"));
        vars.insert("diff".into(), CellValue::Number(7.0));
        let report = FormulaEngine::default().recompute(&template(), &vars);
        // rate_adj fails, so diff evaluates with the stale rate_adj of 0
        assert_eq!(report.variables["rate_adj"], CellValue::Number(0.0));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, "rate_adj");
        assert_eq!(report.failures[0].error, FormulaError::NotNumeric("rate".into()));
    }

    #[test]
    fn unknown_identifier_is_a_parse_failure() {
        let mut tpl = template();
        if let Some(logic) = tpl.calc_logic.as_mut() {
            logic.steps.push(Derivation::new("x", "undeclared + 1"));
        }
        let report = FormulaEngine::default().recompute(&tpl, &inputs());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.is_parse_error());
        assert!(!report.variables.contains_key("x"));
    }

    #[test]
    fn apply_projects_into_grid() {
        let mut tpl = template();
        let mut vars = inputs();
        let failures = FormulaEngine::default().apply(&mut tpl, &mut vars);
        assert!(failures.is_empty());
        let grid = tpl.grid.as_ref().unwrap();
        assert_eq!(grid.cell(2, "igst").unwrap().value, CellValue::Number(80.0));
        assert_eq!(vars["diff"], CellValue::Number(80.0));
    }

    #[test]
    fn converges_early_without_changes() {
        let tpl = IssueTemplate::new("T-2", "").with_variable("a", 1.0);
        let report = FormulaEngine::default().recompute(&tpl, &Variables::new());
        assert_eq!(report.passes, 1);
    }
}
