//! Issue templates: the authoritative definition of an issue type
//!
//! A master template is authored once and shared read-only. Every live
//! issue owns its own copy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::grid::GridSchema;
use crate::hash::SchemaHash;
use crate::value::{CellValue, Variables};

/// The four narrative blocks of an issue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeSections {
    /// Facts of the case
    pub brief_facts: String,
    /// Grounds for the demand
    pub grounds: String,
    /// Legal provisions
    pub legal: String,
    /// Conclusion
    pub conclusion: String,
}

/// Selector for one narrative block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSection {
    /// `brief_facts`
    BriefFacts,
    /// `grounds`
    Grounds,
    /// `legal`
    Legal,
    /// `conclusion`
    Conclusion,
}

impl NarrativeSections {
    /// Read one block
    #[must_use]
    pub fn get(&self, section: NarrativeSection) -> &str {
        match section {
            NarrativeSection::BriefFacts => &self.brief_facts,
            NarrativeSection::Grounds => &self.grounds,
            NarrativeSection::Legal => &self.legal,
            NarrativeSection::Conclusion => &self.conclusion,
        }
    }

    /// Replace one block
    pub fn set(&mut self, section: NarrativeSection, text: impl Into<String>) {
        let slot = match section {
            NarrativeSection::BriefFacts => &mut self.brief_facts,
            NarrativeSection::Grounds => &mut self.grounds,
            NarrativeSection::Legal => &mut self.legal,
            NarrativeSection::Conclusion => &mut self.conclusion,
        };
        *slot = text.into();
    }

    /// All blocks empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.brief_facts.is_empty()
            && self.grounds.is_empty()
            && self.legal.is_empty()
            && self.conclusion.is_empty()
    }
}

/// One step of a template's derivation procedure: `target = expression`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    /// Variable written
    pub target: String,
    /// Expression over the variable namespace
    pub expression: String,
}

impl Derivation {
    /// New derivation step
    #[must_use]
    pub fn new(target: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            expression: expression.into(),
        }
    }
}

/// Ordered derivations evaluated after the grid's formula cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalcLogic {
    /// Steps in evaluation order
    pub steps: Vec<Derivation>,
}

/// Which variables feed the demand totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxDemandMapping {
    /// Variables summed into the tax total
    pub tax: Vec<String>,
    /// Variables summed into the interest total
    pub interest: Vec<String>,
    /// Variables summed into the penalty total
    pub penalty: Vec<String>,
}

impl TaxDemandMapping {
    /// No mapping declared at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tax.is_empty() && self.interest.is_empty() && self.penalty.is_empty()
    }

    /// Every mapped variable name
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.tax
            .iter()
            .chain(&self.interest)
            .chain(&self.penalty)
            .map(String::as_str)
    }
}

fn default_version() -> u32 {
    1
}

/// Definition of an issue: table structure, narrative, variables, derivations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueTemplate {
    /// Durable identifier
    pub issue_id: String,
    /// Display name
    #[serde(default)]
    pub issue_name: String,
    /// Figure table, absent for narrative-only issues
    #[serde(default, rename = "grid_data", alias = "grid", skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSchema>,
    /// Narrative blocks
    #[serde(default, rename = "narrative", alias = "narrative_sections")]
    pub narrative: NarrativeSections,
    /// Default variable values
    #[serde(default)]
    pub variables: Variables,
    /// Optional derivation procedure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calc_logic: Option<CalcLogic>,
    /// Demand total mapping
    #[serde(default)]
    pub tax_demand_mapping: TaxDemandMapping,
    /// Authoring version of the master
    #[serde(default = "default_version")]
    pub version: u32,
    /// Structural hash, refreshed by [`IssueTemplate::refresh_schema_hash`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_hash: Option<SchemaHash>,
    /// Issue carries no table by design
    #[serde(default)]
    pub narrative_only: bool,
}

impl IssueTemplate {
    /// Empty template
    #[must_use]
    pub fn new(issue_id: impl Into<String>, issue_name: impl Into<String>) -> Self {
        Self {
            issue_id: issue_id.into(),
            issue_name: issue_name.into(),
            grid: None,
            narrative: NarrativeSections::default(),
            variables: Variables::new(),
            calc_logic: None,
            tax_demand_mapping: TaxDemandMapping::default(),
            version: default_version(),
            schema_hash: None,
            narrative_only: false,
        }
    }

    /// Builder: attach a grid
    #[must_use]
    pub fn with_grid(mut self, grid: GridSchema) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Builder: mark narrative-only
    #[must_use]
    pub fn with_narrative_only(mut self, narrative_only: bool) -> Self {
        self.narrative_only = narrative_only;
        self
    }

    /// Builder: default variable
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Builder: demand mapping
    #[must_use]
    pub fn with_demand_mapping(mut self, mapping: TaxDemandMapping) -> Self {
        self.tax_demand_mapping = mapping;
        self
    }

    /// Builder: derivation procedure
    #[must_use]
    pub fn with_calc_logic(mut self, steps: Vec<Derivation>) -> Self {
        self.calc_logic = Some(CalcLogic { steps });
        self
    }

    /// Grid present with at least one row
    #[must_use]
    pub fn has_grid(&self) -> bool {
        self.grid.as_ref().is_some_and(|g| !g.is_empty())
    }

    /// Column labels of the grid, in order
    #[must_use]
    pub fn column_labels(&self) -> Vec<String> {
        self.grid.as_ref().map(GridSchema::column_labels).unwrap_or_default()
    }

    /// Every name a formula may reference
    ///
    /// Template defaults, grid bindings and derivation targets.
    #[must_use]
    pub fn variable_namespace(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.variables.keys().cloned().collect();
        if let Some(grid) = &self.grid {
            names.extend(grid.bound_cells().filter_map(|(_, _, cell)| cell.var.clone()));
        }
        if let Some(logic) = &self.calc_logic {
            names.extend(logic.steps.iter().map(|s| s.target.clone()));
        }
        names
    }

    /// Structural hash over grid structure, derivations, mapping and flags
    #[must_use]
    pub fn compute_schema_hash(&self) -> SchemaHash {
        let structure = serde_json::json!({
            "issue_id": self.issue_id,
            "grid": self.grid.as_ref().map(GridSchema::structure_json),
            "calc_logic": self.calc_logic,
            "tax_demand_mapping": self.tax_demand_mapping,
            "narrative_only": self.narrative_only,
        });
        SchemaHash::of_value(&structure)
    }

    /// Recompute and store the structural hash
    pub fn refresh_schema_hash(&mut self) -> SchemaHash {
        let hash = self.compute_schema_hash();
        self.schema_hash = Some(hash);
        hash
    }
}
