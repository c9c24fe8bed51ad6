//! Persisted stage snapshot
//!
//! The record written at a workflow stage boundary and read back when the
//! next stage opens the case. Grid payloads stay raw [`Value`]s here; the
//! [`Normalizer`](crate::Normalizer) is what turns them into schemas.

use std::fmt;

use recon_schema::NarrativeSections;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::NormalizeError;

/// Stage that produced an issue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Origin {
    /// Discrepancy notice
    Scrutiny,
    /// Pre-notice intimation
    Asmt10,
    /// Added by hand from the SOP list
    ManualSop,
    /// Added by hand
    Manual,
    /// Formal notice
    #[default]
    Scn,
    /// Anything else, kept verbatim
    Other(String),
}

/// Lock-relevant family of an [`Origin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginKind {
    /// Carried forward from an upstream reference document
    UpstreamDerived,
    /// Added by an officer
    ManuallyAdded,
    /// Created at the current stage
    NoticeNative,
}

impl Origin {
    /// Wire form
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scrutiny => "SCRUTINY",
            Self::Asmt10 => "ASMT10",
            Self::ManualSop => "MANUAL_SOP",
            Self::Manual => "MANUAL",
            Self::Scn => "SCN",
            Self::Other(other) => other,
        }
    }

    /// Family used by the lock policy
    #[must_use]
    pub fn kind(&self) -> OriginKind {
        match self {
            Self::Scrutiny | Self::Asmt10 => OriginKind::UpstreamDerived,
            Self::ManualSop | Self::Manual => OriginKind::ManuallyAdded,
            Self::Scn | Self::Other(_) => OriginKind::NoticeNative,
        }
    }

    /// Produced from an upstream reference document
    #[inline]
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        self.kind() == OriginKind::UpstreamDerived
    }
}

impl From<String> for Origin {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SCRUTINY" => Self::Scrutiny,
            "ASMT10" | "ASMT-10" => Self::Asmt10,
            "MANUAL_SOP" => Self::ManualSop,
            "MANUAL" => Self::Manual,
            "SCN" | "" => Self::Scn,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Origin {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.as_str().to_string()
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial template carried inside a snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFragment {
    /// Embedded id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    /// Embedded name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_name: Option<String>,
    /// Grid payload, any recognized shape
    #[serde(default, alias = "grid", skip_serializing_if = "Option::is_none")]
    pub grid_data: Option<Value>,
    /// Narrative blocks
    #[serde(default, alias = "narrative_sections", skip_serializing_if = "Option::is_none")]
    pub narrative: Option<NarrativeSections>,
    /// Issue carries no table by design
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub narrative_only: bool,
}

/// Where a snapshot's grid payload was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSource {
    /// `template.grid_data`
    TemplateGridData,
    /// `grid_data`
    GridData,
    /// `table_data`
    TableData,
    /// `summary_table`
    SummaryTable,
}

impl fmt::Display for GridSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TemplateGridData => "template.grid_data",
            Self::GridData => "grid_data",
            Self::TableData => "table_data",
            Self::SummaryTable => "summary_table",
        })
    }
}

/// Stage snapshot of one issue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stored identifier, possibly a surrogate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<String>,
    /// Producing stage
    #[serde(default, deserialize_with = "null_as_default")]
    pub origin: Origin,
    /// Free-form status text
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Secondary reference point into the master index
    #[serde(
        default,
        deserialize_with = "lenient_point",
        skip_serializing_if = "Option::is_none"
    )]
    pub sop_point: Option<u64>,
    /// Attached template or legacy fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateFragment>,
    /// Grid payload, canonical or legacy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_data: Option<Value>,
    /// Positional legacy table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_data: Option<Value>,
    /// Header/rows legacy table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_table: Option<Value>,
    /// Frozen reference values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_grid_data: Option<Value>,
    /// Stored variable values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    /// Structural hash of the template, emitted on save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_schema_hash: Option<String>,
    /// Structural edit counter, emitted on save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_version: Option<u64>,
}

impl Snapshot {
    /// Parse a snapshot record
    ///
    /// # Errors
    /// Returns [`NormalizeError::InvalidSnapshot`] if `raw` is not an object
    /// or a field has an unusable type.
    pub fn from_json(raw: &Value) -> Result<Self, NormalizeError> {
        if !raw.is_object() {
            return Err(NormalizeError::invalid_snapshot("record is not an object"));
        }
        Self::deserialize(raw).map_err(|e| NormalizeError::invalid_snapshot(e.to_string()))
    }

    /// Stored id, when present and non-blank
    #[must_use]
    pub fn explicit_issue_id(&self) -> Option<&str> {
        non_blank(self.issue_id.as_deref())
    }

    /// Id embedded in the template fragment, when present and non-blank
    #[must_use]
    pub fn fragment_issue_id(&self) -> Option<&str> {
        non_blank(self.template.as_ref().and_then(|t| t.issue_id.as_deref()))
    }

    /// Display name from the fragment
    #[must_use]
    pub fn issue_name(&self) -> Option<&str> {
        non_blank(self.template.as_ref().and_then(|t| t.issue_name.as_deref()))
    }

    /// Fragment narrative, if any
    #[must_use]
    pub fn narrative(&self) -> Option<&NarrativeSections> {
        self.template.as_ref().and_then(|t| t.narrative.as_ref())
    }

    /// Fragment declares narrative-only
    #[must_use]
    pub fn narrative_only(&self) -> bool {
        self.template.as_ref().is_some_and(|t| t.narrative_only)
    }

    /// Grid payload by precedence: `template.grid_data`, `grid_data`,
    /// `table_data`, `summary_table`
    #[must_use]
    pub fn raw_grid(&self) -> Option<(&Value, GridSource)> {
        let fragment = self.template.as_ref().and_then(|t| t.grid_data.as_ref());
        [
            (fragment, GridSource::TemplateGridData),
            (self.grid_data.as_ref(), GridSource::GridData),
            (self.table_data.as_ref(), GridSource::TableData),
            (self.summary_table.as_ref(), GridSource::SummaryTable),
        ]
        .into_iter()
        .find_map(|(value, source)| value.filter(|v| !is_vacant(v)).map(|v| (v, source)))
    }

    /// Every stored grid payload, for content digests
    pub fn grid_payloads(&self) -> impl Iterator<Item = &Value> {
        let fragment = self.template.as_ref().and_then(|t| t.grid_data.as_ref());
        [
            fragment,
            self.grid_data.as_ref(),
            self.table_data.as_ref(),
            self.summary_table.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Reference points were written as numbers and as numeric strings
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_point<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn origin_wire_forms() {
        assert_eq!(Origin::from("ASMT-10"), Origin::Asmt10);
        assert_eq!(Origin::from("scrutiny"), Origin::Scrutiny);
        assert_eq!(Origin::from("DRC01"), Origin::Other("DRC01".into()));
        assert_eq!(String::from(Origin::ManualSop), "MANUAL_SOP");
        assert!(Origin::Asmt10.is_upstream());
        assert_eq!(Origin::Manual.kind(), OriginKind::ManuallyAdded);
        assert_eq!(Origin::Other("X".into()).kind(), OriginKind::NoticeNative);
    }

    #[test]
    fn nulls_and_missing_fields_default() {
        let snap = Snapshot::from_json(&json!({
            "issue_id": null,
            "origin": null,
            "status": null,
            "grid_data": null,
            "variables": null
        }))
        .unwrap();
        assert_eq!(snap.origin, Origin::Scn);
        assert!(snap.explicit_issue_id().is_none());
        assert!(snap.raw_grid().is_none());
    }

    #[test]
    fn grid_precedence() {
        let snap = Snapshot::from_json(&json!({
            "template": {"grid_data": [1]},
            "grid_data": [2],
            "table_data": [3]
        }))
        .unwrap();
        assert_eq!(snap.raw_grid().unwrap().1, GridSource::TemplateGridData);

        let snap = Snapshot::from_json(&json!({
            "template": {"issue_name": "x"},
            "grid_data": [],
            "table_data": [[1]],
            "summary_table": {"headers": ["a"], "rows": []}
        }))
        .unwrap();
        assert_eq!(snap.raw_grid().unwrap().1, GridSource::TableData);
    }

    #[test]
    fn sop_point_accepts_strings() {
        let snap = Snapshot::from_json(&json!({"sop_point": "7"})).unwrap();
        assert_eq!(snap.sop_point, Some(7));
        let snap = Snapshot::from_json(&json!({"sop_point": 3.0})).unwrap();
        assert_eq!(snap.sop_point, Some(3));
        let snap = Snapshot::from_json(&json!({"sop_point": "n/a"})).unwrap();
        assert_eq!(snap.sop_point, None);
    }

    #[test]
    fn blank_ids_are_absent() {
        let snap = Snapshot::from_json(&json!({"issue_id": "  ", "template": {"issue_id": "GST-9"}})).unwrap();
        assert!(snap.explicit_issue_id().is_none());
        assert_eq!(snap.fragment_issue_id(), Some("GST-9"));
    }

    #[test]
    fn non_object_rejected() {
        assert!(Snapshot::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn serializes_origin_as_wire_string() {
        let snap = Snapshot {
            origin: Origin::Asmt10,
            ..Snapshot::default()
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["origin"], "ASMT10");
        assert!(json.get("issue_id").is_none());
    }
}
