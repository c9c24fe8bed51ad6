//! Recognized raw grid shapes
//!
//! [`RawGrid`] is the boundary type: stored grid payloads are classified
//! into one of these variants, then converted into the canonical schema.
//! Nothing past the normalizer sees anything but a `GridSchema`.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::NormalizeError;

/// Keys a `{value: ...}` wrapper may carry besides `value`
const WRAPPER_KEYS: [&str; 6] = ["value", "type", "var", "style", "formula", "provenance"];

/// Shape tag, for logs and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// `{columns, rows}`
    Canonical,
    /// `{headers, rows}`
    HeaderRows,
    /// list of lists / list of maps
    FlatRows,
    /// list of scalars
    Scalars,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Canonical => "canonical",
            Self::HeaderRows => "header_rows",
            Self::FlatRows => "flat_rows",
            Self::Scalars => "scalars",
        })
    }
}

/// A raw grid payload, classified
#[derive(Debug, Clone, PartialEq)]
pub enum RawGrid {
    /// Canonical object; columns may still be plain strings
    Canonical {
        /// Column objects or strings
        columns: Vec<Value>,
        /// Row objects, flat maps or positional lists
        rows: Vec<Value>,
        /// Declared row policy, if any
        row_policy: Option<Value>,
    },
    /// Scrutiny-style header/body block
    HeaderRows {
        /// Header texts
        headers: Vec<Value>,
        /// Positional lists or maps
        rows: Vec<Value>,
    },
    /// List of lists (first optionally a header) or list of maps
    FlatRows(Vec<Value>),
    /// List of scalars or value wrappers
    Scalars(Vec<Value>),
}

impl RawGrid {
    /// Classify `raw`, trying shapes in priority order
    ///
    /// A JSON-encoded string holding an object or array is decoded first;
    /// older writers stored tables that way.
    ///
    /// # Errors
    /// Returns [`NormalizeError::MalformedShape`] when no shape matches.
    pub fn detect(raw: &Value) -> Result<Self, NormalizeError> {
        match raw {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(decoded @ (Value::Array(_) | Value::Object(_))) => Self::detect(&decoded),
                _ => Err(NormalizeError::malformed("string is not an encoded table")),
            },
            Value::Object(map) => Self::detect_object(map),
            Value::Array(items) => Self::detect_array(items),
            Value::Null => Err(NormalizeError::malformed("null grid payload")),
            Value::Bool(_) | Value::Number(_) => {
                Err(NormalizeError::malformed("scalar at top level"))
            }
        }
    }

    fn detect_object(map: &Map<String, Value>) -> Result<Self, NormalizeError> {
        let rows = map
            .get("rows")
            .or_else(|| map.get("data"))
            .map(array_or_empty)
            .transpose()?;

        if let Some(Value::Array(columns)) = map.get("columns") {
            return Ok(Self::Canonical {
                columns: columns.clone(),
                rows: rows.unwrap_or_default(),
                row_policy: map.get("row_policy").cloned(),
            });
        }
        if let Some(Value::Array(headers)) = map.get("headers") {
            return Ok(Self::HeaderRows {
                headers: headers.clone(),
                rows: rows.unwrap_or_default(),
            });
        }
        Err(NormalizeError::malformed(format!(
            "object without columns or headers (keys: {})",
            map.keys().cloned().collect::<Vec<_>>().join(", ")
        )))
    }

    fn detect_array(items: &[Value]) -> Result<Self, NormalizeError> {
        if items.iter().all(is_scalar_like) {
            return Ok(Self::Scalars(items.to_vec()));
        }
        let all_lists = items.iter().all(Value::is_array);
        let all_maps = items.iter().all(|v| v.is_object() && !is_value_wrapper(v));
        if all_lists || all_maps {
            return Ok(Self::FlatRows(items.to_vec()));
        }
        Err(NormalizeError::malformed("array mixes rows of different kinds"))
    }

    /// Shape tag
    #[must_use]
    pub fn shape(&self) -> ShapeKind {
        match self {
            Self::Canonical { .. } => ShapeKind::Canonical,
            Self::HeaderRows { .. } => ShapeKind::HeaderRows,
            Self::FlatRows(_) => ShapeKind::FlatRows,
            Self::Scalars(_) => ShapeKind::Scalars,
        }
    }
}

fn array_or_empty(value: &Value) -> Result<Vec<Value>, NormalizeError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        _ => Err(NormalizeError::malformed("rows is not an array")),
    }
}

/// `{value: ...}` with nothing but cell metadata beside it
pub(crate) fn is_value_wrapper(value: &Value) -> bool {
    value.as_object().is_some_and(|map| {
        map.contains_key("value") && map.keys().all(|k| WRAPPER_KEYS.contains(&k.as_str()))
    })
}

fn is_scalar_like(value: &Value) -> bool {
    !value.is_array() && (!value.is_object() || is_value_wrapper(value))
}
