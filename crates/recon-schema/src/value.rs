//! Cell values and the variable namespace

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resolved variable namespace of an issue
///
/// Ordered so that iteration, hashing and re-serialization are stable.
pub type Variables = BTreeMap<String, CellValue>;

/// A single cell value: number, text, or nothing
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Numeric figure
    Number(f64),
    /// Free text (labels, remarks, unparsed figures)
    Text(String),
    /// No value recorded
    #[default]
    Empty,
}

impl CellValue {
    /// Numeric zero, the default for freshly constructed input cells
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::Number(0.0)
    }

    /// Convert a raw JSON scalar (or `{value: ...}` wrapper) into a cell value
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => n.as_f64().map_or(Self::Empty, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            Value::Object(map) => map.get("value").map_or_else(
                || Self::Text(value.to_string()),
                Self::from_json,
            ),
            Value::Array(_) => Self::Text(value.to_string()),
        }
    }

    /// JSON form used on re-serialization
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Empty => Value::Null,
        }
    }

    /// Numeric reading of the value
    ///
    /// Text is accepted when it parses as a number after removing thousands
    /// separators and surrounding whitespace (`"5,000"` reads as `5000`).
    /// Only finite numbers count; `"nan"` and `"inf"` stay text.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => {
                let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse().ok()?
            }
            Self::Empty => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Text reading of the value, if it is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Empty, or text that is only whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// True for values that parse as numbers
    #[inline]
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Empty => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
