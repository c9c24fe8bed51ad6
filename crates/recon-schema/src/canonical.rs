//! Canonical JSON encoding (sorted keys, no whitespace)
//!
//! Used wherever a digest must be stable across runs and across the key
//! order a record happened to be written with.

use serde_json::Value;

/// Render `value` with object keys sorted at every depth
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(key));
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => out.push_str(&quote(s)),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
    }
}

fn quote(s: &str) -> String {
    // Serializing a &str cannot fail.
    serde_json::to_string(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_are_sorted() {
        let value = json!({"z": {"b": 2, "a": 1}, "a": null});
        assert_eq!(canonical_json(&value), r#"{"a":null,"z":{"a":1,"b":2}}"#);
    }

    #[test]
    fn strings_are_escaped() {
        let value = json!(["say \"hi\""]);
        assert_eq!(canonical_json(&value), r#"["say \"hi\""]"#);
    }
}
