//! # Canonical JSON
//!
//! Stable serialization used to key positions. Two payloads with the same
//! field/value pairs produce the same string no matter how their keys were
//! inserted; any differing value, down to one character of free text,
//! produces a different string.
//!
//! The scheme follows RFC 8785 (JSON Canonicalization Scheme):
//!
//! 1. Object keys sorted by UTF-16 code units, recursively
//! 2. Integers without fraction or exponent
//! 3. Strings with minimal escaping
//! 4. No insignificant whitespace
//! 5. Arrays keep their element order
//!
//! ## References
//!
//! - RFC 8785, "JSON Canonicalization Scheme (JCS)"
//!   <https://www.rfc-editor.org/rfc/rfc8785>

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Canonical form of any JSON value.
///
/// ```rust
/// use rlcf_consensus::canonicalize::canonicalize;
/// use serde_json::json;
///
/// let a = canonicalize(&json!({"b": 1, "a": {"y": true, "x": null}}));
/// assert_eq!(a, r#"{"a":{"x":null,"y":true},"b":1}"#);
/// ```
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical form of a payload object, used directly as a position key.
pub fn canonical_key(payload: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_object(&mut out, payload);
    out
}

/// Human-readable label for a field value.
///
/// Strings are shown as-is; every other value uses its canonical form.
pub fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonicalize(other),
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|(a, _), (b, _)| compare_utf16(a, b));

    out.push('{');
    for (i, (k, v)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, k);
        out.push(':');
        write_value(out, v);
    }
    out.push('}');
}

fn write_number(out: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        // 1.0 and 1 are the same JSON number.
        if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            out.push_str(&(f as i64).to_string());
        } else if f.is_finite() {
            out.push_str(&f.to_string());
        } else {
            out.push_str("null");
        }
    } else {
        out.push_str(&n.to_string());
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn compare_utf16(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}
