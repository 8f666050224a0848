//! Record and value helpers shared by every module
//!
//! Values are `serde_json::Value` (built with `preserve_order`, so object keys
//! keep their insertion order). A record set is a `Vec<Value>`: JSON input may
//! legitimately contain scalar elements, and every operation that needs fields
//! treats a non-object element as a record without fields.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

/// A single record: ordered mapping from top-level field name to value
pub type Record = Map<String, Value>;

/// Numeric lexical forms recognized in CSV cells (`30`, `-2.5`, `.5`, `1e3`)
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$").unwrap());

/// Largest magnitude below which every integer is representable as `f64`
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Borrow the fields of a value, if it is an object
pub fn as_record(value: &Value) -> Option<&Record> {
    value.as_object()
}

/// Parse a raw CSV cell into a dynamically typed value
///
/// Integers become integer numbers, other numeric forms become floats,
/// numbers too large to hold exactly are kept as strings,
/// `true`/`false` become booleans, an empty cell becomes null and anything
/// else is kept verbatim as a string.
pub fn parse_cell(s: &str) -> Value {
    if s.is_empty() {
        return Value::Null;
    }

    match s {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if NUMERIC.is_match(s) {
        let trimmed = s.trim();
        // Magnitudes past 2^53 cannot be held exactly and stay strings
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.abs() < MAX_EXACT_FLOAT {
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Value::Number(i.into());
                }
                if let Some(n) = Number::from_f64(f) {
                    return Value::Number(n);
                }
            }
        }
    }

    Value::String(s.to_string())
}

/// Render a number the way it reads in a spreadsheet cell
fn render_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }

    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Coerce a value to its string form
///
/// A missing value renders as `undefined`, null as `null`, arrays as their
/// rendered elements joined by commas and objects as `[object Object]`.
pub fn render(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(v) => render_value(v),
    }
}

/// Coerce a present value to its string form
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => render_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => render_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Missing, null, or a string that is blank after trimming
///
/// Numbers, booleans, arrays and objects are never blank, whatever they hold.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// [`is_blank`], plus empty arrays and empty objects
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        other => is_blank(other),
    }
}

/// Missing, null, the empty string, an empty array or an empty object
///
/// Unlike [`is_empty_value`], whitespace-only strings are not empty here.
pub fn is_strictly_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Whether a value would be considered false in a boolean context
pub fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f == 0.0 || f.is_nan()),
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
