//! Record-set transforms: filtering, field removal, deduplication,
//! backfilling, splitting and key/value mapping
//!
//! Text comparisons all go through [`normalize_string`], so matching is
//! case-insensitive and ignores punctuation and repeated whitespace.

use crate::error::{Error, Result};
use crate::path::get_value_by_path;
use crate::record::{is_empty_value, is_falsy, is_strictly_empty, render, render_value, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Normalize text for matching
///
/// Lowercases, turns every character that is not alphanumeric, `_` or
/// whitespace into a space, collapses whitespace runs and trims the ends.
pub fn normalize_string(s: &str) -> String {
    let replaced: String = s
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a field value for matching; falsy values normalize to `""`
pub fn normalize_value(value: Option<&Value>) -> String {
    if is_falsy(value) {
        return String::new();
    }
    normalize_string(&render(value))
}

/// Loose numeric reading of a value (NaN when it has none)
fn to_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => str_to_number(s),
        Some(_) => f64::NAN,
    }
}

fn str_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        0.0
    } else {
        trimmed.parse().unwrap_or(f64::NAN)
    }
}

/// Comparison applied by a [`Condition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Comparison {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsEmpty,
    /// Normalized value appears in a reference record set
    InFile,
    NotInFile,
    /// Always matches; used to drop a field unconditionally
    Always,
}

impl FromStr for Comparison {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let comparison = match s.to_ascii_lowercase().as_str() {
            "equals" | "eq" => Comparison::Equals,
            "notequals" | "ne" => Comparison::NotEquals,
            "contains" => Comparison::Contains,
            "notcontains" => Comparison::NotContains,
            "startswith" => Comparison::StartsWith,
            "endswith" => Comparison::EndsWith,
            "greaterthan" | "gt" => Comparison::GreaterThan,
            "lessthan" | "lt" => Comparison::LessThan,
            "isempty" => Comparison::IsEmpty,
            "infile" => Comparison::InFile,
            "notinfile" => Comparison::NotInFile,
            "always" => Comparison::Always,
            _ => return Err(Error::InvalidArgument(format!("unknown comparison '{}'", s))),
        };
        Ok(comparison)
    }
}

/// Normalized values of one field across a reference record set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet(HashSet<String>);

impl ReferenceSet {
    /// Collect the normalized string form of `field` from every record
    pub fn from_records(records: &[Value], field: &str) -> Self {
        Self(
            records
                .iter()
                .map(|row| normalize_string(&render(get_value_by_path(row, field))))
                .collect(),
        )
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.0.contains(normalized)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single test against one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub comparison: Comparison,
    #[serde(default)]
    pub value: String,
    /// Lookup set for `InFile` / `NotInFile`
    #[serde(skip)]
    pub reference: Option<ReferenceSet>,
}

impl Condition {
    /// Create a new condition
    pub fn new(field: impl Into<String>, comparison: Comparison, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            comparison,
            value: value.into(),
            reference: None,
        }
    }

    /// Attach the lookup set used by file comparisons
    pub fn with_reference(mut self, reference: ReferenceSet) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Parse `field:comparison[:value]`
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.splitn(3, ':').collect();
        if parts.len() < 2 || parts[0].is_empty() {
            return Err(Error::InvalidArgument(format!(
                "invalid condition '{}', expected 'field:comparison[:value]'",
                spec
            )));
        }
        let comparison = parts[1].parse()?;
        Ok(Self::new(parts[0], comparison, parts.get(2).copied().unwrap_or("")))
    }

    /// Test a resolved field value
    pub fn matches(&self, value: Option<&Value>) -> bool {
        if self.comparison == Comparison::Always {
            return true;
        }

        let normalized = normalize_string(&render(value));
        let expected = normalize_string(&self.value);

        match self.comparison {
            Comparison::Equals => normalized == expected,
            Comparison::NotEquals => normalized != expected,
            Comparison::Contains => normalized.contains(&expected),
            Comparison::NotContains => !normalized.contains(&expected),
            Comparison::StartsWith => normalized.starts_with(&expected),
            Comparison::EndsWith => normalized.ends_with(&expected),
            Comparison::GreaterThan => to_number(value) > str_to_number(&self.value),
            Comparison::LessThan => to_number(value) < str_to_number(&self.value),
            Comparison::IsEmpty => is_strictly_empty(value),
            Comparison::InFile => self
                .reference
                .as_ref()
                .map_or(false, |r| r.contains(&normalized)),
            Comparison::NotInFile => self
                .reference
                .as_ref()
                .map_or(true, |r| !r.contains(&normalized)),
            Comparison::Always => true,
        }
    }
}

/// How conditions in a group combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    #[default]
    And,
    Or,
}

/// Whether matching rows are kept or removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Keep,
    Remove,
}

/// A set of conditions combined with one operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub mode: FilterMode,
    pub conditions: Vec<Condition>,
}

impl FilterGroup {
    /// Create a group in keep mode
    pub fn new(operator: Operator, conditions: Vec<Condition>) -> Self {
        Self {
            operator,
            mode: FilterMode::Keep,
            conditions,
        }
    }

    /// Set the filter mode
    pub fn with_mode(mut self, mode: FilterMode) -> Self {
        self.mode = mode;
        self
    }

    fn combine<'a, I>(&self, mut conditions: I, value_for: impl Fn(&Condition) -> Option<&'a Value>) -> bool
    where
        I: Iterator<Item = &'a Condition>,
    {
        match self.operator {
            Operator::And => conditions.all(|c| c.matches(value_for(c))),
            Operator::Or => conditions.any(|c| c.matches(value_for(c))),
        }
    }

    /// Whether a record satisfies the group's conditions
    pub fn matches(&self, record: &Value) -> bool {
        self.combine(self.conditions.iter(), |c| get_value_by_path(record, &c.field))
    }
}

/// Keep (or, in remove mode, drop) the records matching a filter group
pub fn filter_records(records: &[Value], group: &FilterGroup) -> Vec<Value> {
    let filtered: Vec<Value> = records
        .iter()
        .filter(|record| {
            let matched = group.matches(record);
            match group.mode {
                FilterMode::Keep => matched,
                FilterMode::Remove => !matched,
            }
        })
        .cloned()
        .collect();

    tracing::debug!(before = records.len(), after = filtered.len(), "filtered records");
    filtered
}

/// Drop top-level fields whose conditions hold
///
/// Only conditions naming a field apply to it; fields without conditions are
/// always kept. Non-object records pass through unchanged.
pub fn remove_fields(records: &[Value], group: &FilterGroup) -> Vec<Value> {
    records
        .iter()
        .map(|record| {
            let Some(fields) = record.as_object() else {
                return record.clone();
            };

            let kept: Record = fields
                .iter()
                .filter(|(field, value)| {
                    let mut applicable = group
                        .conditions
                        .iter()
                        .filter(|c| c.field == **field)
                        .peekable();
                    if applicable.peek().is_none() {
                        return true;
                    }
                    !group.combine(applicable, |_| Some(*value))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            Value::Object(kept)
        })
        .collect()
}

/// Drop working records whose match value also appears in the reference set
pub fn deduplicate(
    working: &[Value],
    working_field: &str,
    reference: &[Value],
    reference_field: &str,
) -> Vec<Value> {
    let seen: HashSet<String> = reference
        .iter()
        .map(|row| normalize_value(get_value_by_path(row, reference_field)))
        .collect();

    let result: Vec<Value> = working
        .iter()
        .filter(|row| !seen.contains(&normalize_value(get_value_by_path(row, working_field))))
        .cloned()
        .collect();

    tracing::debug!(removed = working.len() - result.len(), "deduplicated records");
    result
}

/// Fields used by [`backfill`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSpec {
    pub working_match: String,
    pub reference_match: String,
    pub working_fill: String,
    pub reference_fill: String,
}

/// Result of [`backfill`]
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillOutcome {
    pub records: Vec<Value>,
    /// Number of records that received a value
    pub filled: usize,
}

/// Fill empty fields in the working set from matching reference records
///
/// Rows are matched on normalized match values; when several reference rows
/// share a match value the last one wins. The fill value is written to the
/// top-level key named by `working_fill`.
pub fn backfill(working: &[Value], reference: &[Value], spec: &BackfillSpec) -> BackfillOutcome {
    let lookup: HashMap<String, &Value> = reference
        .iter()
        .map(|row| (normalize_value(get_value_by_path(row, &spec.reference_match)), row))
        .collect();

    let mut filled = 0;
    let records = working
        .iter()
        .map(|row| {
            let Some(fields) = row.as_object() else {
                return row.clone();
            };
            if !is_empty_value(get_value_by_path(row, &spec.working_fill)) {
                return row.clone();
            }

            let key = normalize_value(get_value_by_path(row, &spec.working_match));
            let fill = lookup
                .get(&key)
                .and_then(|reference_row| get_value_by_path(reference_row, &spec.reference_fill));

            match fill {
                Some(value) => {
                    let mut updated = fields.clone();
                    updated.insert(spec.working_fill.clone(), value.clone());
                    filled += 1;
                    Value::Object(updated)
                }
                None => row.clone(),
            }
        })
        .collect();

    BackfillOutcome { records, filled }
}

/// Group records by the string form of a top-level field
///
/// Missing and null values group under `undefined`. Groups keep first-seen
/// order.
pub fn split_by_field(records: &[Value], field: &str) -> Vec<(String, Vec<Value>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();

    for record in records {
        let key = match record.as_object().and_then(|fields| fields.get(field)) {
            None | Some(Value::Null) => render(None),
            Some(value) => render_value(value),
        };
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record.clone());
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key).map(|group| (key, group)))
        .collect()
}

/// Build a lookup object from a key field to selected value fields
///
/// Missing value fields are omitted; later records overwrite earlier ones
/// with the same key.
pub fn map_values<S: AsRef<str>>(records: &[Value], key_field: &str, value_fields: &[S]) -> Record {
    let mut mapped = Record::new();
    for record in records {
        let key = render(get_value_by_path(record, key_field));
        let values: Record = value_fields
            .iter()
            .filter_map(|field| {
                let field = field.as_ref();
                get_value_by_path(record, field).map(|v| (field.to_string(), v.clone()))
            })
            .collect();
        mapped.insert(key, Value::Object(values));
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("HELLO World"), "hello world");
        assert_eq!(
            normalize_string("Hello, World! How are you?"),
            "hello world how are you"
        );
        assert_eq!(normalize_string("hello    world   test"), "hello world test");
        assert_eq!(normalize_string("  hello world  "), "hello world");
        assert_eq!(normalize_string("snake_case"), "snake_case");
    }

    #[test]
    fn test_normalize_value() {
        assert_eq!(normalize_value(None), "");
        assert_eq!(normalize_value(Some(&Value::Null)), "");
        assert_eq!(normalize_value(Some(&json!(42))), "42");
        assert_eq!(normalize_value(Some(&json!(true))), "true");
        assert_eq!(normalize_value(Some(&json!("Hi-There"))), "hi there");
    }

    #[test]
    fn test_condition_parse() {
        let c = Condition::parse("age:greaterThan:30").unwrap();
        assert_eq!(c.field, "age");
        assert_eq!(c.comparison, Comparison::GreaterThan);
        assert_eq!(c.value, "30");

        let c = Condition::parse("notes:isEmpty").unwrap();
        assert_eq!(c.comparison, Comparison::IsEmpty);
        assert_eq!(c.value, "");

        let c = Condition::parse("url:equals:http://x").unwrap();
        assert_eq!(c.value, "http://x");

        assert!(Condition::parse("nocomparison").is_err());
        assert!(Condition::parse("f:bogus:1").is_err());
    }

    #[test]
    fn test_condition_text_comparisons() {
        let v = json!("Hello, World");
        assert!(Condition::new("f", Comparison::Equals, "hello world").matches(Some(&v)));
        assert!(Condition::new("f", Comparison::Contains, "WORLD").matches(Some(&v)));
        assert!(Condition::new("f", Comparison::StartsWith, "hel").matches(Some(&v)));
        assert!(Condition::new("f", Comparison::EndsWith, "world!").matches(Some(&v)));
        assert!(Condition::new("f", Comparison::NotContains, "moon").matches(Some(&v)));
        assert!(!Condition::new("f", Comparison::NotEquals, "hello world").matches(Some(&v)));
    }

    #[test]
    fn test_condition_numeric_comparisons() {
        assert!(Condition::new("f", Comparison::GreaterThan, "10").matches(Some(&json!(11))));
        assert!(Condition::new("f", Comparison::LessThan, "10").matches(Some(&json!("9.5"))));
        assert!(!Condition::new("f", Comparison::GreaterThan, "10").matches(Some(&json!("abc"))));
        assert!(!Condition::new("f", Comparison::LessThan, "10").matches(None));
    }

    #[test]
    fn test_condition_is_empty() {
        let c = Condition::new("f", Comparison::IsEmpty, "");
        assert!(c.matches(None));
        assert!(c.matches(Some(&json!(""))));
        assert!(c.matches(Some(&json!([]))));
        assert!(c.matches(Some(&json!({}))));
        assert!(!c.matches(Some(&json!(0))));
    }

    #[test]
    fn test_condition_in_file() {
        let reference = vec![json!({"code": "A-1"}), json!({"code": "b 2"})];
        let set = ReferenceSet::from_records(&reference, "code");
        assert_eq!(set.len(), 2);

        let in_file = Condition::new("f", Comparison::InFile, "").with_reference(set.clone());
        assert!(in_file.matches(Some(&json!("a 1"))));
        assert!(!in_file.matches(Some(&json!("c"))));

        let not_in = Condition::new("f", Comparison::NotInFile, "").with_reference(set);
        assert!(not_in.matches(Some(&json!("c"))));

        // Without a lookup set nothing is "in" the file
        assert!(!Condition::new("f", Comparison::InFile, "").matches(Some(&json!("a 1"))));
        assert!(Condition::new("f", Comparison::NotInFile, "").matches(Some(&json!("a 1"))));
    }

    #[test]
    fn test_filter_keep_and_remove() {
        let data = vec![
            json!({"name": "John", "age": 30}),
            json!({"name": "Jane", "age": 25}),
            json!({"name": "Bob", "age": 40}),
        ];

        let group = FilterGroup::new(
            Operator::And,
            vec![Condition::new("age", Comparison::GreaterThan, "26")],
        );
        assert_eq!(
            filter_records(&data, &group),
            vec![data[0].clone(), data[2].clone()]
        );

        let group = group.with_mode(FilterMode::Remove);
        assert_eq!(filter_records(&data, &group), vec![data[1].clone()]);
    }

    #[test]
    fn test_filter_or_operator() {
        let data = vec![
            json!({"name": "John"}),
            json!({"name": "Jane"}),
            json!({"name": "Bob"}),
        ];
        let group = FilterGroup::new(
            Operator::Or,
            vec![
                Condition::new("name", Comparison::Equals, "john"),
                Condition::new("name", Comparison::Equals, "bob"),
            ],
        );
        assert_eq!(filter_records(&data, &group).len(), 2);
    }

    #[test]
    fn test_filter_nested_path() {
        let data = vec![
            json!({"user": {"city": "NY"}}),
            json!({"user": {"city": "SF"}}),
        ];
        let group = FilterGroup::new(
            Operator::And,
            vec![Condition::new("user.city", Comparison::Equals, "sf")],
        );
        assert_eq!(filter_records(&data, &group), vec![data[1].clone()]);
    }

    #[test]
    fn test_filter_group_from_json() {
        let group: FilterGroup = serde_json::from_value(json!({
            "operator": "OR",
            "mode": "remove",
            "conditions": [{"field": "a", "comparison": "notEquals", "value": "x"}]
        }))
        .unwrap();
        assert_eq!(group.operator, Operator::Or);
        assert_eq!(group.mode, FilterMode::Remove);
        assert_eq!(group.conditions[0].comparison, Comparison::NotEquals);
    }

    #[test]
    fn test_remove_fields() {
        let data = vec![
            json!({"id": 1, "notes": "", "tmp": "x", "name": "John"}),
            json!({"id": 2, "notes": "keep me", "tmp": "y"}),
        ];
        let group = FilterGroup::new(
            Operator::Or,
            vec![
                Condition::new("notes", Comparison::IsEmpty, ""),
                Condition::new("tmp", Comparison::Always, ""),
            ],
        );

        assert_eq!(
            remove_fields(&data, &group),
            vec![
                json!({"id": 1, "name": "John"}),
                json!({"id": 2, "notes": "keep me"})
            ]
        );
    }

    #[test]
    fn test_remove_fields_and_operator() {
        let data = vec![json!({"score": 5}), json!({"score": 50})];
        let group = FilterGroup::new(
            Operator::And,
            vec![
                Condition::new("score", Comparison::GreaterThan, "1"),
                Condition::new("score", Comparison::LessThan, "10"),
            ],
        );
        assert_eq!(remove_fields(&data, &group), vec![json!({}), json!({"score": 50})]);
    }

    #[test]
    fn test_deduplicate() {
        let working = vec![
            json!({"title": "Hello, World"}),
            json!({"title": "Other"}),
            json!({"title": "NEW"}),
        ];
        let reference = vec![json!({"t": "hello world"}), json!({"t": "other!"})];

        assert_eq!(
            deduplicate(&working, "title", &reference, "t"),
            vec![json!({"title": "NEW"})]
        );
    }

    #[test]
    fn test_backfill() {
        let working = vec![
            json!({"id": "A", "email": ""}),
            json!({"id": "B", "email": "b@x"}),
            json!({"id": "C"}),
            json!({"id": "D", "email": null}),
        ];
        let reference = vec![
            json!({"key": "a", "contact": {"email": "old@x"}}),
            json!({"key": "a", "contact": {"email": "a@x"}}),
            json!({"key": "b", "contact": {"email": "other@x"}}),
            json!({"key": "c", "contact": {"email": "c@x"}}),
        ];
        let spec = BackfillSpec {
            working_match: "id".to_string(),
            reference_match: "key".to_string(),
            working_fill: "email".to_string(),
            reference_fill: "contact.email".to_string(),
        };

        let outcome = backfill(&working, &reference, &spec);
        assert_eq!(outcome.filled, 2);
        assert_eq!(
            outcome.records,
            vec![
                json!({"id": "A", "email": "a@x"}),
                json!({"id": "B", "email": "b@x"}),
                json!({"id": "C", "email": "c@x"}),
                json!({"id": "D", "email": null}),
            ]
        );
    }

    #[test]
    fn test_split_by_field() {
        let data = vec![
            json!({"lang": "en", "n": 1}),
            json!({"lang": "fr", "n": 2}),
            json!({"n": 3}),
            json!({"lang": "en", "n": 4}),
        ];

        let groups = split_by_field(&data, "lang");
        let keys: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["en", "fr", "undefined"]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_map_values() {
        let data = vec![
            json!({"id": 1, "name": "John", "meta": {"age": 30}}),
            json!({"id": 2, "name": "Jane"}),
        ];

        let mapped = map_values(&data, "id", &["name", "meta.age"]);
        assert_eq!(
            Value::Object(mapped),
            json!({
                "1": {"name": "John", "meta.age": 30},
                "2": {"name": "Jane"}
            })
        );
    }
}
