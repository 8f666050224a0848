//! Per-field emptiness and uniqueness statistics

use crate::path::get_value_by_path;
use crate::record::{is_blank, is_empty_value, render, render_value};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Summary statistics for one field across a record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalysis {
    /// The analyzed field path
    pub name: String,
    pub non_empty_count: usize,
    pub empty_count: usize,
    /// Number of distinct (trimmed) non-empty values
    pub unique_values: usize,
}

/// One row in which the analyzed field is empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalysisDetail {
    /// String form of the row's identifier
    pub identifier: String,
    pub value: String,
    pub is_empty: bool,
}

/// Resolve a field for analysis
///
/// Nested objects are walked first; when that finds nothing, a literal
/// top-level key equal to the whole path is used instead, so records that
/// were flattened (`"user.name"` keys) still analyze.
fn lookup<'a>(record: &'a Value, field: &str) -> Option<&'a Value> {
    get_value_by_path(record, field).or_else(|| record.as_object()?.get(field))
}

/// Count empty, non-empty and distinct values of a field
///
/// Only missing values, null and blank strings count as empty here: `0`,
/// `false`, `[]` and `{}` are values.
pub fn analyze_field(records: &[Value], field: &str) -> FieldAnalysis {
    let mut unique: HashSet<String> = HashSet::new();
    let mut non_empty_count = 0;
    let mut empty_count = 0;

    for record in records {
        let value = lookup(record, field);
        if is_blank(value) {
            empty_count += 1;
        } else {
            non_empty_count += 1;
            unique.insert(render(value).trim().to_string());
        }
    }

    FieldAnalysis {
        name: field.to_string(),
        non_empty_count,
        empty_count,
        unique_values: unique.len(),
    }
}

/// Analyze every field in `fields`
pub fn analyze_fields<S: AsRef<str>>(records: &[Value], fields: &[S]) -> Vec<FieldAnalysis> {
    fields
        .iter()
        .map(|field| analyze_field(records, field.as_ref()))
        .collect()
}

/// List the rows in which a field is empty, with each row's identifier
///
/// Empty here also covers empty arrays and empty objects. Returns nothing if
/// there are no records or either path is empty.
pub fn analyze_field_details(
    records: &[Value],
    field: &str,
    identifier_field: &str,
) -> Vec<FieldAnalysisDetail> {
    if records.is_empty() || field.is_empty() || identifier_field.is_empty() {
        tracing::debug!(
            records = records.len(),
            field,
            identifier_field,
            "field details requested without required parameters"
        );
        return Vec::new();
    }

    let details: Vec<FieldAnalysisDetail> = records
        .iter()
        .filter(|record| is_empty_value(get_value_by_path(record, field)))
        .map(|record| FieldAnalysisDetail {
            identifier: get_value_by_path(record, identifier_field)
                .map(render_value)
                .unwrap_or_else(|| render(None)),
            value: String::new(),
            is_empty: true,
        })
        .collect();

    tracing::debug!(
        analyzed = records.len(),
        empty = details.len(),
        field,
        "field details complete"
    );

    details
}
