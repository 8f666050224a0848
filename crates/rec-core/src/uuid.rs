//! Version-4 UUID extraction from free text and record fields

use crate::path::get_value_by_path;
use crate::record::{is_falsy, render};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static UUID_V4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .unwrap()
});

static HYPHEN_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Strip outer hyphens and collapse inner hyphen runs
fn normalize_candidate(candidate: &str) -> String {
    let trimmed = candidate.trim_matches('-');
    HYPHEN_RUN.replace_all(trimmed, "-").into_owned()
}

fn is_valid_uuid(normalized: &str) -> bool {
    normalized.len() == 36 && UUID_V4.is_match(normalized)
}

/// Find every v4 UUID in `text`, in order of appearance
///
/// Any character other than hex digits and `-` separates candidates. A
/// candidate is accepted when it validates after hyphen normalization, and is
/// returned as it appeared in the text.
pub fn extract_uuids(text: &str) -> Vec<String> {
    let processed: String = text
        .chars()
        .map(|c| if c.is_ascii_hexdigit() || c == '-' { c } else { ' ' })
        .collect();

    processed
        .split(' ')
        .filter(|candidate| !candidate.is_empty())
        .filter(|candidate| is_valid_uuid(&normalize_candidate(candidate)))
        .map(str::to_string)
        .collect()
}

/// Extract UUIDs from one field of every record
///
/// Falsy field values are skipped; anything else is searched in its string
/// form.
pub fn extract_uuids_from_records(records: &[Value], field: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| {
            let value = get_value_by_path(record, field);
            (!is_falsy(value)).then(|| extract_uuids(&render(value)))
        })
        .flatten()
        .collect()
}
