//! Parsers and serializers for CSV, JSON and JSONL record files

use crate::error::{Error, Result};
use crate::path::join_path;
use crate::record::{parse_cell, render_value, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

const BOM: char = '\u{feff}';

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Json,
    Jsonl,
}

impl Format {
    /// File extension (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Jsonl => "jsonl",
        }
    }

    /// Infer the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            "jsonl" => Ok(Format::Jsonl),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How malformed JSONL lines are handled
///
/// Two policies exist because files in the wild are often partially broken.
/// `Strict` is the default: the first malformed line fails the whole parse
/// and the error carries the line number and text. `Lenient` must be asked
/// for explicitly; it drops malformed lines and logs a warning for each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonlMode {
    #[default]
    Strict,
    Lenient,
}

/// Options controlling parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    #[serde(default)]
    pub jsonl_mode: JsonlMode,
}

impl CodecOptions {
    /// Options with lenient JSONL parsing
    pub fn lenient() -> Self {
        Self {
            jsonl_mode: JsonlMode::Lenient,
        }
    }
}

/// Parse raw file content into records using default options
pub fn parse(content: &str, format: Format) -> Result<Vec<Value>> {
    parse_with(content, format, &CodecOptions::default())
}

/// Parse raw file content into records
pub fn parse_with(content: &str, format: Format, options: &CodecOptions) -> Result<Vec<Value>> {
    let records = match format {
        Format::Csv => parse_csv_str(content)?,
        Format::Json => parse_json_str(content)?,
        Format::Jsonl => parse_jsonl_str(content, options.jsonl_mode)?,
    };
    tracing::debug!(%format, records = records.len(), "parsed content");
    Ok(records)
}

/// Parse CSV content; the first row is the header
pub fn parse_csv_str(content: &str) -> Result<Vec<Value>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(content.as_bytes());

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches(BOM).to_string())
        .collect();

    if headers.is_empty() {
        return Err(Error::CsvParse {
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            tracing::warn!(column = %header, "duplicate column name, the last one wins");
        }
    }

    let mut records = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let row = result?;

        // Rows with nothing but empty cells carry no data
        if row.iter().all(str::is_empty) {
            continue;
        }

        if row.len() > headers.len() {
            tracing::warn!(
                row = row_idx + 1,
                cells = row.len(),
                columns = headers.len(),
                "row has more cells than columns, truncating"
            );
        }

        // Short rows are padded with empty (null) cells
        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).map_or(Value::Null, parse_cell);
            record.insert(header.clone(), cell);
        }

        records.push(Value::Object(record));
    }

    Ok(records)
}

/// Parse a JSON document into a record set
///
/// An array is taken verbatim. An object with numeric keys is an index map
/// and yields the numerically keyed values in ascending key order; any other
/// object or scalar becomes a single-element record set.
pub fn parse_json_str(content: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(content).map_err(Error::JsonParse)?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) if !map.keys().any(|key| is_index_key(key)) => {
            Ok(vec![Value::Object(map)])
        }
        Value::Object(map) => {
            let mut indexed: Vec<(String, Value)> = map
                .into_iter()
                .filter(|(key, _)| is_index_key(key))
                .collect();

            indexed.sort_by(|(a, _), (b, _)| index_order(a).cmp(&index_order(b)));
            Ok(indexed.into_iter().map(|(_, v)| v).collect())
        }
        scalar => Ok(vec![scalar]),
    }
}

fn is_index_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Sort key comparing digit strings by numeric value without overflow
fn index_order(key: &str) -> (usize, &str) {
    let significant = key.trim_start_matches('0');
    (significant.len(), significant)
}

/// Parse JSONL content, one JSON value per non-blank line
pub fn parse_jsonl_str(content: &str, mode: JsonlMode) -> Result<Vec<Value>> {
    let cleaned = content
        .strip_prefix(BOM)
        .unwrap_or(content)
        .replace("\r\n", "\n");

    let mut records = Vec::new();
    for (idx, line) in cleaned
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .enumerate()
    {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(source) => match mode {
                JsonlMode::Strict => {
                    return Err(Error::JsonlLine {
                        line: idx + 1,
                        content: line.to_string(),
                        source,
                    });
                }
                JsonlMode::Lenient => {
                    tracing::warn!(line = idx + 1, error = %source, "skipping malformed JSONL line");
                }
            },
        }
    }

    Ok(records)
}

/// Flatten nested objects into dot-joined keys
///
/// Arrays and scalars are kept as-is at their computed key; an empty nested
/// object contributes no keys.
pub fn flatten(record: &Record) -> Record {
    let mut flat = Record::new();
    flatten_into(record, "", &mut flat);
    flat
}

fn flatten_into(record: &Record, prefix: &str, flat: &mut Record) {
    for (key, value) in record {
        let path = join_path(prefix, key);
        match value {
            Value::Object(nested) => flatten_into(nested, &path, flat),
            other => {
                flat.insert(path, other.clone());
            }
        }
    }
}

/// Flatten a record-set element; non-object elements have no fields
pub fn flatten_value(value: &Value) -> Record {
    value.as_object().map(flatten).unwrap_or_default()
}

/// Serialize records into the given format
pub fn serialize(records: &[Value], format: Format) -> Result<String> {
    let output = match format {
        Format::Json => serde_json::to_string_pretty(records)?,
        Format::Jsonl => records
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?
            .join("\n"),
        Format::Csv => serialize_csv(records)?,
    };
    tracing::debug!(%format, records = records.len(), bytes = output.len(), "serialized records");
    Ok(output)
}

/// Serialize records into a format named by a string tag
pub fn serialize_str(records: &[Value], format: &str) -> Result<String> {
    serialize(records, format.parse()?)
}

/// Render records as CSV with a header row
///
/// Every record is flattened first, so nested structure is lost. The header
/// is the union of flattened keys in the order they were first seen.
pub fn serialize_csv(records: &[Value]) -> Result<String> {
    let flattened: Vec<Record> = records.iter().map(flatten_value).collect();

    let mut header: Vec<&str> = Vec::new();
    for record in &flattened {
        for key in record.keys() {
            if !header.contains(&key.as_str()) {
                header.push(key);
            }
        }
    }

    if header.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&header)?;
    for record in &flattened {
        let row: Vec<String> = header
            .iter()
            .map(|key| record.get(*key).map(csv_cell).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    let mut output = String::from_utf8(bytes).map_err(|e| Error::CsvParse {
        message: e.to_string(),
    })?;
    if output.ends_with('\n') {
        output.pop();
    }
    Ok(output)
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        other => render_value(other),
    }
}

/// Count data rows in raw content
///
/// For CSV this is the number of non-empty rows minus the header row; for
/// JSON and JSONL it is the length of the parsed record set.
pub fn count_rows(content: &str, format: Format) -> Result<usize> {
    match format {
        Format::Csv => {
            let mut csv_reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(content.as_bytes());
            let mut rows = 0usize;
            for result in csv_reader.records() {
                result?;
                rows += 1;
            }
            Ok(rows.saturating_sub(1))
        }
        Format::Json | Format::Jsonl => Ok(parse(content, format)?.len()),
    }
}
