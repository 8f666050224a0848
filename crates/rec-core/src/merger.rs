//! Merge engine for combining records from several files by identifier
//!
//! Records sharing an identifier value are folded into one output record.
//! Each output field remembers the prefix of the file that supplied it; when
//! two files disagree on a field, the prefixes are used to split the field
//! into `"<prefix> <field>"` variants. A disagreement the prefixes cannot
//! separate aborts the whole merge.

use crate::error::{Error, Result};
use crate::path::get_value_by_path;
use crate::record::{render_value, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One input file for [`combine`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Unique token identifying the file
    pub identity: String,
    /// Human readable name used in warnings
    pub display_name: Option<String>,
    /// Parsed records, in file order
    pub records: Vec<Value>,
    /// Dot-notation path of the identifier field
    pub id_field: String,
    /// Prefix used to disambiguate this file's conflicting fields
    pub prefix: Option<String>,
}

impl FileDescriptor {
    /// Create a descriptor without display name or prefix
    pub fn new(
        identity: impl Into<String>,
        records: Vec<Value>,
        id_field: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            display_name: None,
            records,
            id_field: id_field.into(),
            prefix: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the conflict prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Name shown in warnings
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.identity)
    }

    fn prefix_str(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// How two candidate values for the same field are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEquality {
    /// Scalars compare by value; arrays and objects never compare equal,
    /// even when their contents match
    #[default]
    Identity,
    /// Structural comparison of arrays and objects
    Deep,
}

impl ValueEquality {
    fn same(self, a: &Value, b: &Value) -> bool {
        match (self, a, b) {
            (ValueEquality::Deep, _, _) => a == b,
            (_, Value::Null, Value::Null) => true,
            (_, Value::Bool(x), Value::Bool(y)) => x == y,
            (_, Value::String(x), Value::String(y)) => x == y,
            (_, Value::Number(x), Value::Number(y)) => {
                x == y || matches!((x.as_f64(), y.as_f64()), (Some(l), Some(r)) if l == r)
            }
            _ => false,
        }
    }
}

/// Options for [`combine_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    #[serde(default)]
    pub equality: ValueEquality,
}

/// Output of a successful merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombineResult {
    /// One record per identifier, in first-seen order
    pub combined: Vec<Record>,
    /// Non-fatal problems, in encounter order
    pub warnings: Vec<String>,
}

impl CombineResult {
    /// Number of combined records
    pub fn row_count(&self) -> usize {
        self.combined.len()
    }

    /// Combined records as a record set ready for serialization
    pub fn into_values(self) -> Vec<Value> {
        self.combined.into_iter().map(Value::Object).collect()
    }
}

/// Accumulated output for one identifier
#[derive(Debug, Default)]
struct MergedEntry {
    data: Record,
    /// Output field name -> prefix of the file that established it
    sources: HashMap<String, String>,
}

impl MergedEntry {
    fn merge_field(
        &mut self,
        key: &str,
        value: &Value,
        file_prefix: &str,
        id: &str,
        equality: ValueEquality,
    ) -> Result<()> {
        let Some(existing) = self.data.get(key) else {
            // First writer wins the bare key
            self.data.insert(key.to_string(), value.clone());
            self.sources.insert(key.to_string(), file_prefix.to_string());
            return Ok(());
        };

        if equality.same(existing, value) {
            return Ok(());
        }

        let existing_prefixed = match self.sources.get(key) {
            Some(source) if !source.is_empty() => format!("{} {}", source, key),
            _ => key.to_string(),
        };
        let new_prefixed = if file_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{} {}", file_prefix, key)
        };

        if existing_prefixed != key {
            if let Some(moved) = self.data.shift_remove(key) {
                self.data.insert(existing_prefixed, moved);
            }
            self.sources.remove(key);
        }

        match self.data.get(&new_prefixed) {
            None => {
                self.data.insert(new_prefixed.clone(), value.clone());
                self.sources.insert(new_prefixed, file_prefix.to_string());
                Ok(())
            }
            Some(current) if !equality.same(current, value) => Err(Error::Conflict {
                field: key.to_string(),
                id: id.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }
}

/// Combine records from several files using default options
pub fn combine(files: &[FileDescriptor]) -> Result<CombineResult> {
    combine_with(files, &MergeOptions::default())
}

/// Combine records from several files keyed by each file's identifier field
///
/// Records without an identifier (missing, null or empty string) are skipped
/// with a warning. The first unresolvable conflict fails the whole call.
pub fn combine_with(files: &[FileDescriptor], options: &MergeOptions) -> Result<CombineResult> {
    let mut warnings = Vec::new();
    let mut order: Vec<String> = Vec::new();
    let mut entries: HashMap<String, MergedEntry> = HashMap::new();

    for file in files {
        let prefix = file.prefix_str();

        for record in &file.records {
            let id_str = match get_value_by_path(record, &file.id_field) {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.is_empty() => None,
                Some(id) => Some(render_value(id)),
            };

            let Some(id_str) = id_str else {
                tracing::warn!(
                    field = %file.id_field,
                    source = %file.label(),
                    "record without identifier skipped"
                );
                warnings.push(format!(
                    "Missing identifier field \"{}\" in entry from {}",
                    file.id_field,
                    file.label()
                ));
                continue;
            };

            let entry = entries.entry(id_str.clone()).or_insert_with(|| {
                order.push(id_str.clone());
                MergedEntry::default()
            });

            let Some(fields) = record.as_object() else {
                continue;
            };

            for (key, value) in fields {
                if *key == file.id_field {
                    continue;
                }
                entry.merge_field(key, value, prefix, &id_str, options.equality)?;
            }
        }
    }

    let combined: Vec<Record> = order
        .iter()
        .filter_map(|id| entries.remove(id))
        .map(|entry| entry.data)
        .collect();

    tracing::debug!(
        files = files.len(),
        combined = combined.len(),
        warnings = warnings.len(),
        "combined files"
    );

    Ok(CombineResult { combined, warnings })
}
