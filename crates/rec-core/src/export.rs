//! Writing record sets back to disk
//!
//! Output names follow one convention: a stem, an ISO-8601 timestamp with
//! `:` and `.` replaced by `-`, and the format's extension.

use crate::codec::{serialize, Format};
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Timestamp usable inside a file name (`2024-03-05T10-20-30-123Z`)
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// `<stem>_<timestamp>.<ext>`
pub fn timestamped_file_name(stem: &str, format: Format, now: DateTime<Utc>) -> String {
    format!("{}_{}.{}", stem, file_timestamp(now), format.extension())
}

/// File name for one group of a split: `<field>_<key>.<ext>`
///
/// Characters in the key other than ASCII letters and digits become `_` and
/// the key is lowercased.
pub fn split_file_name(field: &str, key: &str, format: Format) -> String {
    format!("{}.{}", split_file_stem(field, key), format.extension())
}

fn split_file_stem(field: &str, key: &str) -> String {
    let sanitized: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}_{}", field, sanitized)
}

/// Serialize records and write them to `path`
pub fn write_records<P: AsRef<Path>>(path: P, records: &[Value], format: Format) -> Result<()> {
    let path = path.as_ref();
    let content = serialize(records, format)?;
    fs::write(path, content)?;
    tracing::debug!(path = %path.display(), records = records.len(), %format, "wrote records");
    Ok(())
}

/// Write each split group to its own file inside `dir`
///
/// The directory is created if needed. Returns the written paths in group
/// order. Keys that sanitize to the same name get `_2`, `_3`, ... appended
/// so no group overwrites another.
pub fn write_split<P: AsRef<Path>>(
    dir: P,
    field: &str,
    groups: &[(String, Vec<Value>)],
    format: Format,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if dir.exists() && !dir.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "'{}' exists and is not a directory",
            dir.display()
        )));
    }
    fs::create_dir_all(dir)?;

    let mut used = HashSet::new();
    groups
        .iter()
        .map(|(key, records)| {
            let stem = split_file_stem(field, key);
            let mut name = format!("{}.{}", stem, format.extension());
            let mut n = 2;
            while !used.insert(name.clone()) {
                name = format!("{}_{}.{}", stem, n, format.extension());
                n += 1;
            }
            if n > 2 {
                tracing::warn!(key = %key, file = %name, "split key collides with another group, renamed");
            }
            let path = dir.join(name);
            write_records(&path, records, format)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 20, 30).unwrap() + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn test_file_timestamp() {
        assert_eq!(file_timestamp(fixed_time()), "2024-03-05T10-20-30-123Z");
    }

    #[test]
    fn test_timestamped_file_name() {
        assert_eq!(
            timestamped_file_name("combined", Format::Jsonl, fixed_time()),
            "combined_2024-03-05T10-20-30-123Z.jsonl"
        );
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(split_file_name("lang", "en-US", Format::Csv), "lang_en_us.csv");
        assert_eq!(split_file_name("city", "São Paulo", Format::Json), "city_s_o_paulo.json");
    }

    #[test]
    fn test_write_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        write_records(&path, &[json!({"a": 1, "b": {"c": 2}})], Format::Csv).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b.c\n1,2");
    }

    #[test]
    fn test_write_split() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("parts");
        let groups = vec![
            ("en".to_string(), vec![json!({"lang": "en"})]),
            ("undefined".to_string(), vec![json!({})]),
        ];

        let written = write_split(&out, "lang", &groups, Format::Jsonl).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("lang_en.jsonl"));
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "{\"lang\":\"en\"}");
        assert_eq!(fs::read_to_string(&written[1]).unwrap(), "{}");
    }

    #[test]
    fn test_write_split_colliding_keys() {
        let dir = TempDir::new().unwrap();
        let groups = crate::transform::split_by_field(
            &[json!({"city": "NY"}), json!({"city": "ny"}), json!({"city": "ny_2"})],
            "city",
        );

        let written = write_split(dir.path(), "city", &groups, Format::Json).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["city_ny.json", "city_ny_2.json", "city_ny_2_2.json"]);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "[\n  {\n    \"city\": \"NY\"\n  }\n]");
        assert_eq!(fs::read_to_string(&written[1]).unwrap(), "[\n  {\n    \"city\": \"ny\"\n  }\n]");
        assert!(written[2].exists());
    }

    #[test]
    fn test_write_split_rejects_file_target() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        fs::write(&file, "x").unwrap();

        assert!(write_split(&file, "f", &[], Format::Json).is_err());
    }
}
