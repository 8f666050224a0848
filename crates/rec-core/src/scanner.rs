//! Directory scanner for discovering and loading record files

use crate::codec::{parse_with, CodecOptions, Format};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A record file found while scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Format inferred from the extension
    pub format: Format,
}

/// Result of scanning directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Root directories that were scanned
    pub roots: Vec<PathBuf>,
    /// Discovered files, sorted by path
    pub files: Vec<ScannedFile>,
}

impl ScanResult {
    /// Total number of files found
    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    /// Files of one format
    pub fn files_of(&self, format: Format) -> Vec<&ScannedFile> {
        self.files.iter().filter(|f| f.format == format).collect()
    }
}

/// Scan one or more directories for CSV, JSON and JSONL files
pub fn scan_directory<P: AsRef<Path>>(roots: &[P]) -> Result<ScanResult> {
    let mut files = Vec::new();

    for root in roots {
        let root = root.as_ref();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                // An unreadable root is fatal; anything below it is skipped
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(format) = Format::from_path(path) {
                files.push(ScannedFile {
                    path: path.to_path_buf(),
                    format,
                });
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    tracing::debug!(roots = roots.len(), files = files.len(), "scan complete");

    Ok(ScanResult {
        roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
        files,
    })
}

/// A file read from disk and parsed into records
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub format: Format,
    pub records: Vec<Value>,
}

impl LoadedFile {
    /// File name without directories, used as a display label
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Read the whole file and parse it with the format implied by its extension
pub fn load_file<P: AsRef<Path>>(path: P, options: &CodecOptions) -> Result<LoadedFile> {
    let path = path.as_ref();
    let format = Format::from_path(path).ok_or_else(|| {
        Error::UnsupportedFormat(
            path.extension()
                .map(|ext| ext.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        )
    })?;
    load_file_as(path, format, options)
}

/// Read the whole file and parse it as `format`
pub fn load_file_as<P: AsRef<Path>>(
    path: P,
    format: Format,
    options: &CodecOptions,
) -> Result<LoadedFile> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let records = parse_with(&content, format, options)?;

    Ok(LoadedFile {
        path: path.to_path_buf(),
        format,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_scan_finds_record_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(dir.path(), "b.csv", "a\n1");
        write(dir.path(), "a.json", "[]");
        write(dir.path(), "nested/c.jsonl", "{}");
        write(dir.path(), "notes.txt", "ignored");

        let result = scan_directory(&[dir.path()]).unwrap();
        assert_eq!(result.total_files(), 3);

        let names: Vec<String> = result
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.csv", "c.jsonl"]);
        assert_eq!(result.files_of(Format::Csv).len(), 1);
    }

    #[test]
    fn test_scan_same_root_twice() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.csv", "x\n1");

        let result = scan_directory(&[dir.path(), dir.path()]).unwrap();
        assert_eq!(result.total_files(), 1);
        assert_eq!(result.roots.len(), 2);
    }

    #[test]
    fn test_scan_missing_root() {
        let err = scan_directory(&["/definitely/not/a/dir"]).unwrap_err();
        assert!(matches!(err, Error::WalkDir(_)));
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "people.csv", "name,age\nJohn,30");

        let loaded = load_file(&path, &CodecOptions::default()).unwrap();
        assert_eq!(loaded.format, Format::Csv);
        assert_eq!(loaded.records, vec![json!({"name": "John", "age": 30})]);
        assert_eq!(loaded.file_name(), "people.csv");
    }

    #[test]
    fn test_load_file_lenient_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "rows.jsonl", "{\"a\":1}\nbroken\n{\"a\":2}");

        assert!(load_file(&path, &CodecOptions::default()).is_err());
        let loaded = load_file(&path, &CodecOptions::lenient()).unwrap();
        assert_eq!(loaded.records.len(), 2);
    }

    #[test]
    fn test_load_file_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "data.xml", "<a/>");

        let err = load_file(&path, &CodecOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref ext) if ext == "xml"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file("/definitely/not/here.json", &CodecOptions::default()).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
