//! Combine plans: which files to merge, on which identifier, with which
//! prefixes
//!
//! Plans are stored as JSON so a merge can be repeated without retyping the
//! file list.

use crate::codec::{CodecOptions, Format};
use crate::error::{Error, Result};
use crate::merger::{FileDescriptor, MergeOptions};
use crate::scanner::load_file;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One input file of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFile {
    /// Path to the file; relative paths are resolved against a base directory
    pub path: PathBuf,
    /// Dot-notation path of the identifier field
    pub id_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Display name used in warnings (defaults to the file name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PlanFile {
    /// Create a new plan entry
    pub fn new(path: impl Into<PathBuf>, id_field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_field: id_field.into(),
            prefix: None,
            name: None,
        }
    }

    /// Parse `path:id_field[:prefix]`
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.splitn(3, ':').collect();
        if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidArgument(format!(
                "invalid file spec '{}', expected 'path:id_field[:prefix]'",
                spec
            )));
        }

        Ok(Self {
            path: PathBuf::from(parts[0]),
            id_field: parts[1].to_string(),
            prefix: parts.get(2).filter(|p| !p.is_empty()).map(|p| p.to_string()),
            name: None,
        })
    }
}

/// A saved combine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinePlan {
    pub files: Vec<PlanFile>,
    /// Where to write the combined output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Output format (defaults to the output extension, then JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default)]
    pub codec: CodecOptions,
    #[serde(default)]
    pub merge: MergeOptions,
}

impl CombinePlan {
    /// Create a plan over the given files
    pub fn new(files: Vec<PlanFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    /// Load a plan from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the plan to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Output format: explicit, else from the output extension, else JSON
    pub fn output_format(&self) -> Format {
        self.format
            .or_else(|| self.output.as_ref().and_then(Format::from_path))
            .unwrap_or(Format::Json)
    }

    /// Load every file and build the merge inputs
    ///
    /// Relative paths are resolved against `base_dir`. Each descriptor's
    /// identity is its resolved path.
    pub fn descriptors(&self, base_dir: &Path) -> Result<Vec<FileDescriptor>> {
        if self.files.is_empty() {
            return Err(Error::InvalidArgument("plan lists no files".to_string()));
        }

        self.files
            .iter()
            .map(|file| {
                let path = base_dir.join(&file.path);
                let loaded = load_file(&path, &self.codec)?;
                let name = file.name.clone().unwrap_or_else(|| loaded.file_name());

                let mut descriptor =
                    FileDescriptor::new(path.display().to_string(), loaded.records, &file.id_field)
                        .with_display_name(name);
                if let Some(prefix) = &file.prefix {
                    descriptor = descriptor.with_prefix(prefix);
                }
                Ok(descriptor)
            })
            .collect()
    }
}
