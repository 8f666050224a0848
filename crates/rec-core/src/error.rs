//! Error types for rec-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rec-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV content could not be turned into records
    #[error("failed to parse CSV: {message}")]
    CsvParse { message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON document
    #[error("failed to parse JSON: {0}")]
    JsonParse(#[source] serde_json::Error),

    /// Malformed line in a JSONL document (strict mode only)
    #[error("Invalid JSON on line {line}: {content}: {source}")]
    JsonlLine {
        line: usize,
        content: String,
        #[source]
        source: serde_json::Error,
    },

    /// Unknown format tag
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Two files disagree on a field and no prefix separates them
    #[error(
        "Conflict detected: Field \"{field}\" has different values for identifier \"{id}\". \
         Specify unique prefixes to prepend to conflicting fields."
    )]
    Conflict { field: String, id: String },

    /// Malformed user input (condition strings, file specs, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_names_field_and_id() {
        let err = Error::Conflict {
            field: "name".to_string(),
            id: "1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Conflict detected: Field \"name\" has different values"));
        assert!(msg.contains("identifier \"1\""));
        assert!(msg.contains("prefixes"));
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = Error::UnsupportedFormat("unknown".to_string());
        assert_eq!(err.to_string(), "Unsupported file type: unknown");
    }
}
