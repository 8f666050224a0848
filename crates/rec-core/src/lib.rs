//! rec-core: Core library for parsing, transforming and merging record files
//!
//! This library provides functionality to:
//! - Parse CSV, JSON and JSONL content into records and serialize them back
//! - Address fields inside nested records with dot-notation paths
//! - Merge records from several files on an identifier field, splitting
//!   conflicting fields by per-file prefixes
//! - Analyze field emptiness and uniqueness
//! - Filter, deduplicate, backfill, split and map record sets
//! - Extract UUIDs, scan directories for record files and write results

pub mod analyzer;
pub mod codec;
pub mod error;
pub mod export;
pub mod merger;
pub mod path;
pub mod plan;
pub mod record;
pub mod scanner;
pub mod transform;
pub mod uuid;

pub use analyzer::{analyze_field, analyze_field_details, analyze_fields, FieldAnalysis, FieldAnalysisDetail};
pub use codec::{
    count_rows, flatten, flatten_value, parse, parse_with, serialize, serialize_str, CodecOptions,
    Format, JsonlMode,
};
pub use error::{Error, Result};
pub use merger::{combine, combine_with, CombineResult, FileDescriptor, MergeOptions, ValueEquality};
pub use path::{enumerate_paths, get_value_by_path};
pub use plan::{CombinePlan, PlanFile};
pub use record::Record;
pub use scanner::{load_file, load_file_as, scan_directory, LoadedFile, ScanResult, ScannedFile};
pub use transform::{
    backfill, deduplicate, filter_records, map_values, normalize_string, remove_fields,
    split_by_field, BackfillOutcome, BackfillSpec, Comparison, Condition, FilterGroup, FilterMode,
    Operator, ReferenceSet,
};
pub use uuid::{extract_uuids, extract_uuids_from_records};
