//! rec CLI
//!
//! Command-line tool for inspecting, converting, merging and cleaning CSV,
//! JSON and JSONL record files.

use clap::{Parser, Subcommand};
use rec_core::{
    analyze_field_details, analyze_fields, backfill, combine_with, count_rows, deduplicate,
    enumerate_paths, export, extract_uuids, extract_uuids_from_records, filter_records, load_file,
    map_values, remove_fields, scan_directory, serialize, split_by_field, BackfillSpec,
    CodecOptions, CombinePlan, Condition, Error, FilterGroup, FilterMode, Format, LoadedFile,
    MergeOptions, Operator, PlanFile, ReferenceSet, ValueEquality,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rec")]
#[command(about = "Record file toolkit for CSV, JSON and JSONL", long_about = None)]
#[command(version)]
struct Cli {
    /// Skip malformed JSONL lines instead of failing
    #[arg(long, global = true)]
    lenient: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and display its records
    Parse {
        /// Path to the record file
        file: PathBuf,

        /// Maximum number of records to display
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// List the field paths of a file's first record
    Paths {
        file: PathBuf,
    },

    /// Convert a file to another format
    Convert {
        file: PathBuf,

        /// Target format (csv, json or jsonl)
        #[arg(short, long)]
        to: String,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge several files on an identifier field
    Combine {
        /// Input as path:id_field[:prefix]
        #[arg(short, long)]
        file: Vec<String>,

        /// Path to a combine plan (JSON)
        #[arg(short, long, conflicts_with = "file")]
        plan: Option<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to the output extension, then json)
        #[arg(long)]
        format: Option<String>,

        /// Compare arrays and objects by content when checking conflicts
        #[arg(long)]
        deep: bool,
    },

    /// Create a combine plan file
    CreatePlan {
        /// Output path for the plan file
        #[arg(short, long)]
        output: PathBuf,

        /// Input as path:id_field[:prefix]
        #[arg(short, long)]
        file: Vec<String>,

        /// Where the combined records should be written
        #[arg(long)]
        combined: Option<PathBuf>,
    },

    /// Show empty, non-empty and unique counts per field
    Stats {
        file: PathBuf,

        /// Fields to analyze (all paths of the first record if omitted)
        #[arg(short, long)]
        field: Vec<String>,
    },

    /// List the rows in which a field is empty
    Details {
        file: PathBuf,

        /// Field to analyze
        #[arg(short, long)]
        field: String,

        /// Field identifying each row
        #[arg(short, long)]
        id: String,
    },

    /// Keep or remove records matching conditions
    Filter {
        file: PathBuf,

        /// Condition as field:comparison[:value]
        #[arg(short, long, required = true)]
        condition: Vec<String>,

        /// Match when any condition holds (default: all)
        #[arg(long)]
        any: bool,

        /// Remove matching records instead of keeping them
        #[arg(long)]
        remove: bool,

        /// Reference file for inFile / notInFile conditions
        #[arg(long, requires = "reference_field")]
        reference: Option<PathBuf>,

        /// Field of the reference file to look values up in
        #[arg(long)]
        reference_field: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Drop fields whose values match conditions
    DropFields {
        file: PathBuf,

        /// Condition as field:comparison[:value]
        #[arg(short, long, required = true)]
        condition: Vec<String>,

        /// Drop when any condition on the field holds (default: all)
        #[arg(long)]
        any: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove records that also appear in a reference file
    Dedupe {
        file: PathBuf,

        /// Field to match in the working file
        #[arg(short, long)]
        field: String,

        #[arg(short, long)]
        reference: PathBuf,

        /// Field to match in the reference file (defaults to --field)
        #[arg(long)]
        reference_field: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fill empty fields from a reference file
    Backfill {
        file: PathBuf,

        #[arg(short, long)]
        reference: PathBuf,

        /// Match field in the working file
        #[arg(long = "match")]
        match_field: String,

        /// Match field in the reference file (defaults to --match)
        #[arg(long)]
        reference_match: Option<String>,

        /// Field to fill in the working file
        #[arg(long)]
        fill: String,

        /// Field supplying the value in the reference file (defaults to --fill)
        #[arg(long)]
        reference_fill: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split a file into one file per value of a field
    Split {
        file: PathBuf,

        #[arg(short, long)]
        field: String,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (defaults to the input format)
        #[arg(long)]
        format: Option<String>,
    },

    /// Build a lookup object from a key field to value fields
    Map {
        file: PathBuf,

        #[arg(short, long)]
        key: String,

        /// Value field to include (repeatable)
        #[arg(long, required = true)]
        value: Vec<String>,
    },

    /// Extract version 4 UUIDs from a file or text
    Uuids {
        /// Record file (its raw text is searched unless --field is given)
        #[arg(required_unless_present = "text")]
        file: Option<PathBuf>,

        /// Field to extract from
        #[arg(short, long, requires = "file")]
        field: Option<String>,

        /// Search this text instead of a file
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,
    },

    /// Scan directories for record files
    Scan {
        /// Root directories to scan
        #[arg(short, long, required = true)]
        root: Vec<PathBuf>,
    },

    /// Count the data rows in a file
    Count {
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> rec_core::Result<()> {
    let options = if cli.lenient {
        CodecOptions::lenient()
    } else {
        CodecOptions::default()
    };

    match cli.command {
        Commands::Parse { file, limit } => cmd_parse(&file, limit, &options),
        Commands::Paths { file } => cmd_paths(&file, &options),
        Commands::Convert { file, to, output } => cmd_convert(&file, &to, output.as_deref(), &options),
        Commands::Combine {
            file,
            plan,
            output,
            format,
            deep,
        } => cmd_combine(&file, plan.as_deref(), output, format.as_deref(), deep, &options),
        Commands::CreatePlan {
            output,
            file,
            combined,
        } => cmd_create_plan(&output, &file, combined),
        Commands::Stats { file, field } => cmd_stats(&file, &field, &options),
        Commands::Details { file, field, id } => cmd_details(&file, &field, &id, &options),
        Commands::Filter {
            file,
            condition,
            any,
            remove,
            reference,
            reference_field,
            output,
        } => {
            let reference = match (reference, reference_field) {
                (Some(path), Some(field)) => Some((path, field)),
                _ => None,
            };
            cmd_filter(&file, &condition, any, remove, reference, output.as_deref(), &options)
        }
        Commands::DropFields {
            file,
            condition,
            any,
            output,
        } => cmd_drop_fields(&file, &condition, any, output.as_deref(), &options),
        Commands::Dedupe {
            file,
            field,
            reference,
            reference_field,
            output,
        } => {
            let reference_field = reference_field.unwrap_or_else(|| field.clone());
            cmd_dedupe(&file, &field, &reference, &reference_field, output.as_deref(), &options)
        }
        Commands::Backfill {
            file,
            reference,
            match_field,
            reference_match,
            fill,
            reference_fill,
            output,
        } => {
            let spec = BackfillSpec {
                reference_match: reference_match.unwrap_or_else(|| match_field.clone()),
                working_match: match_field,
                reference_fill: reference_fill.unwrap_or_else(|| fill.clone()),
                working_fill: fill,
            };
            cmd_backfill(&file, &reference, &spec, output.as_deref(), &options)
        }
        Commands::Split {
            file,
            field,
            output,
            format,
        } => cmd_split(&file, &field, &output, format.as_deref(), &options),
        Commands::Map { file, key, value } => cmd_map(&file, &key, &value, &options),
        Commands::Uuids { file, field, text } => {
            cmd_uuids(file.as_deref(), field.as_deref(), text.as_deref(), &options)
        }
        Commands::Scan { root } => cmd_scan(&root),
        Commands::Count { file } => cmd_count(&file),
    }
}

fn cmd_parse(file: &Path, limit: usize, options: &CodecOptions) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;

    println!("File: {}", file.display());
    println!("Format: {}", loaded.format);
    println!("Records: {}", loaded.records.len());
    println!();

    for record in loaded.records.iter().take(limit) {
        println!("{}", serde_json::to_string(record)?);
    }

    if loaded.records.len() > limit {
        println!("... ({} more records)", loaded.records.len() - limit);
    }

    Ok(())
}

fn cmd_paths(file: &Path, options: &CodecOptions) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;
    let Some(first) = loaded.records.first() else {
        println!("No records in {}", file.display());
        return Ok(());
    };

    for path in enumerate_paths(first) {
        println!("{}", path);
    }

    Ok(())
}

fn cmd_convert(file: &Path, to: &str, output: Option<&Path>, options: &CodecOptions) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;
    let format: Format = to.parse()?;

    emit(&loaded.records, format, output)
}

fn cmd_combine(
    specs: &[String],
    plan_path: Option<&Path>,
    output: Option<PathBuf>,
    format: Option<&str>,
    deep: bool,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let (mut plan, base_dir) = match plan_path {
        Some(path) => {
            let plan = CombinePlan::load(path)?;
            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (plan, base_dir)
        }
        None => {
            let files = specs
                .iter()
                .map(|spec| PlanFile::parse(spec))
                .collect::<rec_core::Result<Vec<_>>>()?;
            (CombinePlan::new(files), PathBuf::new())
        }
    };

    if *options != CodecOptions::default() {
        plan.codec = *options;
    }
    // Plan outputs are relative to the plan; command-line outputs are not
    plan.output = output.or_else(|| plan.output.as_ref().map(|o| base_dir.join(o)));
    if let Some(format) = format {
        plan.format = Some(format.parse()?);
    }
    if deep {
        plan.merge = MergeOptions {
            equality: ValueEquality::Deep,
        };
    }

    let files = plan.descriptors(&base_dir)?;
    tracing::debug!(equality = ?plan.merge.equality, codec = ?plan.codec, "combine plan resolved");
    println!("Combining {} files", files.len());

    let result = combine_with(&files, &plan.merge)?;
    for warning in &result.warnings {
        eprintln!("Warning: {}", warning);
    }

    let row_count = result.row_count();
    let format = plan.output_format();
    let output = match plan.output {
        Some(output) => output,
        None => PathBuf::from(export::timestamped_file_name("combined", format, chrono::Utc::now())),
    };

    export::write_records(&output, &result.into_values(), format)?;
    println!("Combined {} rows into {}", row_count, output.display());

    Ok(())
}

fn cmd_create_plan(output: &Path, specs: &[String], combined: Option<PathBuf>) -> rec_core::Result<()> {
    let mut files = Vec::new();
    for spec in specs {
        match PlanFile::parse(spec) {
            Ok(file) => files.push(file),
            Err(e) => eprintln!("Warning: {}", e),
        }
    }

    // Placeholder entries to edit by hand
    if files.is_empty() {
        files.push(PlanFile::new("first.csv", "id"));
        files.push(PlanFile::parse("second.jsonl:id:second")?);
    }

    let mut plan = CombinePlan::new(files);
    plan.output = combined;
    plan.save(output)?;

    println!("Created plan file: {}", output.display());
    println!("Files: {}", plan.files.len());
    println!();
    println!("Edit the file to configure the merge, then run:");
    println!("  rec combine --plan {}", output.display());

    Ok(())
}

fn cmd_stats(file: &Path, fields: &[String], options: &CodecOptions) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;

    let fields = if fields.is_empty() {
        loaded.records.first().map(enumerate_paths).unwrap_or_default()
    } else {
        fields.to_vec()
    };

    println!("{:<30}\t{:>9}\t{:>9}\t{:>9}", "field", "non-empty", "empty", "unique");
    println!("{}", "-".repeat(66));
    for analysis in analyze_fields(&loaded.records, &fields) {
        println!(
            "{:<30}\t{:>9}\t{:>9}\t{:>9}",
            analysis.name, analysis.non_empty_count, analysis.empty_count, analysis.unique_values
        );
    }

    Ok(())
}

fn cmd_details(file: &Path, field: &str, id: &str, options: &CodecOptions) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;
    let details = analyze_field_details(&loaded.records, field, id);

    println!("Rows with empty '{}' ({}):", field, details.len());
    for detail in &details {
        println!("  {}", detail.identifier);
    }

    Ok(())
}

fn parse_conditions(specs: &[String]) -> rec_core::Result<Vec<Condition>> {
    specs.iter().map(|spec| Condition::parse(spec)).collect()
}

fn operator(any: bool) -> Operator {
    if any {
        Operator::Or
    } else {
        Operator::And
    }
}

fn cmd_filter(
    file: &Path,
    specs: &[String],
    any: bool,
    remove: bool,
    reference: Option<(PathBuf, String)>,
    output: Option<&Path>,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;

    let mut conditions = parse_conditions(specs)?;
    if let Some((path, field)) = reference {
        let reference = load_file(&path, options)?;
        let set = ReferenceSet::from_records(&reference.records, &field);
        conditions = conditions
            .into_iter()
            .map(|c| c.with_reference(set.clone()))
            .collect();
    }

    let mode = if remove {
        FilterMode::Remove
    } else {
        FilterMode::Keep
    };
    let group = FilterGroup::new(operator(any), conditions).with_mode(mode);

    let filtered = filter_records(&loaded.records, &group);
    eprintln!("Kept {} of {} records", filtered.len(), loaded.records.len());

    emit(&filtered, loaded.format, output)
}

fn cmd_drop_fields(
    file: &Path,
    specs: &[String],
    any: bool,
    output: Option<&Path>,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;
    let group = FilterGroup::new(operator(any), parse_conditions(specs)?);

    emit(&remove_fields(&loaded.records, &group), loaded.format, output)
}

fn cmd_dedupe(
    file: &Path,
    field: &str,
    reference: &Path,
    reference_field: &str,
    output: Option<&Path>,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let working = load_file(file, options)?;
    let reference = load_file(reference, options)?;

    let result = deduplicate(&working.records, field, &reference.records, reference_field);
    eprintln!(
        "Removed {} duplicate records",
        working.records.len() - result.len()
    );

    emit(&result, working.format, output)
}

fn cmd_backfill(
    file: &Path,
    reference: &Path,
    spec: &BackfillSpec,
    output: Option<&Path>,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let working = load_file(file, options)?;
    let reference = load_file(reference, options)?;

    let outcome = backfill(&working.records, &reference.records, spec);
    eprintln!("Filled '{}' in {} records", spec.working_fill, outcome.filled);

    emit(&outcome.records, working.format, output)
}

fn cmd_split(
    file: &Path,
    field: &str,
    output: &Path,
    format: Option<&str>,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;
    let format = match format {
        Some(format) => format.parse()?,
        None => loaded.format,
    };

    let groups = split_by_field(&loaded.records, field);
    let written = export::write_split(output, field, &groups, format)?;

    println!("Split {} records into {} files:", loaded.records.len(), written.len());
    for path in &written {
        println!("  - {}", path.display());
    }

    Ok(())
}

fn cmd_map(file: &Path, key: &str, values: &[String], options: &CodecOptions) -> rec_core::Result<()> {
    let loaded = load_file(file, options)?;
    let mapped = map_values(&loaded.records, key, values);

    println!("{}", serde_json::to_string_pretty(&Value::Object(mapped))?);
    Ok(())
}

fn cmd_uuids(
    file: Option<&Path>,
    field: Option<&str>,
    text: Option<&str>,
    options: &CodecOptions,
) -> rec_core::Result<()> {
    let uuids = match (file, field, text) {
        (_, _, Some(text)) => extract_uuids(text),
        (Some(file), Some(field), None) => {
            let loaded: LoadedFile = load_file(file, options)?;
            extract_uuids_from_records(&loaded.records, field)
        }
        (Some(file), None, None) => {
            let content = fs::read_to_string(file).map_err(|e| Error::FileRead {
                path: file.to_path_buf(),
                source: e,
            })?;
            extract_uuids(&content)
        }
        (None, _, None) => {
            return Err(Error::InvalidArgument(
                "either a file or --text is required".to_string(),
            ))
        }
    };

    for uuid in &uuids {
        println!("{}", uuid);
    }
    eprintln!("Found {} UUIDs", uuids.len());

    Ok(())
}

fn cmd_scan(roots: &[PathBuf]) -> rec_core::Result<()> {
    let result = scan_directory(roots)?;

    println!("Scanned {} root(s):", result.roots.len());
    for root in &result.roots {
        println!("  {}", root.display());
    }
    println!();
    println!("Found {} files:", result.total_files());
    for file in &result.files {
        println!("  [{}] {}", file.format, file.path.display());
    }

    Ok(())
}

fn cmd_count(file: &Path) -> rec_core::Result<()> {
    let format = Format::from_path(file)
        .ok_or_else(|| Error::UnsupportedFormat(file.display().to_string()))?;
    let content = fs::read_to_string(file).map_err(|e| Error::FileRead {
        path: file.to_path_buf(),
        source: e,
    })?;

    println!("{}", count_rows(&content, format)?);
    Ok(())
}

/// Write records to `output`, or print them when no output is given
fn emit(records: &[Value], format: Format, output: Option<&Path>) -> rec_core::Result<()> {
    match output {
        Some(path) => {
            export::write_records(path, records, format)?;
            eprintln!("Wrote {} records to {}", records.len(), path.display());
        }
        None => println!("{}", serialize(records, format)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_combine_args() {
        let cli = Cli::try_parse_from([
            "rec", "combine", "--file", "a.csv:id", "--file", "b.json:id:B", "--deep",
        ])
        .unwrap();
        match cli.command {
            Commands::Combine { file, deep, plan, .. } => {
                assert_eq!(file, vec!["a.csv:id", "b.json:id:B"]);
                assert!(deep);
                assert!(plan.is_none());
            }
            _ => panic!("expected combine"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["rec", "count", "a.jsonl", "--lenient", "-v"]).unwrap();
        assert!(cli.lenient);
        assert!(cli.verbose);
    }

    #[test]
    fn test_operator_flag() {
        assert_eq!(operator(true), Operator::Or);
        assert_eq!(operator(false), Operator::And);
    }
}
