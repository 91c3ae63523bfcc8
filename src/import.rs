//! Import pipeline orchestration.
//!
//! Coordinates one batch run: discover files by suffix → parse each into
//! records → upsert each record by its business key. Bad files and bad
//! records are recorded in the [`ImportReport`] and skipped; only a missing
//! import root or an unreachable store stops the run.

use anyhow::{bail, Result};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, ImportKind, ImportTarget};
use crate::db;
use crate::error::ImportError;
use crate::migrate;
use crate::models::{DocumentKey, Record, UpsertOutcome};
use crate::progress::{ImportProgressEvent, ImportProgressReporter, ProgressMode};
use crate::retry::{with_store_retries, RetryPolicy};
use crate::store::sqlite::SqliteCollection;
use crate::store::Collection;

/// Everything one import run needs. Built once per invocation.
pub struct ImportSpec<'a> {
    pub root: PathBuf,
    pub collection: &'a dyn Collection,
    pub key_field: String,
    pub suffix: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Discover, parse and validate keys without writing anything.
    pub dry_run: bool,
}

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    #[serde(serialize_with = "serialize_display")]
    pub error: ImportError,
}

#[derive(Debug, Serialize)]
pub struct RecordFailure {
    pub file: PathBuf,
    /// Position of the record in the file's flattened record sequence.
    pub index: usize,
    #[serde(serialize_with = "serialize_display")]
    pub error: ImportError,
}

/// Outcome of a whole run.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub collection: String,
    /// Files that parsed, whether or not all their records were stored.
    pub files_processed: usize,
    pub files_failed: Vec<FileFailure>,
    pub records_inserted: usize,
    pub records_replaced: usize,
    /// Valid records not written because of a dry run.
    pub records_skipped: usize,
    pub records_failed: Vec<RecordFailure>,
}

impl ImportReport {
    fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.files_failed.is_empty() && self.records_failed.is_empty()
    }

    fn tally(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.records_inserted += 1,
            UpsertOutcome::Replaced => self.records_replaced += 1,
        }
    }
}

/// List the files directly inside `root` whose name ends with `suffix`.
///
/// Paths are absolute and sorted by file name so repeated runs over an
/// unchanged directory visit files in the same order.
pub fn discover(root: &Path, suffix: &str) -> Result<Vec<PathBuf>, ImportError> {
    if !root.is_dir() {
        return Err(ImportError::PathNotFound(root.to_path_buf()));
    }
    let root = root
        .canonicalize()
        .map_err(|_| ImportError::PathNotFound(root.to_path_buf()))?;

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // A dangling symlink or an entry removed mid-listing.
                log::warn!("skipping unreadable entry in {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Read a file holding either an array of records or an object whose
/// array-valued members are arrays of records.
pub fn parse(path: &Path) -> Result<Vec<Record>, ImportError> {
    let content = std::fs::read_to_string(path).map_err(|e| ImportError::parse(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| ImportError::parse(path, e))?;
    records_from_value(value).map_err(|reason| ImportError::parse(path, reason))
}

fn records_from_value(value: Value) -> Result<Vec<Record>, String> {
    match value {
        Value::Array(items) => objects_from_array(items, None),
        Value::Object(members) => {
            let mut records = Vec::new();
            for (name, member) in members {
                // Non-array members (titles, export metadata) carry no records.
                if let Value::Array(items) = member {
                    records.extend(objects_from_array(items, Some(&name))?);
                }
            }
            Ok(records)
        }
        other => Err(format!(
            "expected an array or object at the top level, found {}",
            json_type(&other)
        )),
    }
}

fn objects_from_array(items: Vec<Value>, member: Option<&str>) -> Result<Vec<Record>, String> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(match member {
                Some(name) => format!(
                    "element {} of `{}` is {}, expected an object",
                    i,
                    name,
                    json_type(&other)
                ),
                None => format!("element {} is {}, expected an object", i, json_type(&other)),
            }),
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn record_key(key_field: &str, record: &Record) -> Result<DocumentKey, ImportError> {
    record
        .get(key_field)
        .and_then(DocumentKey::from_value)
        .ok_or_else(|| ImportError::MissingKeyField {
            field: key_field.to_string(),
        })
}

/// Insert `record`, or replace the document that has the same key.
pub async fn upsert(
    collection: &dyn Collection,
    key_field: &str,
    record: &Record,
) -> Result<UpsertOutcome, ImportError> {
    let key = record_key(key_field, record)?;
    collection
        .upsert(&key, record)
        .await
        .map_err(ImportError::StoreUnavailable)
}

/// Run discover → parse → upsert over every matching file.
///
/// Returns `Err` only for fatal errors; everything else lands in the report.
/// Writes made before a fatal error stay committed.
pub async fn trigger_import(
    spec: &ImportSpec<'_>,
    options: ImportOptions,
    progress: &dyn ImportProgressReporter,
) -> Result<ImportReport, ImportError> {
    let collection_name = spec.collection.name().to_string();
    progress.report(ImportProgressEvent::Discovering {
        collection: collection_name.clone(),
    });

    let files = discover(&spec.root, &spec.suffix)?;
    log::info!(
        "found {} file(s) ending in {} under {}",
        files.len(),
        spec.suffix,
        spec.root.display()
    );

    let mut report = ImportReport::new(&collection_name);
    let total = files.len() as u64;

    for (n, path) in files.iter().enumerate() {
        match parse(path) {
            Ok(records) => {
                log::debug!("{}: {} record(s)", path.display(), records.len());
                report.files_processed += 1;
                for (index, record) in records.iter().enumerate() {
                    let result = if options.dry_run {
                        record_key(&spec.key_field, record).map(|_| None)
                    } else {
                        upsert(spec.collection, &spec.key_field, record)
                            .await
                            .map(Some)
                    };
                    match result {
                        Ok(Some(outcome)) => report.tally(outcome),
                        Ok(None) => report.records_skipped += 1,
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            log::warn!("{} record {}: {}", path.display(), index, err);
                            report.records_failed.push(RecordFailure {
                                file: path.clone(),
                                index,
                                error: err,
                            });
                        }
                    }
                }
            }
            Err(err) => {
                log::warn!("{}", err);
                report.files_failed.push(FileFailure {
                    path: path.clone(),
                    error: err,
                });
            }
        }

        progress.report(ImportProgressEvent::Importing {
            collection: collection_name.clone(),
            file: path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default(),
            n: n as u64 + 1,
            total,
        });
    }

    Ok(report)
}

/// CLI entry point for `sbook import <kind|all>`.
pub async fn run_import(
    config: &Config,
    which: &str,
    dry_run: bool,
    json: bool,
    progress: ProgressMode,
) -> Result<()> {
    let kinds: Vec<ImportKind> = if which == "all" {
        ImportKind::ALL.to_vec()
    } else {
        vec![which.parse()?]
    };

    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let reporter = progress.reporter();
    let policy = RetryPolicy::new(config.import.max_retries);
    let options = ImportOptions { dry_run };

    let mut reports = Vec::new();
    for kind in kinds {
        let target = config.target(kind);
        let collection = SqliteCollection::new(pool.clone(), &target.collection);
        let spec = ImportSpec {
            root: target.root.clone(),
            collection: &collection,
            key_field: target.key_field.clone(),
            suffix: target.suffix.clone(),
        };

        let result =
            with_store_retries(policy, || trigger_import(&spec, options, &*reporter)).await;
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&reports)?);
                }
                pool.close().await;
                bail!("import {} failed: {}", kind, err);
            }
        };

        if !json {
            print_report(&target, &report, dry_run);
        }
        reports.push(report);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("ok");
    }

    pool.close().await;
    Ok(())
}

fn print_report(target: &ImportTarget, report: &ImportReport, dry_run: bool) {
    if dry_run {
        println!("import {} -> {} (dry-run)", target.kind, target.collection);
    } else {
        println!("import {} -> {}", target.kind, target.collection);
    }
    println!("  files processed: {}", report.files_processed);
    println!("  files failed: {}", report.files_failed.len());
    for failure in &report.files_failed {
        println!("    {}", failure.error);
    }
    if dry_run {
        println!("  records valid: {}", report.records_skipped);
    } else {
        println!("  records inserted: {}", report.records_inserted);
        println!("  records replaced: {}", report.records_replaced);
    }
    println!("  records failed: {}", report.records_failed.len());
    for failure in &report.records_failed {
        println!(
            "    {}#{}: {}",
            failure.file.display(),
            failure.index,
            failure.error
        );
    }
}
