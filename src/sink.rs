//! Output tables for extracted records.
//!
//! A sink owns one append-only table per [`EntityKind`] for the lifetime of a run.
//! Rows are written whole under a per-table lock so concurrent company pipelines
//! never interleave partial rows.

use crate::errors::AppError;
use crate::models::{EntityKind, Record};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Identity of one run: every table of the run shares the prefix and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunId {
    pub prefix: String,
    pub timestamp: String,
}

/// Last timestamp handed out, in microseconds. Keeps run ids unique within a process.
static LAST_RUN_MICROS: AtomicI64 = AtomicI64::new(0);

fn next_run_micros() -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_RUN_MICROS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_RUN_MICROS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

impl RunId {
    /// New run id; the prefix is sanitized for use in file names and the timestamp is
    /// UTC unix seconds with a microsecond fraction (`1700000000.123456`).
    pub fn new(prefix: impl Into<String>) -> Self {
        let micros = next_run_micros();
        Self {
            prefix: sanitize_prefix(&prefix.into()),
            timestamp: format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000),
        }
    }

    /// Run id for a keyword search: the first five characters of the keyword,
    /// right-padded with `_`.
    pub fn for_keyword(keyword: &str) -> Self {
        Self::new(keyword_prefix(keyword))
    }

    /// `{prefix}_{table}_{timestamp}`
    pub fn table_name(&self, kind: EntityKind) -> String {
        format!("{}_{}_{}", self.prefix, kind.table_name(), self.timestamp)
    }
}

/// Replaces anything but alphanumerics, `-` and `_` with `_`, so a prefix can never
/// name a path outside the data directory.
fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn keyword_prefix(keyword: &str) -> String {
    let mut prefix = sanitize_prefix(&keyword.chars().take(5).collect::<String>());
    while prefix.chars().count() < 5 {
        prefix.push('_');
    }
    prefix
}

pub trait RecordSink: Send + Sync {
    /// Writes the header row of every table. Called once, before any company.
    fn write_headers(&self) -> Result<(), AppError>;

    /// Appends one complete row to the table for `kind`.
    fn append_row(&self, kind: EntityKind, row: Vec<String>) -> Result<(), AppError>;
}

/// Appends a record to its table.
pub fn emit<R: Record>(sink: &dyn RecordSink, record: &R) -> Result<(), AppError> {
    sink.append_row(R::KIND, record.row())
}

fn poisoned(kind: EntityKind) -> AppError {
    AppError::SinkError(format!("Table '{}' lock poisoned", kind.table_name()))
}

// ============ CSV files ============

/// One CSV file per table, named `{prefix}_{table}_{timestamp}.csv`.
#[derive(Debug)]
pub struct CsvSink {
    run: RunId,
    dir: PathBuf,
    tables: HashMap<EntityKind, Mutex<csv::Writer<File>>>,
}

impl CsvSink {
    /// Creates every table file of `run` inside `dir`.
    ///
    /// Fails if any of them already exists: a file set belongs to exactly one run.
    pub fn create(dir: &Path, run: RunId) -> Result<Self, AppError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::SinkError(format!(
                "Failed to create data directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut tables = HashMap::new();
        for kind in EntityKind::ALL {
            let path = dir.join(format!("{}.csv", run.table_name(kind)));
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| {
                    AppError::SinkError(format!("Failed to open {}: {}", path.display(), e))
                })?;
            tables.insert(kind, Mutex::new(csv::Writer::from_writer(file)));
        }

        tracing::info!(
            "Opened {} output tables in {} for run {}_{}",
            tables.len(),
            dir.display(),
            run.prefix,
            run.timestamp
        );

        Ok(Self {
            run,
            dir: dir.to_path_buf(),
            tables,
        })
    }

    pub fn run(&self) -> &RunId {
        &self.run
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.csv", self.run.table_name(kind)))
    }

    fn write(&self, kind: EntityKind, row: &[String]) -> Result<(), AppError> {
        let table = self
            .tables
            .get(&kind)
            .ok_or_else(|| AppError::SinkError(format!("No table for {:?}", kind)))?;
        let mut writer = table.lock().map_err(|_| poisoned(kind))?;
        writer.write_record(row)?;
        writer.flush()?;
        Ok(())
    }
}

impl RecordSink for CsvSink {
    fn write_headers(&self) -> Result<(), AppError> {
        for kind in EntityKind::ALL {
            let headers: Vec<String> = kind.headers().iter().map(|h| h.to_string()).collect();
            self.write(kind, &headers)?;
        }
        Ok(())
    }

    fn append_row(&self, kind: EntityKind, row: Vec<String>) -> Result<(), AppError> {
        self.write(kind, &row)
    }
}

// ============ In-memory ============

#[derive(Debug, Default, Clone)]
struct MemoryTable {
    headers: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
}

/// Keeps every table in memory. Used by the HTTP surface for previews and by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<EntityKind, MemoryTable>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self, kind: EntityKind) -> Option<Vec<String>> {
        self.tables
            .lock()
            .ok()
            .and_then(|t| t.get(&kind).and_then(|table| table.headers.clone()))
    }

    pub fn rows(&self, kind: EntityKind) -> Vec<Vec<String>> {
        self.tables
            .lock()
            .ok()
            .and_then(|t| t.get(&kind).map(|table| table.rows.clone()))
            .unwrap_or_default()
    }

    /// Values of one named column, in row order.
    pub fn column(&self, kind: EntityKind, name: &str) -> Vec<String> {
        let Some(index) = kind.headers().iter().position(|h| *h == name) else {
            return Vec::new();
        };
        self.rows(kind)
            .into_iter()
            .filter_map(|row| row.get(index).cloned())
            .collect()
    }

    /// Rows as header-keyed JSON objects, per table name.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for kind in EntityKind::ALL {
            let rows: Vec<serde_json::Value> = self
                .rows(kind)
                .into_iter()
                .map(|row| {
                    let obj: serde_json::Map<String, serde_json::Value> = kind
                        .headers()
                        .iter()
                        .zip(row)
                        .map(|(h, v)| (h.to_string(), serde_json::Value::String(v)))
                        .collect();
                    serde_json::Value::Object(obj)
                })
                .collect();
            out.insert(kind.table_name().to_string(), serde_json::Value::Array(rows));
        }
        serde_json::Value::Object(out)
    }
}

impl RecordSink for MemorySink {
    fn write_headers(&self) -> Result<(), AppError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| AppError::SinkError("Memory sink lock poisoned".to_string()))?;
        for kind in EntityKind::ALL {
            tables.entry(kind).or_default().headers =
                Some(kind.headers().iter().map(|h| h.to_string()).collect());
        }
        Ok(())
    }

    fn append_row(&self, kind: EntityKind, row: Vec<String>) -> Result<(), AppError> {
        let mut tables = self.tables.lock().map_err(|_| poisoned(kind))?;
        tables.entry(kind).or_default().rows.push(row);
        Ok(())
    }
}
