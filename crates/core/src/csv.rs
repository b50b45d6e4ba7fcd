//! CSV batch reader for bulk product imports.
//!
//! Two passes over the uploaded file, both synchronous (callers run them on
//! a blocking thread):
//!
//! - [`count_rows`] — full pre-pass returning the validated raw row count,
//!   so the total is known before any mutation work starts.
//! - [`read_batches`] — a restartable-from-scratch sequence of
//!   [`Batch`]es. Each batch window covers a fixed number of *raw* rows
//!   (default 1000); rows inside a window are deduplicated by normalized
//!   SKU with last-write-wins, so a batch may carry fewer unique rows than
//!   raw rows consumed.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::sku::{normalize_sku, trim_sku};

// ── Constants ────────────────────────────────────────────────────────

/// Columns every import file must declare in its header row
/// (case-insensitive match).
pub const REQUIRED_COLUMNS: [&str; 3] = ["name", "sku", "description"];

/// Raw-row window size for one upsert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

// ── Error ────────────────────────────────────────────────────────────

/// Error raised while counting or batching an import file.
#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    /// The file content is invalid. Terminal: resubmitting the same file
    /// cannot succeed.
    #[error("{0}")]
    Validation(String),

    /// The file could not be read. Transient: the run may be retried.
    #[error("Failed to read CSV file: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV structure could not be parsed. Transient.
    #[error("Failed to parse CSV file: {0}")]
    Parse(#[from] ::csv::Error),
}

impl CsvError {
    /// `true` for bad-input failures that must not be retried.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// ── Types ────────────────────────────────────────────────────────────

/// One normalized product row ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRow {
    pub name: String,
    /// Raw SKU as supplied, trimmed.
    pub sku: String,
    /// Lowercase, trimmed uniqueness key.
    pub sku_normalized: String,
    /// Trimmed description; empty becomes absent.
    pub description: Option<String>,
    pub active: bool,
}

/// One deduplicated batch window.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Unique rows keyed by normalized SKU, last occurrence winning,
    /// first-seen order preserved.
    pub rows: Vec<ProductRow>,
    /// Raw rows consumed to produce this batch (may exceed `rows.len()`).
    pub raw_rows: u64,
}

/// Header positions of the required columns.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    name: usize,
    sku: usize,
    description: usize,
}

// ── Counting pass ────────────────────────────────────────────────────

/// Count the raw data rows in a CSV file, validating headers first.
pub fn count_rows(path: impl AsRef<Path>) -> Result<u64, CsvError> {
    let mut reader = open_reader(path.as_ref())?;
    validate_headers(&mut reader)?;

    let mut count: u64 = 0;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

// ── Batching pass ────────────────────────────────────────────────────

/// Open a batch sequence over a CSV file, validating headers upfront.
///
/// The returned reader is an iterator of `Result<Batch, CsvError>`. It
/// always starts from the top of the file; there is no resume.
pub fn read_batches(path: impl AsRef<Path>, batch_size: usize) -> Result<BatchReader, CsvError> {
    let mut reader = open_reader(path.as_ref())?;
    let columns = validate_headers(&mut reader)?;
    Ok(BatchReader {
        reader,
        columns,
        batch_size: batch_size.max(1),
        done: false,
    })
}

/// Iterator over deduplicated batch windows of an import file.
pub struct BatchReader {
    reader: ::csv::Reader<File>,
    columns: ColumnIndex,
    batch_size: usize,
    done: bool,
}

impl Iterator for BatchReader {
    type Item = Result<Batch, CsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let columns = self.columns;
        let batch_size = self.batch_size;

        // Last-write-wins per normalized SKU within the window; the index
        // map keeps first-seen order stable.
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<ProductRow> = Vec::new();
        let mut raw_rows: u64 = 0;

        for record in self.reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            raw_rows += 1;

            let row = match normalize_record(columns, &record) {
                Ok(row) => row,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            match index.get(&row.sku_normalized) {
                Some(&at) => rows[at] = row,
                None => {
                    index.insert(row.sku_normalized.clone(), rows.len());
                    rows.push(row);
                }
            }

            if raw_rows as usize >= batch_size {
                return Some(Ok(Batch { rows, raw_rows }));
            }
        }

        self.done = true;
        if raw_rows > 0 {
            Some(Ok(Batch { rows, raw_rows }))
        } else {
            None
        }
    }
}

fn normalize_record(
    columns: ColumnIndex,
    record: &::csv::StringRecord,
) -> Result<ProductRow, CsvError> {
    let name = record.get(columns.name).unwrap_or("").trim();
    let sku = record.get(columns.sku).unwrap_or("").trim();
    let description = record.get(columns.description).unwrap_or("").trim();

    if name.is_empty() || sku.is_empty() {
        return Err(CsvError::Validation(
            "Each row must include non-empty 'name' and 'sku' values.".to_string(),
        ));
    }

    Ok(ProductRow {
        name: name.to_string(),
        sku: trim_sku(sku),
        sku_normalized: normalize_sku(sku),
        description: if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        },
        active: true,
    })
}

// ── Private helpers ──────────────────────────────────────────────────

fn open_reader(path: &Path) -> Result<::csv::Reader<File>, CsvError> {
    if !path.exists() {
        return Err(CsvError::Validation(
            "Uploaded CSV file no longer exists on the server.".to_string(),
        ));
    }
    let file = File::open(path)?;
    Ok(::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Check the header row declares every required column, case-insensitively,
/// and resolve their positions.
fn validate_headers(reader: &mut ::csv::Reader<File>) -> Result<ColumnIndex, CsvError> {
    let headers = reader.headers()?;
    if headers.is_empty() || headers.iter().all(|field| field.trim().is_empty()) {
        return Err(CsvError::Validation(
            "CSV file is missing a header row.".to_string(),
        ));
    }

    let normalized: Vec<String> = headers
        .iter()
        .map(|field| field.trim().to_lowercase())
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !normalized.iter().any(|header| header == column))
        .collect();
    if !missing.is_empty() {
        return Err(CsvError::Validation(format!(
            "CSV missing required columns: {}",
            missing.join(", ")
        )));
    }

    let position = |column: &str| {
        normalized
            .iter()
            .position(|header| header == column)
            .unwrap_or_default()
    };
    Ok(ColumnIndex {
        name: position("name"),
        sku: position("sku"),
        description: position("description"),
    })
}

// ── Tests ────────────────────────────────────────────────────────────
