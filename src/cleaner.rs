//! Raw export cleaning.
//!
//! A raw file is read into a [`RawTable`] (every cell a string), then
//! [`clean`] turns it into a [`CleanedTable`]:
//!
//! 1. header names are trimmed (blank names become `Unnamed: <i>`, repeats
//!    get a `.1`, `.2` suffix),
//! 2. each column gets a [`ColumnRole`] from its name and every cell is coerced
//!    under that role; unreadable values become null,
//! 3. rows where every cell is null are dropped,
//! 4. null free-text cells are replaced with [`UNKNOWN`],
//! 5. exact duplicate rows are dropped, keeping the first occurrence.
//!
//! Filling runs before deduplication so that a row carrying a literal
//! `Unknown` and one with a missing value cannot both survive as identical
//! rows in the output.
//!
//! [`clean_batch`] runs this over many files; a file that cannot be read is
//! reported and skipped, it never aborts the batch.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    config::CleaningOptions,
    data::{ColumnRole, UNKNOWN, Value, classify_column, coerce_value},
    error::SourceReadError,
    io_utils::{self, DecodePolicy},
};

/// An untyped table exactly as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Reads `path` under the decode policy: the primary encoding first, then the
/// fallback if decoding or parsing failed.
pub fn read_raw_table(
    path: &Path,
    delimiter: u8,
    policy: &DecodePolicy,
) -> std::result::Result<RawTable, SourceReadError> {
    let bytes = fs::read(path).map_err(|source| SourceReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut last_error = None;
    for (attempt, encoding) in policy.attempts().enumerate() {
        match parse_raw_table(path, &bytes, delimiter, encoding) {
            Ok(table) => {
                if attempt > 0 {
                    warn!("Read {path:?} using fallback encoding {}", encoding.name());
                }
                return Ok(table);
            }
            Err(err) => {
                debug!("Reading {path:?} as {} failed: {err}", encoding.name());
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or(SourceReadError::MissingHeader {
        path: path.to_path_buf(),
    }))
}

fn parse_raw_table(
    path: &Path,
    bytes: &[u8],
    delimiter: u8,
    encoding: &'static encoding_rs::Encoding,
) -> std::result::Result<RawTable, SourceReadError> {
    let text = io_utils::decode_bytes(bytes, encoding).ok_or_else(|| SourceReadError::Decode {
        path: path.to_path_buf(),
        encoding: encoding.name(),
    })?;
    let parse_error = |source: csv::Error| SourceReadError::Parse {
        path: path.to_path_buf(),
        encoding: encoding.name(),
        source,
    };

    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
    let headers = reader
        .headers()
        .map_err(parse_error)?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if headers.is_empty() {
        return Err(SourceReadError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(parse_error)?;
        if record.len() > headers.len() {
            return Err(SourceReadError::Malformed {
                path: path.to_path_buf(),
                line: row_idx + 2,
                expected: headers.len(),
                found: record.len(),
            });
        }
        let mut row = record.iter().map(str::to_string).collect::<Vec<_>>();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Trims header names and makes every name non-empty and distinct.
pub fn standardize_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut output = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            trimmed.to_string()
        };
        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{base}.{count}");
        }
        seen.insert(name.clone(), 0);
        output.push(name);
    }
    output
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedColumn {
    pub name: String,
    pub role: ColumnRole,
}

/// The canonical table: typed cells, free-text columns never null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTable {
    pub columns: Vec<CleanedColumn>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl CleanedTable {
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn write(&self, path: &Path, delimiter: u8) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, delimiter)?;
        writer
            .write_record(self.headers())
            .with_context(|| format!("Writing header to {path:?}"))?;
        for row in &self.rows {
            let cells = row
                .iter()
                .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default());
            writer
                .write_record(cells)
                .with_context(|| format!("Writing row to {path:?}"))?;
        }
        writer.flush().with_context(|| format!("Flushing {path:?}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutcome {
    pub table: CleanedTable,
    pub duplicates_removed: usize,
}

pub fn clean(raw: &RawTable, options: &CleaningOptions) -> CleanOutcome {
    let columns = standardize_headers(&raw.headers)
        .into_iter()
        .map(|name| {
            let role = classify_column(&name);
            debug!("Column '{name}' classified as {role}");
            CleanedColumn { name, role }
        })
        .collect::<Vec<_>>();

    let typed = raw.rows.iter().map(|row| {
        columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let raw_value = row.get(idx).map(String::as_str).unwrap_or("");
                coerce_value(raw_value, column.role, &options.missing_tokens)
            })
            .collect::<Vec<_>>()
    });

    let filled = typed
        .filter(|row| row.iter().any(Option::is_some))
        .map(|mut row| {
            for (cell, column) in row.iter_mut().zip(&columns) {
                if column.role == ColumnRole::Text && cell.is_none() {
                    *cell = Some(Value::Text(UNKNOWN.to_string()));
                }
            }
            row
        })
        .collect::<Vec<_>>();

    let rows_before = filled.len();
    let rows = filled.into_iter().unique().collect::<Vec<_>>();
    let duplicates_removed = rows_before - rows.len();

    CleanOutcome {
        table: CleanedTable { columns, rows },
        duplicates_removed,
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileReport {
    Success {
        file_name: String,
        output: PathBuf,
        rows: usize,
        duplicates_removed: usize,
    },
    Failed {
        file_name: String,
        error: String,
    },
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        matches!(self, FileReport::Success { .. })
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileReport::Success {
                file_name,
                rows,
                duplicates_removed,
                ..
            } => write!(
                f,
                "{file_name}: Success. Rows: {rows}, Duplicates Removed: {duplicates_removed}"
            ),
            FileReport::Failed { file_name, error } => {
                write!(f, "{file_name}: Failed. Error: {error}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub entries: Vec<FileReport>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_success()).count()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, format!("{self}\n")).with_context(|| format!("Writing report {path:?}"))
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entries.iter().join("\n"))
    }
}

pub fn output_path(input: &Path, output_dir: &Path, prefix: &str) -> PathBuf {
    output_dir.join(format!("{prefix}{}", io_utils::file_name(input)))
}

/// Cleans one file into `output_dir`. Failures are captured in the report
/// entry rather than returned.
pub fn clean_file(
    input: &Path,
    output_dir: &Path,
    delimiter: Option<u8>,
    policy: &DecodePolicy,
    options: &CleaningOptions,
) -> FileReport {
    let file_name = io_utils::file_name(input);
    let delimiter = io_utils::resolve_input_delimiter(input, delimiter);
    let raw = match read_raw_table(input, delimiter, policy) {
        Ok(raw) => raw,
        Err(err) => {
            return FileReport::Failed {
                file_name,
                error: err.to_string(),
            };
        }
    };

    let outcome = clean(&raw, options);
    let output = output_path(input, output_dir, &options.output_prefix);
    if let Err(err) = outcome.table.write(&output, delimiter) {
        return FileReport::Failed {
            file_name,
            error: format!("{err:#}"),
        };
    }
    FileReport::Success {
        file_name,
        output,
        rows: outcome.table.row_count(),
        duplicates_removed: outcome.duplicates_removed,
    }
}

pub fn clean_batch(
    inputs: &[PathBuf],
    output_dir: &Path,
    delimiter: Option<u8>,
    policy: &DecodePolicy,
    options: &CleaningOptions,
) -> Result<RunReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Creating output directory {output_dir:?}"))?;
    let files = io_utils::expand_inputs(inputs)?;
    let mut report = RunReport::default();
    for input in &files {
        let entry = clean_file(input, output_dir, delimiter, policy, options);
        match &entry {
            FileReport::Success { output, .. } => info!("✓ Cleaned {input:?} into {output:?}"),
            FileReport::Failed { error, .. } => warn!("Failed to clean {input:?}: {error}"),
        }
        report.entries.push(entry);
    }
    Ok(report)
}
