//! I/O utilities for CSV reading, writing, encoding, and delimiter resolution.
//!
//! All file I/O in sales-lens flows through this module. It provides:
//!
//! - **Delimiter resolution**: extension-based auto-detection (`.csv` → comma,
//!   `.tsv` → tab) with manual override support.
//! - **Encoding**: a two-step decode policy, a primary encoding (UTF-8 unless
//!   configured otherwise) and one fallback (ISO-8859-1), via `encoding_rs`.
//! - **Reader/writer construction**: `open_csv_reader` over decoded text and
//!   `open_csv_writer` for cleaned output, always written as UTF-8.
//! - **Discovery**: expanding directory arguments into the CSV files they hold.

use std::{
    borrow::Cow,
    fs::{self, File},
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Primary and fallback encodings tried, in order, when reading a source file.
#[derive(Debug, Clone, Copy)]
pub struct DecodePolicy {
    pub primary: &'static Encoding,
    pub fallback: &'static Encoding,
}

impl DecodePolicy {
    pub fn new(primary: &'static Encoding, fallback: &'static Encoding) -> Self {
        Self { primary, fallback }
    }

    pub fn attempts(&self) -> impl Iterator<Item = &'static Encoding> {
        let fallback = (self.fallback != self.primary).then_some(self.fallback);
        std::iter::once(self.primary).chain(fallback)
    }
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            primary: UTF_8,
            fallback: encoding_rs::WINDOWS_1252,
        }
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Short rows are tolerated here and padded by the caller; long rows are
/// rejected there as structural errors.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let file: Box<dyn Write> = Box::new(BufWriter::new(
        File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
    ));
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(file))
}

/// Decodes a whole file, or `None` if the bytes are malformed for `encoding`.
pub fn decode_bytes<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Option<Cow<'a, str>> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors { None } else { Some(text) }
}

/// Expands each input into the files to process: plain files pass through,
/// directories contribute their `*.csv` entries sorted by name.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = fs::read_dir(input)
                .with_context(|| format!("Listing directory {input:?}"))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
                })
                .collect::<Vec<_>>();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
