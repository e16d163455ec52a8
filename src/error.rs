//! Typed failures raised while reading a raw export.
//!
//! Everything else in the crate propagates `anyhow::Error`; the batch cleaner
//! needs to tell an unreadable source apart from an output failure, so source
//! reads use [`SourceReadError`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceReadError {
    #[error("could not open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path:?} is not valid {encoding} text")]
    Decode {
        path: PathBuf,
        encoding: &'static str,
    },
    #[error("{encoding} parse of {path:?} failed: {source}")]
    Parse {
        path: PathBuf,
        encoding: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("{path:?} line {line}: expected {expected} fields, saw {found}")]
    Malformed {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{path:?} has no header row")]
    MissingHeader { path: PathBuf },
}
