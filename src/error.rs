//! Error types.
//!
//! Preamble problems are fatal: the sort order of the variable table and
//! the density of the identifier index could not be guaranteed otherwise.
//! Problems with a single value-change record are local to that record.

use compact_str::CompactString;
use std::path::PathBuf;

/// Fatal error while reading the declarations preamble.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("line {line}: wire name too long ({len} > {max} bytes)")]
    NameTooLong { line: u64, len: usize, max: usize },
    #[error("line {line}: scope nesting too deep ({depth} > {max})")]
    ScopeTooDeep { line: u64, depth: usize, max: usize },
}

/// A value-change record that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("unrecognized record: `{0}`")]
    Unrecognized(String),
    #[error("id `{id}` not found: `{record}`")]
    UnknownId { id: CompactString, record: String },
    #[error("wrong width ({expected} != {found}): `{record}`")]
    WidthMismatch {
        expected: u32,
        found: usize,
        record: String,
    },
    #[error("malformed bit token: `{0}`")]
    MalformedBits(String),
    #[error("malformed time marker: `{0}`")]
    MalformedTime(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ToggleError {
    #[error("parse error: {0}")]
    Format(#[from] FormatError),
    #[error("cannot open {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot save toggle data to {path:?}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode toggle points")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),
    #[error("cannot decode toggle points")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ToggleError>;
