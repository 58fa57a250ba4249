//! Error types for source readers.

use std::path::PathBuf;

use thiserror::Error;

/// Source reader result type
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors from reading a single source file.
///
/// None of these are fatal to a menu build: the caller drops the offending
/// record or section and carries on.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("missing group [{0}]")]
    MissingGroup(String),

    #[error("missing required key '{0}'")]
    MissingKey(String),

    #[error("unsupported entry type '{0}'")]
    UnsupportedType(String),

    #[error("expected <Menu> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("document has no root element")]
    Empty,
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
