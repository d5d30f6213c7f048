//! Error types for the output store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`OutputStore`](super::OutputStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The ledger could not be read or written as CSV.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// The ledger path.
        path: PathBuf,
        /// The underlying csv error.
        #[source]
        source: csv::Error,
    },

    /// A computed output path would escape the export directory.
    #[error("refusing to write outside the export directory: {path}")]
    PathViolation {
        /// The offending name or path.
        path: String,
    },

    /// The output file name already belongs to a different record.
    #[error("{file} already belongs to {owner}")]
    FileClaimed {
        /// The output file name.
        file: String,
        /// Handle of the record that owns the file.
        owner: String,
    },

    /// The export directory does not exist or is not a directory.
    #[error("export directory {path} does not exist or is not a directory")]
    MissingDirectory {
        /// The configured directory.
        path: PathBuf,
    },
}

impl StoreError {
    /// Creates an I/O error tagged with the path involved.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a CSV error tagged with the ledger path.
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Creates a path violation error.
    pub fn path_violation(path: impl Into<String>) -> Self {
        Self::PathViolation { path: path.into() }
    }

    /// Creates an error for a file name owned by another record.
    pub fn file_claimed(file: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::FileClaimed {
            file: file.into(),
            owner: owner.into(),
        }
    }
}
