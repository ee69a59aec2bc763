//! Error types for the store.

use spectradb_codec::CodecError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Generic failure.
    #[error("operation failed: {message}")]
    Failure {
        /// Description of the failure.
        message: String,
    },

    /// The handle is stale, mistyped, or does not belong to this store.
    #[error("invalid object handle")]
    InvalidHandle,

    /// The referenced slot is dead or holds a different object.
    #[error("object not found")]
    ObjectNotFound,

    /// The record type is not registered.
    #[error("unknown record type: {name}")]
    UnknownType {
        /// The type name that was not registered.
        name: String,
    },

    /// Encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A file could not be opened or created.
    #[error("cannot open {}: {source}", path.display())]
    FileOpen {
        /// The path that failed to open.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file does not carry this store's magic bytes or is malformed.
    #[error("bad file format: {message}")]
    FileFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The file was written by a newer, incompatible build.
    #[error("file version {found} is newer than supported version {supported}")]
    FileVersion {
        /// Version found in the file.
        found: u32,
        /// Highest version this build reads.
        supported: u32,
    },

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DbError {
    /// Creates a generic failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Creates a file open error.
    pub fn file_open(path: &Path, source: io::Error) -> Self {
        Self::FileOpen {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Creates a file format error.
    pub fn file_format(message: impl Into<String>) -> Self {
        Self::FileFormat {
            message: message.into(),
        }
    }
}
