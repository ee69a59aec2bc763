//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// A length field exceeds what the format or the decoder allows.
    #[error("length {len} exceeds limit {max}")]
    LengthLimit {
        /// The length that was requested.
        len: u64,
        /// The maximum allowed length.
        max: u64,
    },

    /// A file path that cannot be represented as UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// Invalid encoded value.
    #[error("invalid encoded value: {message}")]
    InvalidValue {
        /// Description of the invalid value.
        message: String,
    },
}

impl CodecError {
    /// Creates a length limit error.
    pub fn length_limit(len: u64, max: u64) -> Self {
        Self::LengthLimit { len, max }
    }

    /// Creates a non-UTF-8 path error.
    pub fn non_utf8_path(path: &std::path::Path) -> Self {
        Self::NonUtf8Path {
            path: path.to_string_lossy().into_owned(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }
}
