//! Error types for ldlookup.
//!
//! One unified [`Error`] enum covers every layer — disk hash, tables,
//! builder, and reader. We use `thiserror` for the `Display` and `Error`
//! trait implementations.
//!
//! Broad categories:
//!
//! - **I/O**: an underlying read/write/seek failed
//! - **Dataset lifecycle**: files missing on open or present on create
//! - **Corruption**: a stored header or value cannot be interpreted
//! - **Key misuse**: missing, duplicated, too long, or out of reserve —
//!   these are caller errors, not corruption
//! - **Input**: invalid values, columns, or stratification parameters

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ldlookup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all ldlookup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying file read/write/seek failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A dataset file or directory that should exist does not.
    #[error("not found: {path}")]
    NotFound {
        /// Path that was expected to exist
        path: PathBuf,
    },

    /// A dataset file or directory that must not exist already does.
    #[error("already exists: {path}")]
    AlreadyExists {
        /// Path that was expected to be absent
        path: PathBuf,
    },

    /// A stored header, checksum, or value cannot be interpreted.
    ///
    /// The dataset is unusable; rebuild it from the source data.
    #[error("corrupt dataset: {message}")]
    Corrupt {
        /// Description of what failed to parse or validate
        message: String,
    },

    /// Key not present in the index. Surfaced to the caller; not corruption.
    #[error("missing key: '{key}'")]
    MissingKey {
        /// The key that was looked up
        key: String,
    },

    /// `reserve` called on a key that is already present.
    #[error("duplicate key: '{key}' is already present")]
    DuplicateKey {
        /// The key that was reserved twice
        key: String,
    },

    /// Key length exceeds the `max_key_size` fixed at creation.
    #[error("key too long: '{key}' exceeds maximum key size {max_key_size}")]
    KeyTooLong {
        /// The offending key
        key: String,
        /// The maximum key length of the hash
        max_key_size: usize,
    },

    /// Append to a reserved key exceeds its remaining reserved bytes, or
    /// the key's value region is already sealed behind later keys.
    #[error("out of reserved space for key '{key}'")]
    OutOfReserve {
        /// The key whose reserve was exhausted
        key: String,
    },

    /// Write operation on a hash opened read-only.
    #[error("write operation on read-only hash")]
    ReadOnly,

    /// `get_stratum` called with a value below the minimum cutpoint.
    #[error("value below the minimum stratum cutpoint")]
    OutOfRange,

    /// `lookup_sample` with `k > 0` on a key with no values.
    #[error("cannot sample key '{key}': no values")]
    EmptyKey {
        /// The key with an empty value sequence
        key: String,
    },

    /// A value contains a reserved delimiter byte.
    #[error("invalid value: contains a reserved delimiter byte")]
    InvalidValue,

    /// A named column is absent from the input header line.
    #[error("invalid column: '{column}' not found in header")]
    InvalidColumn {
        /// The column name that could not be resolved
        column: String,
    },

    /// Invalid input parameter; fix the input rather than retrying.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of what is wrong with the input
        message: String,
    },
}

impl Error {
    /// Create a `Corrupt` error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::Corrupt {
            message: message.into(),
        }
    }

    /// Create an `InvalidInput` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    /// Check if this is a "missing key" error.
    ///
    /// Readers use this to translate an absent stratum into an empty
    /// result instead of a failure.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Error::MissingKey { .. })
    }

    /// Check if this error means a query value fell outside every stratum.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, Error::OutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_io() {
        let err = Error::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn display_key_errors() {
        let err = Error::MissingKey { key: "rs1".into() };
        assert!(err.to_string().contains("rs1"));
        assert!(err.is_missing_key());

        let err = Error::KeyTooLong {
            key: "rs99999".into(),
            max_key_size: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("rs99999"));
        assert!(msg.contains('4'));

        let err = Error::OutOfReserve { key: "p".into() };
        assert!(err.to_string().contains('p'));
    }

    #[test]
    fn display_corrupt() {
        let err = Error::corrupt("bad header");
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn classification() {
        assert!(Error::OutOfRange.is_out_of_range());
        assert!(!Error::ReadOnly.is_out_of_range());
        assert!(!Error::ReadOnly.is_missing_key());
    }
}
