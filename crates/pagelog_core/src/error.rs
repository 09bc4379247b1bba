//! Error types for the write-ahead log.

use std::io;
use thiserror::Error;

/// Result type for log operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors that can occur in write-ahead log operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] pagelog_storage::StorageError),

    /// Invalid configuration or an unusable directory state.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// The log bytes are damaged: a checksum mismatch, an invalid fragment
    /// type or sequence, non-zero page padding, an over-long fragment, or a
    /// torn tail.
    ///
    /// Recoverable: feeding this error to [`Wal::repair`](crate::Wal::repair)
    /// truncates the log back to `valid_through`.
    #[error("corruption at byte {offset}: {reason}")]
    Corruption {
        /// Stream position of the offending fragment.
        offset: u64,
        /// Bytes consumed through the end of the last intact record.
        valid_through: u64,
        /// Description of the damage.
        reason: String,
    },

    /// The caller handed `append` a record the log refuses to store.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the rejection.
        message: String,
    },

    /// Operation on a closed log or segment.
    #[error("log is closed")]
    Closed,

    /// Another process holds the directory's advisory lock.
    #[error("log directory locked: another process has exclusive access")]
    Locked,
}

impl WalError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(offset: u64, valid_through: u64, reason: impl Into<String>) -> Self {
        Self::Corruption {
            offset,
            valid_through,
            reason: reason.into(),
        }
    }

    /// Creates an invalid-record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_display_names_offset() {
        let err = WalError::corruption(4096, 1024, "checksum mismatch");
        assert_eq!(err.to_string(), "corruption at byte 4096: checksum mismatch");
    }

    #[test]
    fn io_errors_convert() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err: WalError = io_err.into();
        assert!(matches!(err, WalError::Io(_)));
    }

    #[test]
    fn storage_errors_convert() {
        let storage_err = pagelog_storage::StorageError::ReadOutOfBounds {
            offset: 10,
            len: 5,
            size: 12,
        };
        let err: WalError = storage_err.into();
        assert!(matches!(err, WalError::Storage(_)));
    }
}
