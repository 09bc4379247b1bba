//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store backing one segment of the log.
///
/// Backends are **opaque byte stores**: they hold a single growable run of
/// bytes and know nothing about pages, fragments, or record framing. The
/// core crate owns all format interpretation.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at, which equals the
///   store size before the call
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` ensures all appended data survives process termination
/// - `truncate` only ever shrinks the store
/// - Backends must be `Send + Sync` so independent readers can observe them
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - for tests
/// - [`super::FileBackend`] - for persistent segment files
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ReadOutOfBounds`](crate::StorageError::ReadOutOfBounds) if
    /// the range extends past the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the store.
    ///
    /// Returns the offset the data was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the store in bytes.
    ///
    /// This is the offset the next `append` will write at.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs data and metadata to durable storage.
    ///
    /// A stronger guarantee than `flush`: after this returns, all appended
    /// bytes survive a crash or power loss.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the store to `new_size` bytes.
    ///
    /// Used when repairing a log after detected corruption: everything past
    /// the last known-good record boundary is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`TruncateBeyondEnd`](crate::StorageError::TruncateBeyondEnd)
    /// if `new_size` exceeds the current size, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
