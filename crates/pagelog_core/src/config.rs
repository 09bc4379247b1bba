//! Log configuration.

use crate::error::{WalError, WalResult};
use crate::frame::{DEFAULT_SEGMENT_SIZE, PAGE_SIZE};
use std::path::PathBuf;

/// Configuration for opening a [`Wal`](crate::Wal).
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Directory holding the segment files.
    pub dir: PathBuf,

    /// Maximum segment size in bytes.
    ///
    /// Must be a positive multiple of the page size. Defaults to 128 pages
    /// (4 MiB).
    pub segment_size: u64,

    /// Whether to Snappy-compress records before framing.
    pub compress: bool,
}

impl WalConfig {
    /// Creates a configuration for `dir` with default values.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            compress: false,
        }
    }

    /// Sets the maximum segment size in bytes.
    #[must_use]
    pub const fn segment_size(mut self, size: u64) -> Self {
        self.segment_size = size;
        self
    }

    /// Enables or disables record compression.
    #[must_use]
    pub const fn compress(mut self, value: bool) -> Self {
        self.compress = value;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Config`] if `segment_size` is zero or not a
    /// multiple of the page size.
    pub fn validate(&self) -> WalResult<()> {
        if self.segment_size == 0 || self.segment_size % PAGE_SIZE as u64 != 0 {
            return Err(WalError::config(format!(
                "segment size {} is not a positive multiple of the {PAGE_SIZE}-byte page size",
                self.segment_size
            )));
        }
        Ok(())
    }

    /// Number of pages in one full segment.
    pub(crate) fn pages_per_segment(&self) -> u64 {
        self.segment_size / PAGE_SIZE as u64
    }
}
