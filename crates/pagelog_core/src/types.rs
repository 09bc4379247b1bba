//! Core value types for the write-ahead log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a record within the log.
///
/// A location names the segment holding the record's first fragment and the
/// byte offset of that fragment's header within the segment file. Opening
/// the named segment and reading from the offset yields the record as the
/// first record of the stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct LogLocation {
    /// Index of the segment holding the record's first fragment.
    pub segment: u32,
    /// Byte offset of the fragment header within the segment file.
    pub offset: u64,
}

impl LogLocation {
    /// Creates a location from a segment index and byte offset.
    #[must_use]
    pub const fn new(segment: u32, offset: u64) -> Self {
        Self { segment, offset }
    }
}

impl fmt::Display for LogLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.segment, self.offset)
    }
}
