//! Segment files: naming, listing, and the per-segment byte store.
//!
//! A segment is one file in the log directory, named by its zero-padded
//! decimal index so that lexicographic order equals numeric order. Segments
//! are written strictly in increasing index order and indices are dense:
//! `list_segments` fails when it finds a gap.

use crate::error::{WalError, WalResult};
use pagelog_storage::{FileBackend, StorageBackend};
use std::fs;
use std::path::{Path, PathBuf};

/// Width of the zero-padded decimal index in a segment filename.
const SEGMENT_NAME_WIDTH: usize = 8;

/// Builds the filename for a segment index, e.g. `00000042`.
#[must_use]
pub fn segment_file_name(index: u32) -> String {
    format!("{index:0width$}", width = SEGMENT_NAME_WIDTH)
}

/// Parses a segment filename back to its index.
///
/// Returns `None` for anything that is not a plain zero-padded decimal of
/// at least the canonical width, so stray files (locks, editor droppings)
/// are skipped rather than misread.
#[must_use]
pub fn parse_segment_file_name(name: &str) -> Option<u32> {
    if name.len() < SEGMENT_NAME_WIDTH || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// A segment discovered in the log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Numeric index parsed from the filename.
    pub index: u32,
    /// The filename itself.
    pub name: String,
}

/// Lists the segments in `dir`, sorted ascending by index.
///
/// Files whose names do not parse as segment names are skipped.
///
/// # Errors
///
/// Returns [`WalError::Config`] when the parsed indices are not dense, and
/// I/O errors from scanning the directory.
pub fn list_segments(dir: &Path) -> WalResult<Vec<SegmentInfo>> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(index) = parse_segment_file_name(name) {
            segments.push(SegmentInfo {
                index,
                name: name.to_string(),
            });
        }
    }

    segments.sort_by_key(|s| s.index);

    for pair in segments.windows(2) {
        if pair[1].index != pair[0].index + 1 {
            return Err(WalError::config(format!(
                "segment files are not sequential: gap between {} and {}",
                pair[0].index, pair[1].index
            )));
        }
    }

    Ok(segments)
}

/// One open segment file.
///
/// The segment owns a storage backend holding its bytes. The writer keeps
/// exactly one segment open for appending; readers open their own handles
/// through [`WalDir::open_for_read`](crate::WalDir::open_for_read) instead.
pub struct Segment {
    index: u32,
    path: PathBuf,
    backend: Box<dyn StorageBackend>,
    closed: bool,
}

impl Segment {
    /// Creates a new empty segment file in `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists or cannot be created.
    pub fn create(dir: &Path, index: u32) -> WalResult<Self> {
        let path = dir.join(segment_file_name(index));
        let backend = FileBackend::create(&path)?;
        Ok(Self {
            index,
            path,
            backend: Box::new(backend),
            closed: false,
        })
    }

    /// Opens an existing segment file in `dir` for appending.
    ///
    /// The append position is the current file size.
    ///
    /// # Errors
    ///
    /// Fails if the file does not exist or cannot be opened.
    pub fn open(dir: &Path, index: u32) -> WalResult<Self> {
        let path = dir.join(segment_file_name(index));
        let backend = FileBackend::open(&path)?;
        Ok(Self {
            index,
            path,
            backend: Box::new(backend),
            closed: false,
        })
    }

    /// Wraps an arbitrary backend as a segment, for unit tests.
    #[cfg(test)]
    pub(crate) fn with_backend(index: u32, backend: Box<dyn StorageBackend>) -> Self {
        Self {
            index,
            path: PathBuf::new(),
            backend,
            closed: false,
        }
    }

    /// Returns the segment index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the path to the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current size in bytes.
    pub fn size(&self) -> WalResult<u64> {
        self.ensure_open()?;
        Ok(self.backend.size()?)
    }

    /// Appends bytes, returning the offset they were written at.
    pub fn append(&mut self, data: &[u8]) -> WalResult<u64> {
        self.ensure_open()?;
        Ok(self.backend.append(data)?)
    }

    /// Reads `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, len: usize) -> WalResult<Vec<u8>> {
        self.ensure_open()?;
        Ok(self.backend.read_at(offset, len)?)
    }

    /// Fsyncs the segment file.
    pub fn sync(&mut self) -> WalResult<()> {
        self.ensure_open()?;
        self.backend.sync()?;
        Ok(())
    }

    /// Truncates the segment to `size` bytes.
    pub fn truncate(&mut self, size: u64) -> WalResult<()> {
        self.ensure_open()?;
        self.backend.truncate(size)?;
        Ok(())
    }

    /// Syncs and closes the segment. Closing twice is a no-op.
    pub fn close(&mut self) -> WalResult<()> {
        if self.closed {
            return Ok(());
        }
        self.backend.sync()?;
        self.closed = true;
        Ok(())
    }

    fn ensure_open(&self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        Ok(())
    }
}
