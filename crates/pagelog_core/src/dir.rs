//! Log directory management and single-writer locking.
//!
//! The layout is a single flat directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK        # advisory lock for the single writer
//! ├─ 00000000    # segment files, zero-padded decimal index
//! ├─ 00000001
//! └─ ...
//! ```
//!
//! There is no metadata file: all state is reconstructed from filenames and
//! segment contents. The LOCK file ensures only one process owns the
//! directory's write side at a time; readers never take the lock.

use crate::error::{WalError, WalResult};
use crate::segment::{list_segments, segment_file_name, Segment, SegmentInfo};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the advisory lock file.
const LOCK_FILE: &str = "LOCK";

/// The write side's handle on a log directory.
///
/// Holds the advisory lock for its whole lifetime; dropping the `WalDir`
/// releases the lock. Only one `WalDir` can exist per directory at a time,
/// across processes.
#[derive(Debug)]
pub struct WalDir {
    path: PathBuf,
    _lock_file: File,
}

impl WalDir {
    /// Opens a log directory, creating it if missing, and acquires the
    /// advisory lock.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Locked`] if another process holds the lock, and
    /// I/O errors from directory creation or the lock file.
    pub fn open(path: &Path) -> WalResult<Self> {
        fs::create_dir_all(path)?;

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(WalError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists the segments in the directory, sorted ascending.
    pub fn list(&self) -> WalResult<Vec<SegmentInfo>> {
        list_segments(&self.path)
    }

    /// Creates the segment with the given index.
    ///
    /// The index must be exactly one past the highest existing segment, or 0
    /// in an empty directory; segments are dense and only ever grow at the
    /// high end.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Config`] for an out-of-sequence index and I/O
    /// errors from file creation.
    pub fn create_segment(&self, index: u32) -> WalResult<Segment> {
        let expected = self.list()?.last().map_or(0, |s| s.index + 1);
        if index != expected {
            return Err(WalError::config(format!(
                "cannot create segment {index}: next segment index is {expected}"
            )));
        }

        let segment = Segment::create(&self.path, index)?;
        self.sync_dir()?;
        Ok(segment)
    }

    /// Opens an existing segment for appending.
    pub fn open_segment(&self, index: u32) -> WalResult<Segment> {
        Segment::open(&self.path, index)
    }

    /// Opens an existing segment read-only.
    pub fn open_for_read(&self, index: u32) -> WalResult<File> {
        let path = self.path.join(segment_file_name(index));
        Ok(File::open(path)?)
    }

    /// Returns the byte size of a segment file.
    pub fn segment_size(&self, index: u32) -> WalResult<u64> {
        let path = self.path.join(segment_file_name(index));
        Ok(fs::metadata(path)?.len())
    }

    /// Deletes all segments with index strictly greater than `index`.
    ///
    /// Returns the number of files removed.
    pub fn delete_after(&self, index: u32) -> WalResult<usize> {
        let mut deleted = 0;
        for info in self.list()? {
            if info.index > index {
                fs::remove_file(self.path.join(&info.name))?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.sync_dir()?;
            debug!(index, deleted, "deleted segments above index");
        }
        Ok(deleted)
    }

    /// Deletes all segments with index strictly less than `index`.
    ///
    /// Returns the number of files removed.
    pub fn delete_before(&self, index: u32) -> WalResult<usize> {
        let mut deleted = 0;
        for info in self.list()? {
            if info.index < index {
                fs::remove_file(self.path.join(&info.name))?;
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.sync_dir()?;
            debug!(index, deleted, "deleted segments below index");
        }
        Ok(deleted)
    }

    /// Shortens the segment with the given index to `size` bytes.
    pub fn truncate_segment(&self, index: u32, size: u64) -> WalResult<()> {
        let path = self.path.join(segment_file_name(index));
        let file = OpenOptions::new().write(true).open(&path)?;
        file.set_len(size)?;
        file.sync_all()?;
        self.sync_dir()?;
        Ok(())
    }

    /// Fsyncs the directory so entry creations and deletions are durable.
    ///
    /// Windows has no directory fsync; NTFS journals metadata itself.
    #[cfg(unix)]
    fn sync_dir(&self) -> WalResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> WalResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("wal");

        assert!(!path.exists());
        let _dir = WalDir::open(&path).unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("wal");

        let _dir1 = WalDir::open(&path).unwrap();
        let result = WalDir::open(&path);
        assert!(matches!(result, Err(WalError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("wal");

        {
            let _dir = WalDir::open(&path).unwrap();
        }
        let _dir2 = WalDir::open(&path).unwrap();
    }

    #[test]
    fn create_segment_enforces_sequence() {
        let temp = tempdir().unwrap();
        let dir = WalDir::open(temp.path()).unwrap();

        assert!(matches!(
            dir.create_segment(1),
            Err(WalError::Config { .. })
        ));

        let seg0 = dir.create_segment(0).unwrap();
        assert_eq!(seg0.index(), 0);

        assert!(matches!(
            dir.create_segment(0),
            Err(WalError::Config { .. })
        ));
        assert!(matches!(
            dir.create_segment(2),
            Err(WalError::Config { .. })
        ));

        let seg1 = dir.create_segment(1).unwrap();
        assert_eq!(seg1.index(), 1);
    }

    #[test]
    fn delete_after_removes_high_segments() {
        let temp = tempdir().unwrap();
        let dir = WalDir::open(temp.path()).unwrap();
        for i in 0..4 {
            dir.create_segment(i).unwrap();
        }

        let deleted = dir.delete_after(1).unwrap();
        assert_eq!(deleted, 2);

        let indices: Vec<u32> = dir.list().unwrap().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn delete_before_removes_low_segments() {
        let temp = tempdir().unwrap();
        let dir = WalDir::open(temp.path()).unwrap();
        for i in 0..4 {
            dir.create_segment(i).unwrap();
        }

        let deleted = dir.delete_before(2).unwrap();
        assert_eq!(deleted, 2);

        let indices: Vec<u32> = dir.list().unwrap().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[test]
    fn truncate_segment_shortens_file() {
        let temp = tempdir().unwrap();
        let dir = WalDir::open(temp.path()).unwrap();

        let mut segment = dir.create_segment(0).unwrap();
        segment.append(b"0123456789").unwrap();
        segment.close().unwrap();

        dir.truncate_segment(0, 4).unwrap();
        assert_eq!(dir.segment_size(0).unwrap(), 4);
    }

    #[test]
    fn open_for_read_is_independent() {
        use std::io::Read;

        let temp = tempdir().unwrap();
        let dir = WalDir::open(temp.path()).unwrap();

        let mut segment = dir.create_segment(0).unwrap();
        segment.append(b"shared bytes").unwrap();
        segment.sync().unwrap();

        let mut reader = dir.open_for_read(0).unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).unwrap();
        assert_eq!(&contents, b"shared bytes");
    }
}
