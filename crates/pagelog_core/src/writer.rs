//! The write-ahead log writer.
//!
//! The writer owns the log directory and the single page-sized scratch
//! buffer of the write path. Records are split into fragments that fit the
//! current page; complete pages go straight to the active segment, the
//! trailing partial page lives in the buffer until a sync or close. The
//! worst-case write amplification is therefore bounded at one page.
//!
//! All write-side operations take `&mut self`; cross-process exclusivity
//! comes from the directory's advisory lock.

use crate::config::WalConfig;
use crate::dir::WalDir;
use crate::error::{WalError, WalResult};
use crate::frame::{self, FragmentType, HEADER_SIZE, PAGE_SIZE};
use crate::segment::Segment;
use crate::stats::WalStats;
use crate::types::LogLocation;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Largest logical record `append` accepts: 128 MiB.
///
/// An implementation limit, not a format one; the format only bounds a
/// single fragment. Larger records would make the repair-by-truncation
/// granularity unreasonable.
pub const MAX_RECORD_SIZE: usize = 128 * 1024 * 1024;

/// Records shorter than this skip the compression attempt.
///
/// Below this, Snappy overhead makes a win impossible in practice. Longer
/// records are compressed speculatively and stored compressed only when the
/// result is strictly smaller.
pub const MIN_COMPRESS_LEN: usize = 64;

/// The single page-sized scratch buffer of the write path.
///
/// `alloc` marks the end of encoded data, `flushed` the prefix already
/// handed to the segment. Bytes past `alloc` are always zero, so writing the
/// buffer out to the page boundary doubles as page termination.
struct PageBuf {
    buf: Box<[u8]>,
    alloc: usize,
    flushed: usize,
}

impl PageBuf {
    fn new() -> Self {
        Self {
            buf: vec![0u8; PAGE_SIZE].into_boxed_slice(),
            alloc: 0,
            flushed: 0,
        }
    }

    fn remaining(&self) -> usize {
        PAGE_SIZE - self.alloc
    }

    /// True when no further fragment fits: a header plus one payload byte.
    fn exhausted(&self) -> bool {
        self.remaining() < HEADER_SIZE + 1
    }

    fn reset(&mut self) {
        self.buf.fill(0);
        self.alloc = 0;
        self.flushed = 0;
    }
}

/// The single-owner write side of the log.
///
/// ```rust,ignore
/// let mut wal = Wal::open("wal-dir")?;
/// let locs = wal.append(&[b"alpha", b"beta"])?;
/// wal.sync()?;
/// wal.close()?;
/// ```
pub struct Wal {
    config: WalConfig,
    dir: WalDir,
    segment: Segment,
    /// Pages already written out to the active segment.
    done_pages: u64,
    page: PageBuf,
    stats: Arc<WalStats>,
    closed: bool,
}

impl Wal {
    /// Opens the log in `dir` with the default segment size and no
    /// compression.
    ///
    /// # Errors
    ///
    /// Fails when the directory lock is held elsewhere or the directory
    /// cannot be prepared.
    pub fn open(dir: impl AsRef<Path>) -> WalResult<Self> {
        Self::open_with(WalConfig::new(dir.as_ref()))
    }

    /// Opens the log with the given configuration.
    ///
    /// An empty directory gets segment 0 created; otherwise the
    /// highest-indexed segment is opened for appending at its current size.
    /// No repair is attempted here - a caller that suspects a torn tail runs
    /// a [`WalReader`](crate::WalReader) and feeds its error to
    /// [`repair`](Self::repair).
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, a held directory lock, or I/O
    /// errors while scanning and opening segments.
    pub fn open_with(config: WalConfig) -> WalResult<Self> {
        config.validate()?;
        let dir = WalDir::open(&config.dir)?;
        let stats = Arc::new(WalStats::new());

        let existing = dir.list()?;
        let (segment, size) = match existing.last() {
            None => {
                let segment = dir.create_segment(0)?;
                stats.record_segment_created();
                (segment, 0)
            }
            Some(info) => {
                let segment = dir.open_segment(info.index)?;
                let size = segment.size()?;
                (segment, size)
            }
        };

        let mut page = PageBuf::new();
        page.alloc = (size % PAGE_SIZE as u64) as usize;
        page.flushed = page.alloc;

        info!(
            dir = %config.dir.display(),
            segment = segment.index(),
            offset = size,
            compress = config.compress,
            "opened write-ahead log"
        );

        Ok(Self {
            done_pages: size / PAGE_SIZE as u64,
            segment,
            page,
            dir,
            stats,
            closed: false,
            config,
        })
    }

    /// Appends records in order, returning each record's location.
    ///
    /// Complete pages produced by the call are written to the active
    /// segment as they fill; the trailing partial page stays in the buffer
    /// until [`sync`](Self::sync) or [`close`](Self::close). A record that
    /// does not fit the active segment's remaining capacity rotates to a
    /// fresh segment first, so every returned location points at the
    /// record's opening fragment.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::InvalidRecord`] - before any state change - for
    /// an empty record or one over [`MAX_RECORD_SIZE`], and
    /// [`WalError::Closed`] after `close`.
    pub fn append(&mut self, records: &[&[u8]]) -> WalResult<Vec<LogLocation>> {
        self.ensure_open()?;

        for rec in records {
            if rec.is_empty() {
                return Err(WalError::invalid_record("empty records cannot be stored"));
            }
            if rec.len() > MAX_RECORD_SIZE {
                return Err(WalError::invalid_record(format!(
                    "record of {} bytes exceeds the {MAX_RECORD_SIZE}-byte maximum",
                    rec.len()
                )));
            }
        }

        let mut locations = Vec::with_capacity(records.len());
        for rec in records {
            locations.push(self.append_record(rec)?);
        }
        Ok(locations)
    }

    fn append_record(&mut self, rec: &[u8]) -> WalResult<LogLocation> {
        // Compression happens before fragmentation and before the rotation
        // capacity check: what matters is what lands on disk.
        let compressed_buf;
        let (stored, compressed) = if self.config.compress && rec.len() >= MIN_COMPRESS_LEN {
            compressed_buf = snap::raw::Encoder::new()
                .compress_vec(rec)
                .map_err(|e| WalError::invalid_record(format!("snappy compression failed: {e}")))?;
            if compressed_buf.len() < rec.len() {
                (compressed_buf.as_slice(), true)
            } else {
                (rec, false)
            }
        } else {
            (rec, false)
        };

        if stored.len() as u64 > self.capacity_left() {
            self.rotate_segment()?;
        }

        let location = self.location();

        let mut remaining = stored;
        let mut first = true;
        while !remaining.is_empty() {
            if self.page.exhausted() {
                self.complete_page()?;
            }

            let space = self.page.remaining() - HEADER_SIZE;
            let n = remaining.len().min(space);
            let (part, rest) = remaining.split_at(n);

            let ftype = match (first, rest.is_empty(), compressed) {
                (true, true, true) => FragmentType::SnappyFull,
                (true, true, false) => FragmentType::Full,
                (true, false, true) => FragmentType::SnappyFirst,
                (true, false, false) => FragmentType::First,
                (false, true, _) => FragmentType::Last,
                (false, false, _) => FragmentType::Middle,
            };

            let start = self.page.alloc;
            frame::encode_fragment(&mut self.page.buf[start..], ftype, part);
            self.page.alloc += HEADER_SIZE + part.len();

            if self.page.exhausted() {
                self.complete_page()?;
            }

            remaining = rest;
            first = false;
        }

        self.stats.record_append();
        trace!(location = %location, bytes = rec.len(), compressed, "appended record");
        Ok(location)
    }

    /// Writes any buffered partial-page bytes and fsyncs the active segment.
    ///
    /// The partial page is written as-is, without zero padding; only `close`
    /// terminates a page early. After `sync` returns, every appended record
    /// is durable.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Closed`] after `close`, or the I/O failure.
    pub fn sync(&mut self) -> WalResult<()> {
        self.ensure_open()?;
        self.flush_partial()?;
        self.segment.sync()?;
        self.stats.record_fsync();
        Ok(())
    }

    /// Terminates the current page, fsyncs, and closes the active segment.
    ///
    /// After a close every segment file is a whole number of pages. Closing
    /// twice is a no-op; other operations on a closed log fail with
    /// [`WalError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns the I/O failure, leaving the log closed.
    pub fn close(&mut self) -> WalResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.page.alloc > 0 {
            self.complete_page()?;
        }
        self.segment.sync()?;
        self.stats.record_fsync();
        self.segment.close()?;

        info!(dir = %self.config.dir.display(), "closed write-ahead log");
        Ok(())
    }

    /// Deletes all segments strictly below `index` (retention).
    ///
    /// The active segment is never deleted, whatever `index` says. Returns
    /// the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Closed`] after `close`, or the I/O failure.
    pub fn truncate_front(&mut self, index: u32) -> WalResult<usize> {
        self.ensure_open()?;
        let bound = index.min(self.segment.index());
        let deleted = self.dir.delete_before(bound)?;
        if deleted > 0 {
            debug!(index = bound, deleted, "dropped leading segments");
        }
        Ok(deleted)
    }

    /// Truncates the log to the last record boundary a reader found intact.
    ///
    /// Call this with the error a [`WalReader`](crate::WalReader) stopped
    /// on. Segments past the truncation point are deleted, the segment
    /// holding it is shortened, and appends resume from there - mid-page if
    /// the boundary falls mid-page. `repair(None)` is a no-op, so running a
    /// reader to completion and handing over whatever it produced is always
    /// safe. Repair is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Config`] for a non-corruption error (only reader
    /// corruption is repairable), [`WalError::Closed`] after `close`, or the
    /// I/O failure.
    pub fn repair(&mut self, err: Option<&WalError>) -> WalResult<()> {
        self.ensure_open()?;
        let Some(err) = err else {
            return Ok(());
        };
        let WalError::Corruption { valid_through, .. } = err else {
            return Err(WalError::config(format!(
                "cannot repair from a non-corruption error: {err}"
            )));
        };
        self.stats.record_corruption();
        warn!(valid_through, "repairing write-ahead log");

        // Walk the segments in index order to locate the truncation point.
        let mut remaining = *valid_through;
        let mut target_index = self.segment.index();
        let mut target_offset = 0u64;
        for info in &self.dir.list()? {
            let size = self.dir.segment_size(info.index)?;
            target_index = info.index;
            if remaining <= size {
                target_offset = remaining;
                break;
            }
            target_offset = size;
            remaining -= size;
        }

        self.segment.close()?;
        self.dir.delete_after(target_index)?;
        self.dir.truncate_segment(target_index, target_offset)?;

        self.segment = self.dir.open_segment(target_index)?;
        self.done_pages = target_offset / PAGE_SIZE as u64;
        self.page.reset();
        self.page.alloc = (target_offset % PAGE_SIZE as u64) as usize;
        self.page.flushed = self.page.alloc;

        self.stats.record_repair();
        info!(
            segment = target_index,
            offset = target_offset,
            "write-ahead log repaired"
        );
        Ok(())
    }

    /// Returns the log directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the position the next appended record would start at.
    #[must_use]
    pub fn location(&self) -> LogLocation {
        LogLocation::new(
            self.segment.index(),
            self.done_pages * PAGE_SIZE as u64 + self.page.alloc as u64,
        )
    }

    /// Returns the log's statistics counters.
    ///
    /// Clone the `Arc` to watch the counters from elsewhere while the
    /// writer runs.
    #[must_use]
    pub fn stats(&self) -> &Arc<WalStats> {
        &self.stats
    }

    /// Returns the configuration the log was opened with.
    #[must_use]
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// Payload capacity left in the active segment, accounting for the
    /// header overhead of every remaining page.
    fn capacity_left(&self) -> u64 {
        let in_page = self.page.remaining() as i64 - HEADER_SIZE as i64;
        let whole_pages =
            self.config.pages_per_segment() as i64 - self.done_pages as i64 - 1;
        let left = in_page + (PAGE_SIZE - HEADER_SIZE) as i64 * whole_pages;
        left.max(0) as u64
    }

    /// Terminates the current page, fsyncs and closes the active segment,
    /// and opens the next one.
    fn rotate_segment(&mut self) -> WalResult<()> {
        if self.page.alloc > 0 {
            self.complete_page()?;
        }
        self.segment.sync()?;
        self.stats.record_fsync();
        self.segment.close()?;

        let next_index = self.segment.index() + 1;
        self.segment = self.dir.create_segment(next_index)?;
        self.stats.record_segment_created();
        self.done_pages = 0;
        self.page.reset();

        debug!(segment = next_index, "rotated to new segment");
        Ok(())
    }

    /// Writes the page out to its full size and starts a fresh one.
    ///
    /// The buffer past `alloc` is zero, so the written tail is a valid
    /// termination region.
    fn complete_page(&mut self) -> WalResult<()> {
        let data = &self.page.buf[self.page.flushed..PAGE_SIZE];
        let len = data.len() as u64;
        self.segment.append(data)?;
        self.stats.record_page_flush(len);
        self.stats.record_page_completion();
        self.page.reset();
        self.done_pages += 1;
        trace!(
            segment = self.segment.index(),
            done_pages = self.done_pages,
            "page completed"
        );
        Ok(())
    }

    /// Writes buffered bytes of the current partial page, without padding.
    fn flush_partial(&mut self) -> WalResult<()> {
        if self.page.alloc > self.page.flushed {
            let data = &self.page.buf[self.page.flushed..self.page.alloc];
            let len = data.len() as u64;
            self.segment.append(data)?;
            self.stats.record_page_flush(len);
            self.page.flushed = self.page.alloc;
        }
        Ok(())
    }

    fn ensure_open(&self) -> WalResult<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        Ok(())
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                error!(error = %e, "failed to close write-ahead log on drop");
            }
        }
    }
}
