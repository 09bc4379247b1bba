//! Log statistics.
//!
//! Passive counters maintained by the writer and by repair. All counters are
//! atomic and can be read while operations are in progress; readers of the
//! log itself never touch them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for write-ahead log activity.
///
/// Values are monotonically increasing. Obtain a consistent copy with
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct WalStats {
    /// Logical records appended.
    records_appended: AtomicU64,
    /// Bytes written to segment files.
    bytes_written: AtomicU64,
    /// Page buffer flushes (complete or partial).
    pages_flushed: AtomicU64,
    /// Pages written out to their full size.
    pages_completed: AtomicU64,
    /// Fsync calls issued.
    fsyncs: AtomicU64,
    /// Segment files created.
    segments_created: AtomicU64,
    /// Corruption errors consumed by repair.
    corruptions: AtomicU64,
    /// Repairs performed.
    repairs: AtomicU64,
}

impl WalStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_page_flush(&self, bytes: u64) {
        self.pages_flushed.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_page_completion(&self) {
        self.pages_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fsync(&self) {
        self.fsyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_segment_created(&self) {
        self.segments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corruption(&self) {
        self.corruptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_repair(&self) {
        self.repairs.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of logical records appended.
    pub fn records_appended(&self) -> u64 {
        self.records_appended.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes written to segment files.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of page buffer flushes.
    pub fn pages_flushed(&self) -> u64 {
        self.pages_flushed.load(Ordering::Relaxed)
    }

    /// Returns the number of pages written out to their full size.
    pub fn pages_completed(&self) -> u64 {
        self.pages_completed.load(Ordering::Relaxed)
    }

    /// Returns the number of fsync calls issued.
    pub fn fsyncs(&self) -> u64 {
        self.fsyncs.load(Ordering::Relaxed)
    }

    /// Returns the number of segment files created.
    pub fn segments_created(&self) -> u64 {
        self.segments_created.load(Ordering::Relaxed)
    }

    /// Returns the number of corruption errors consumed by repair.
    pub fn corruptions(&self) -> u64 {
        self.corruptions.load(Ordering::Relaxed)
    }

    /// Returns the number of repairs performed.
    pub fn repairs(&self) -> u64 {
        self.repairs.load(Ordering::Relaxed)
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_appended: self.records_appended(),
            bytes_written: self.bytes_written(),
            pages_flushed: self.pages_flushed(),
            pages_completed: self.pages_completed(),
            fsyncs: self.fsyncs(),
            segments_created: self.segments_created(),
            corruptions: self.corruptions(),
            repairs: self.repairs(),
        }
    }
}

/// A point-in-time copy of [`WalStats`].
///
/// A plain struct without atomics, so it can be compared, serialized, or
/// shipped off to whatever monitoring a caller runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Logical records appended.
    pub records_appended: u64,
    /// Bytes written to segment files.
    pub bytes_written: u64,
    /// Page buffer flushes (complete or partial).
    pub pages_flushed: u64,
    /// Pages written out to their full size.
    pub pages_completed: u64,
    /// Fsync calls issued.
    pub fsyncs: u64,
    /// Segment files created.
    pub segments_created: u64,
    /// Corruption errors consumed by repair.
    pub corruptions: u64,
    /// Repairs performed.
    pub repairs: u64,
}
