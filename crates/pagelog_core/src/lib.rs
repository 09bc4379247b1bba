//! # pagelog core
//!
//! A durable, append-only record log organized as fixed-size segment files
//! partitioned into fixed-size pages, with per-record framing and CRC-32C
//! protection.
//!
//! This crate provides:
//! - Fragment framing within 32 KiB pages ([`FragmentType`], page constants)
//! - Segment files named by zero-padded index, with rotation at a configured
//!   segment size ([`Segment`], [`WalDir`])
//! - The single-owner writer with a buffered page-aligned write path
//!   ([`Wal`])
//! - A streaming reader that reassembles records across pages and segments
//!   and pinpoints the first corruption ([`WalReader`])
//! - Repair by truncation to the last known-good record boundary
//!   ([`Wal::repair`])
//!
//! ## Write path
//!
//! ```rust,ignore
//! use pagelog_core::Wal;
//!
//! let mut wal = Wal::open("wal-dir")?;
//! let locations = wal.append(&[b"first record", b"second record"])?;
//! wal.sync()?;
//! wal.close()?;
//! ```
//!
//! ## Recovery
//!
//! ```rust,ignore
//! use pagelog_core::{SegmentRangeReader, Wal, WalReader};
//!
//! let mut reader = WalReader::new(SegmentRangeReader::open("wal-dir")?);
//! while reader.next() {
//!     replay(reader.record());
//! }
//! if reader.err().is_some() {
//!     let mut wal = Wal::open("wal-dir")?;
//!     wal.repair(reader.err())?;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod frame;
mod reader;
mod segment;
mod stats;
mod types;
mod writer;

pub use config::WalConfig;
pub use dir::WalDir;
pub use error::{WalError, WalResult};
pub use frame::{
    checksum, FragmentType, DEFAULT_SEGMENT_SIZE, HEADER_SIZE, MAX_FRAGMENT_PAYLOAD, PAGE_SIZE,
};
pub use reader::{SegmentRangeReader, WalReader};
pub use segment::{list_segments, parse_segment_file_name, segment_file_name, Segment, SegmentInfo};
pub use stats::{StatsSnapshot, WalStats};
pub use types::LogLocation;
pub use writer::{Wal, MAX_RECORD_SIZE, MIN_COMPRESS_LEN};
