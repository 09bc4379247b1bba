//! Streaming reader that reassembles logical records from fragments.
//!
//! The reader pulls fragments out of an opaque byte stream - typically the
//! log's segment files concatenated in index order - validates checksums and
//! fragment ordering, and yields reassembled records one at a time.
//!
//! # Recovery policy
//!
//! The reader distinguishes a **clean end** from **corruption**:
//!
//! - End-of-stream at a fragment boundary is a clean end, even when a record
//!   is unfinished. A crash tears the tail at an arbitrary point; the intact
//!   prefix stands and the torn fragments are simply not yielded.
//! - Everything else terminates iteration with
//!   [`WalError::Corruption`]: a checksum mismatch, an invalid type byte, an
//!   out-of-order fragment, an over-long fragment, a non-zero byte in page
//!   padding, or end-of-stream inside a header or payload.
//!
//! A corruption error carries `valid_through`, the stream position after the
//! last intact record, which is exactly where
//! [`Wal::repair`](crate::Wal::repair) truncates.

use crate::error::{WalError, WalResult};
use crate::frame::{self, FragmentType, HEADER_SIZE, MAX_FRAGMENT_PAYLOAD, PAGE_SIZE};
use crate::segment::list_segments;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// A pull-style reader over a stream of encoded fragments.
///
/// Obtain records with the `next`/`record` pair:
///
/// ```rust,ignore
/// let mut reader = WalReader::new(source);
/// while reader.next() {
///     handle(reader.record());
/// }
/// if let Some(err) = reader.err() {
///     // stopped on corruption rather than clean end-of-log
/// }
/// ```
pub struct WalReader<R> {
    src: R,
    /// Reassembled payload of the current record.
    rec: Vec<u8>,
    /// Compressed payload accumulator, decompressed into `rec` on completion.
    snappy_buf: Vec<u8>,
    /// Per-fragment read buffer.
    scratch: Vec<u8>,
    /// Total bytes consumed from the source.
    total: u64,
    /// Bytes consumed through the end of the last intact record.
    valid_through: u64,
    err: Option<WalError>,
}

impl<R: Read> WalReader<R> {
    /// Creates a reader over `src`.
    pub fn new(src: R) -> Self {
        Self {
            src,
            rec: Vec::new(),
            snappy_buf: Vec::new(),
            scratch: Vec::with_capacity(PAGE_SIZE),
            total: 0,
            valid_through: 0,
            err: None,
        }
    }

    /// Advances to the next record.
    ///
    /// Returns `false` at a clean end of the stream or on error; check
    /// [`err`](Self::err) to tell the two apart.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.read_record() {
            Ok(true) => {
                self.valid_through = self.total;
                true
            }
            Ok(false) => false,
            Err(e) => {
                self.err = Some(e);
                false
            }
        }
    }

    /// The reassembled payload of the current record.
    ///
    /// Only meaningful after [`next`](Self::next) returned `true`; the slice
    /// is overwritten by the following call.
    #[must_use]
    pub fn record(&self) -> &[u8] {
        &self.rec
    }

    /// The error that terminated iteration, if any.
    #[must_use]
    pub fn err(&self) -> Option<&WalError> {
        self.err.as_ref()
    }

    /// Total bytes consumed from the source.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.total
    }

    /// Bytes consumed through the end of the last intact record.
    ///
    /// This is the truncation point repair uses.
    #[must_use]
    pub fn valid_through(&self) -> u64 {
        self.valid_through
    }

    fn read_record(&mut self) -> WalResult<bool> {
        self.rec.clear();
        self.snappy_buf.clear();
        let mut compressed = false;
        let mut in_record = false;

        loop {
            let frag_start = self.total;

            let Some(type_byte) = self.read_type_byte()? else {
                return Ok(false);
            };
            self.total += 1;

            let Some(ftype) = FragmentType::from_byte(type_byte) else {
                return Err(self.corruption(
                    frag_start,
                    format!("invalid fragment type byte {type_byte:#04x}"),
                ));
            };

            if ftype == FragmentType::PageTerm {
                // The zero type byte opens a padded region running to the
                // page boundary; every byte of it must be zero.
                let until_boundary = PAGE_SIZE as u64 - (self.total % PAGE_SIZE as u64);
                if until_boundary == PAGE_SIZE as u64 {
                    // The zero byte itself was the last byte of the page.
                    continue;
                }
                self.scratch.resize(until_boundary as usize, 0);
                match self.src.read_exact(&mut self.scratch) {
                    Ok(()) => self.total += until_boundary,
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        return Err(
                            self.corruption(frag_start, "unexpected end of log in page padding")
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
                if self.scratch.iter().any(|&b| b != 0) {
                    return Err(self.corruption(frag_start, "non-zero byte in page padding"));
                }
                continue;
            }

            let mut hdr = [0u8; HEADER_SIZE - 1];
            match self.src.read_exact(&mut hdr) {
                Ok(()) => self.total += hdr.len() as u64,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(
                        self.corruption(frag_start, "unexpected end of log in fragment header")
                    );
                }
                Err(e) => return Err(e.into()),
            }

            let length = u16::from_be_bytes([hdr[0], hdr[1]]) as usize;
            let crc = u32::from_be_bytes([hdr[2], hdr[3], hdr[4], hdr[5]]);

            if length > MAX_FRAGMENT_PAYLOAD {
                return Err(self.corruption(
                    frag_start,
                    format!("fragment length {length} exceeds page capacity"),
                ));
            }

            self.scratch.resize(length, 0);
            match self.src.read_exact(&mut self.scratch) {
                Ok(()) => self.total += length as u64,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(
                        self.corruption(frag_start, "unexpected end of log in fragment payload")
                    );
                }
                Err(e) => return Err(e.into()),
            }

            let computed = frame::checksum(&self.scratch);
            if computed != crc {
                return Err(self.corruption(
                    frag_start,
                    format!("checksum mismatch: stored {crc:#010x}, computed {computed:#010x}"),
                ));
            }

            match ftype {
                FragmentType::Full | FragmentType::SnappyFull => {
                    if in_record {
                        return Err(
                            self.corruption(frag_start, "Full fragment inside an unfinished record")
                        );
                    }
                    compressed = ftype.is_compressed();
                    if compressed {
                        self.snappy_buf.extend_from_slice(&self.scratch);
                    } else {
                        self.rec.extend_from_slice(&self.scratch);
                    }
                    self.finish_record(compressed)?;
                    return Ok(true);
                }
                FragmentType::First | FragmentType::SnappyFirst => {
                    if in_record {
                        return Err(self
                            .corruption(frag_start, "First fragment inside an unfinished record"));
                    }
                    in_record = true;
                    compressed = ftype.is_compressed();
                    if compressed {
                        self.snappy_buf.extend_from_slice(&self.scratch);
                    } else {
                        self.rec.extend_from_slice(&self.scratch);
                    }
                }
                FragmentType::Middle => {
                    if !in_record {
                        return Err(self.corruption(frag_start, "Middle fragment outside a record"));
                    }
                    if compressed {
                        self.snappy_buf.extend_from_slice(&self.scratch);
                    } else {
                        self.rec.extend_from_slice(&self.scratch);
                    }
                }
                FragmentType::Last => {
                    if !in_record {
                        return Err(self.corruption(frag_start, "Last fragment outside a record"));
                    }
                    if compressed {
                        self.snappy_buf.extend_from_slice(&self.scratch);
                    } else {
                        self.rec.extend_from_slice(&self.scratch);
                    }
                    self.finish_record(compressed)?;
                    return Ok(true);
                }
                FragmentType::PageTerm => unreachable!("page terminator handled above"),
            }
        }
    }

    /// Reads the type byte opening the next fragment.
    ///
    /// Returns `None` at end-of-stream, the one place a clean end can occur.
    fn read_type_byte(&mut self) -> WalResult<Option<u8>> {
        let mut b = [0u8; 1];
        loop {
            match self.src.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(b[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn finish_record(&mut self, compressed: bool) -> WalResult<()> {
        if compressed {
            self.rec = snap::raw::Decoder::new()
                .decompress_vec(&self.snappy_buf)
                .map_err(|e| {
                    WalError::corruption(
                        self.total,
                        self.valid_through,
                        format!("snappy decompression failed: {e}"),
                    )
                })?;
        }
        Ok(())
    }

    fn corruption(&self, offset: u64, reason: impl Into<String>) -> WalError {
        WalError::corruption(offset, self.valid_through, reason)
    }
}

/// Chains a directory's segment files into one byte stream in index order.
///
/// Segment boundaries are invisible to the framing layer: a page boundary
/// that coincides with a segment boundary reads the same as any other.
pub struct SegmentRangeReader {
    files: Vec<File>,
    current: usize,
}

impl SegmentRangeReader {
    /// Opens every segment in `dir` for reading.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be listed or a segment cannot be
    /// opened.
    pub fn open(dir: impl AsRef<Path>) -> WalResult<Self> {
        let dir = dir.as_ref();
        let infos = list_segments(dir)?;
        let mut files = Vec::with_capacity(infos.len());
        for info in &infos {
            files.push(File::open(dir.join(&info.name))?);
        }
        Ok(Self { files, current: 0 })
    }
}

impl Read for SegmentRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(file) = self.files.get_mut(self.current) {
            let n = file.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.current += 1;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_fragment;
    use std::fs;
    use tempfile::tempdir;

    /// Patterned test data, long enough for multi-page cases.
    fn data() -> Vec<u8> {
        (0..100_000usize).map(|i| (i % 251) as u8).collect()
    }

    fn encoded_fragment(ftype: FragmentType, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE + payload.len()];
        encode_fragment(&mut buf, ftype, payload);
        buf
    }

    /// A page-termination region: the zero type byte plus explicit padding
    /// content (normally zeros; tests can smuggle in a bad byte).
    fn term_region(padding: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8];
        buf.extend_from_slice(padding);
        buf
    }

    /// Runs a reader over `buf` and checks the yielded records and whether
    /// iteration ends in an error.
    fn run_case(buf: &[u8], expected: &[&[u8]], should_fail: bool) {
        let mut reader = WalReader::new(buf);

        let mut got = Vec::new();
        while reader.next() {
            got.push(reader.record().to_vec());
        }

        assert_eq!(got.len(), expected.len(), "yielded record count");
        for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
            assert_eq!(g.as_slice(), *e, "record {i} payload");
        }
        assert_eq!(reader.err().is_some(), should_fail, "error state: {:?}", reader.err());
    }

    #[test]
    fn sequence_of_valid_records() {
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..200]));
        buf.extend(encoded_fragment(FragmentType::First, &d[200..300]));
        buf.extend(encoded_fragment(FragmentType::Last, &d[300..400]));
        buf.extend(encoded_fragment(FragmentType::First, &d[400..800]));
        buf.extend(encoded_fragment(FragmentType::Middle, &d[800..900]));
        // Pad so the termination lands exactly on the page boundary.
        buf.extend(term_region(&vec![0u8; PAGE_SIZE - 900 - HEADER_SIZE * 5 - 1]));
        buf.extend(encoded_fragment(FragmentType::Last, &d[900..900]));
        buf.extend(encoded_fragment(FragmentType::First, &d[900..1000]));
        buf.extend(encoded_fragment(FragmentType::Middle, &d[1000..1200]));
        buf.extend(encoded_fragment(FragmentType::Middle, &d[1200..30000]));
        buf.extend(encoded_fragment(FragmentType::Middle, &d[30000..30001]));
        buf.extend(encoded_fragment(FragmentType::Middle, &d[30001..30001]));
        buf.extend(encoded_fragment(FragmentType::Last, &d[30001..32000]));

        run_case(
            &buf,
            &[&d[0..200], &d[200..400], &d[400..900], &d[900..32000]],
            false,
        );
    }

    #[test]
    fn full_record_exactly_filling_a_page() {
        let d = data();
        let buf = encoded_fragment(FragmentType::Full, &d[0..PAGE_SIZE - HEADER_SIZE]);
        run_case(&buf, &[&d[0..PAGE_SIZE - HEADER_SIZE]], false);
    }

    #[test]
    fn fragment_longer_than_a_page_rejected() {
        // The writer can never produce this; a reader must still refuse it.
        let d = data();
        let buf = encoded_fragment(FragmentType::Full, &d[0..PAGE_SIZE + 1]);
        run_case(&buf, &[], true);
    }

    #[test]
    fn two_full_records_overflowing_page() {
        // A known legacy producer shape: two Full fragments whose combined
        // size exceeds one page. The writer cannot emit this, the reader
        // accepts it.
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..PAGE_SIZE / 2]));
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..PAGE_SIZE / 2]));

        run_case(&buf, &[&d[0..PAGE_SIZE / 2], &d[0..PAGE_SIZE / 2]], false);
    }

    #[test]
    fn lone_middle_fragment_rejected() {
        let d = data();
        let buf = encoded_fragment(FragmentType::Middle, &d[0..200]);
        run_case(&buf, &[], true);
    }

    #[test]
    fn lone_last_fragment_rejected() {
        let d = data();
        let buf = encoded_fragment(FragmentType::Last, &d[0..200]);
        run_case(&buf, &[], true);
    }

    #[test]
    fn full_inside_open_record_rejected() {
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::First, &d[0..200]));
        buf.extend(encoded_fragment(FragmentType::Full, &d[200..400]));
        run_case(&buf, &[], true);
    }

    #[test]
    fn full_after_middle_rejected() {
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::First, &d[0..100]));
        buf.extend(encoded_fragment(FragmentType::Middle, &d[100..200]));
        buf.extend(encoded_fragment(FragmentType::Full, &d[200..400]));
        run_case(&buf, &[], true);
    }

    #[test]
    fn nonzero_byte_after_page_term() {
        // The record before the bad padding is still yielded; the padding
        // scan then fails.
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..100]));
        let mut padding = vec![0u8; PAGE_SIZE - HEADER_SIZE - 102];
        padding.push(1);
        buf.extend(term_region(&padding));

        run_case(&buf, &[&d[0..100]], true);
    }

    #[test]
    fn invalid_type_byte_rejected() {
        let d = data();
        let mut buf = encoded_fragment(FragmentType::Full, &d[0..50]);
        buf.push(0x7F);
        buf.extend([0u8; 6]);

        run_case(&buf, &[&d[0..50]], true);
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let d = data();
        let mut buf = encoded_fragment(FragmentType::Full, &d[0..300]);
        // Flip one payload bit.
        let target = HEADER_SIZE + 150;
        buf[target] ^= 0x01;

        run_case(&buf, &[], true);
    }

    #[test]
    fn header_bit_flip_rejected() {
        let d = data();
        let mut buf = encoded_fragment(FragmentType::Full, &d[0..300]);
        // Flip a bit in the stored CRC.
        buf[4] ^= 0x10;

        run_case(&buf, &[], true);
    }

    #[test]
    fn torn_header_is_corruption() {
        let d = data();
        let mut buf = encoded_fragment(FragmentType::Full, &d[0..100]);
        // A second fragment whose header is cut short.
        buf.extend([FragmentType::Full.as_byte(), 0x00, 0x05]);

        run_case(&buf, &[&d[0..100]], true);
    }

    #[test]
    fn torn_payload_is_corruption() {
        let d = data();
        let mut buf = encoded_fragment(FragmentType::Full, &d[0..100]);
        let mut torn = encoded_fragment(FragmentType::Full, &d[100..600]);
        torn.truncate(HEADER_SIZE + 200);
        buf.extend(torn);

        run_case(&buf, &[&d[0..100]], true);
    }

    #[test]
    fn torn_record_at_fragment_boundary_is_clean_eof() {
        // A crash after a complete First fragment but before the rest: the
        // stream ends at a fragment boundary, which reads as a clean end.
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..100]));
        buf.extend(encoded_fragment(FragmentType::First, &d[100..300]));

        run_case(&buf, &[&d[0..100]], false);
    }

    #[test]
    fn zero_length_last_closes_record() {
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::First, &d[0..500]));
        buf.extend(encoded_fragment(FragmentType::Last, &[]));

        run_case(&buf, &[&d[0..500]], false);
    }

    #[test]
    fn empty_stream_is_clean() {
        run_case(&[], &[], false);
    }

    #[test]
    fn offsets_track_consumed_bytes() {
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..100]));
        buf.extend(encoded_fragment(FragmentType::Full, &d[100..150]));

        let mut reader = WalReader::new(buf.as_slice());

        assert!(reader.next());
        assert_eq!(reader.offset(), (HEADER_SIZE + 100) as u64);
        assert_eq!(reader.valid_through(), (HEADER_SIZE + 100) as u64);

        assert!(reader.next());
        assert_eq!(reader.offset(), (HEADER_SIZE * 2 + 150) as u64);
        assert_eq!(reader.valid_through(), reader.offset());

        assert!(!reader.next());
        assert!(reader.err().is_none());
    }

    #[test]
    fn corruption_error_carries_valid_through() {
        let d = data();
        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::Full, &d[0..100]));
        let mut bad = encoded_fragment(FragmentType::Full, &d[100..200]);
        bad[HEADER_SIZE] ^= 0xFF;
        buf.extend(bad);

        let mut reader = WalReader::new(buf.as_slice());
        assert!(reader.next());
        assert!(!reader.next());

        match reader.err() {
            Some(WalError::Corruption {
                offset,
                valid_through,
                ..
            }) => {
                assert_eq!(*offset, (HEADER_SIZE + 100) as u64);
                assert_eq!(*valid_through, (HEADER_SIZE + 100) as u64);
            }
            other => panic!("expected corruption, got {other:?}"),
        }
    }

    #[test]
    fn snappy_full_fragment_decompresses() {
        let record: Vec<u8> = data()[0..4000].to_vec();
        let compressed = snap::raw::Encoder::new().compress_vec(&record).unwrap();
        let buf = encoded_fragment(FragmentType::SnappyFull, &compressed);

        run_case(&buf, &[&record], false);
    }

    #[test]
    fn snappy_first_marker_covers_whole_record() {
        // The compression marker lives on the opening fragment only;
        // continuations are plain Middle/Last.
        let record: Vec<u8> = data()[0..60_000].to_vec();
        let compressed = snap::raw::Encoder::new().compress_vec(&record).unwrap();
        let split = compressed.len() / 2;

        let mut buf = Vec::new();
        buf.extend(encoded_fragment(FragmentType::SnappyFirst, &compressed[..split]));
        buf.extend(encoded_fragment(FragmentType::Last, &compressed[split..]));

        run_case(&buf, &[&record], false);
    }

    #[test]
    fn snappy_garbage_is_corruption() {
        // Valid CRC over bytes that are not a Snappy stream.
        let garbage = vec![0xFFu8; 64];
        let buf = encoded_fragment(FragmentType::SnappyFull, &garbage);

        run_case(&buf, &[], true);
    }

    #[test]
    fn segment_range_reader_chains_files() {
        let d = data();
        let dir = tempdir().unwrap();

        // One record per hand-written segment file; a third foreign file is
        // ignored by the listing.
        fs::write(
            dir.path().join("00000000"),
            encoded_fragment(FragmentType::Full, &d[0..100]),
        )
        .unwrap();
        fs::write(
            dir.path().join("00000001"),
            encoded_fragment(FragmentType::Full, &d[100..300]),
        )
        .unwrap();
        fs::write(dir.path().join("LOCK"), b"").unwrap();

        let mut reader = WalReader::new(SegmentRangeReader::open(dir.path()).unwrap());

        assert!(reader.next());
        assert_eq!(reader.record(), &d[0..100]);
        assert!(reader.next());
        assert_eq!(reader.record(), &d[100..300]);
        assert!(!reader.next());
        assert!(reader.err().is_none());
    }

    #[test]
    fn fragment_split_across_segment_files() {
        // A fragment header in one file and its payload in the next reads
        // the same as a contiguous stream.
        let d = data();
        let dir = tempdir().unwrap();

        let frag = encoded_fragment(FragmentType::Full, &d[0..1000]);
        fs::write(dir.path().join("00000000"), &frag[..HEADER_SIZE + 400]).unwrap();
        fs::write(dir.path().join("00000001"), &frag[HEADER_SIZE + 400..]).unwrap();

        let mut reader = WalReader::new(SegmentRangeReader::open(dir.path()).unwrap());
        assert!(reader.next());
        assert_eq!(reader.record(), &d[0..1000]);
        assert!(!reader.next());
        assert!(reader.err().is_none());
    }
}
