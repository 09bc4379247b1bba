//! On-disk fragment framing.
//!
//! Records are stored as one or more fragments laid out left-to-right within
//! fixed-size pages:
//!
//! ```text
//! | type (1) | length (2, big-endian) | crc32c (4, big-endian) | payload |
//! ```
//!
//! A fragment never crosses a page boundary. When a page lacks room for a
//! header plus at least one payload byte, the rest of the page is a
//! termination region: a single zero type byte followed by zero padding to
//! the page end. The zero type byte is reserved for exactly this purpose,
//! which is how a reader tells padding from data.
//!
//! Checksums are CRC-32C (Castagnoli) over the payload only.

/// Size of one page in bytes.
pub const PAGE_SIZE: usize = 32 * 1024;

/// Size of a fragment header in bytes.
pub const HEADER_SIZE: usize = 7;

/// Largest payload a single fragment can carry.
pub const MAX_FRAGMENT_PAYLOAD: usize = PAGE_SIZE - HEADER_SIZE;

/// Default maximum segment size: 128 pages.
pub const DEFAULT_SEGMENT_SIZE: u64 = 128 * PAGE_SIZE as u64;

/// Type byte of a fragment.
///
/// `Full` carries a whole record; `First`/`Middle`/`Last` carry the pieces
/// of a record split across pages. The Snappy variants mark a record whose
/// reassembled payload is Snappy-compressed; only the opening fragment
/// carries the marker, continuations stay `Middle`/`Last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FragmentType {
    /// Start of the zero-padded termination region filling a page tail.
    PageTerm = 0,
    /// A whole record in one fragment.
    Full = 1,
    /// Opening fragment of a split record.
    First = 2,
    /// Interior fragment of a split record.
    Middle = 3,
    /// Closing fragment of a split record.
    Last = 4,
    /// A whole Snappy-compressed record in one fragment.
    SnappyFull = 5,
    /// Opening fragment of a split Snappy-compressed record.
    SnappyFirst = 6,
}

impl FragmentType {
    /// Converts a byte to a fragment type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::PageTerm),
            1 => Some(Self::Full),
            2 => Some(Self::First),
            3 => Some(Self::Middle),
            4 => Some(Self::Last),
            5 => Some(Self::SnappyFull),
            6 => Some(Self::SnappyFirst),
            _ => None,
        }
    }

    /// Converts the fragment type to its on-disk byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns true for the Snappy-marked opening types.
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        matches!(self, Self::SnappyFull | Self::SnappyFirst)
    }
}

/// Computes the CRC-32C (Castagnoli) checksum of a fragment payload.
#[must_use]
pub fn checksum(payload: &[u8]) -> u32 {
    crc32c::crc32c(payload)
}

/// Encodes one fragment (header plus payload) into the front of `buf`.
///
/// Returns the number of bytes written. The caller guarantees the payload
/// fits in a page and `buf` has room for it.
pub(crate) fn encode_fragment(buf: &mut [u8], ftype: FragmentType, payload: &[u8]) -> usize {
    debug_assert!(payload.len() <= MAX_FRAGMENT_PAYLOAD);
    debug_assert!(buf.len() >= HEADER_SIZE + payload.len());

    buf[0] = ftype.as_byte();
    buf[1..3].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    buf[3..HEADER_SIZE].copy_from_slice(&checksum(payload).to_be_bytes());
    buf[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);
    HEADER_SIZE + payload.len()
}
