//! Record Module
//!
//! Variable-length records stored in the record log. Each record is one
//! key/value pair plus the two child links of its per-bucket search tree.
//!
//! ## Record Format (big-endian)
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Header (28 bytes)                                             │
//! │   Size: u32 (4) | Left: u64 (8) | Right: u64 (8)              │
//! │   KeyLen: u32 (4) | ValLen: u32 (4)                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Key bytes | Value bytes                                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Zero padding up to Size (a power of two)                      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Size is fixed when the record is first written, so a later rewrite of the
//! links (same key and value) always fits in place.

mod codec;

use std::num::NonZeroU64;

pub use codec::{allocation_size, next_power_of_two, Record, RecordHeader};

/// Header size: Size (4) + Left (8) + Right (8) + KeyLen (4) + ValLen (4) = 28 bytes
pub const RECORD_HEADER_SIZE: usize = 28;

/// Smallest possible allocated size of a record
pub const MIN_RECORD_SIZE: u64 = (RECORD_HEADER_SIZE as u64).next_power_of_two();

/// Absolute file offset of a record.
///
/// Zero is never a record offset (the header lives there), so links use
/// `Option<RecordOffset>` on the Rust side and `0` on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordOffset(NonZeroU64);

impl RecordOffset {
    /// Interpret a raw on-disk link; `0` means "no record"
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw file position
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// On-disk representation of an optional link
    pub fn to_raw(link: Option<Self>) -> u64 {
        link.map_or(0, Self::get)
    }
}

/// Which child link of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Keys comparing less than the record's key
    Left,
    /// Keys comparing greater than the record's key
    Right,
}
