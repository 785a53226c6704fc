//! Storage Module
//!
//! The single database file and its bucket directory.
//!
//! ## Responsibilities
//! - Create and validate the file layout
//! - Read, rewrite and append records by absolute offset
//! - Persist the bucket directory as one block
//! - Force writes to stable storage
//!
//! ## File Format (big-endian)
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Header (4 bytes)                       │
//! │   BucketBits: u32                      │
//! ├────────────────────────────────────────┤
//! │ Bucket Directory (8 × 2^B bytes)       │
//! │   RootOffset: u64  (0 = empty bucket)  │
//! │   ... one per bucket ...               │
//! ├────────────────────────────────────────┤
//! │ Record Log (append-only)               │
//! │   [Record][Record][Record] ...         │
//! └────────────────────────────────────────┘
//! ```

mod directory;
mod file;

pub use directory::BucketDirectory;
pub use file::DbFile;

/// Header size: BucketBits (4) = 4 bytes
pub const FILE_HEADER_SIZE: u64 = 4;

/// Size of one directory entry: RootOffset (8) = 8 bytes
pub const DIRECTORY_ENTRY_SIZE: u64 = 8;
