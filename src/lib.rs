//! # HashDB
//!
//! An embeddable, file-backed persistent hash table (a DBM) for caches,
//! session stores and mailbox-style record stores:
//! - Arbitrary byte-string keys and values, stored length-exact
//! - 2^B buckets selected by the low bits of an MD5 digest
//! - Per-bucket binary search trees threaded through file offsets
//! - Whole-database lock; every `set` is synced before it returns
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HashDb API                            │
//! │             create / open / set / get / verify              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  (Mutex: one operation at a time)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Hasher    │          │  Tree Walk  │
//!   │ key → bucket│          │ (BST/bucket)│
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                    ┌──────────────┴──────────────┐
//!                    ▼                             ▼
//!            ┌───────────────┐             ┌─────────────┐
//!            │   Directory   │             │ Record Log  │
//!            │ (root offsets)│             │  (codec)    │
//!            └───────────────┘             └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hashdb::HashDb;
//!
//! let db = HashDb::create("sessions.db", 10)?;
//! db.set(b"user/1102", b"id=1102&username=steve")?;
//! assert_eq!(db.get(b"user/1102")?, Some(b"id=1102&username=steve".to_vec()));
//! assert_eq!(db.get(b"user/9999")?, None);
//! # Ok::<(), hashdb::HashDbError>(())
//! ```
//!
//! ## Limits
//!
//! The bucket count is fixed when the file is created and there is no
//! rehashing, deletion, iteration or crash recovery.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod hash;
pub mod record;
pub mod storage;
pub mod tree;
pub mod db;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HashDbError, Result};
pub use config::{Config, SyncMode, UpdatePolicy};
pub use db::{HashDb, VerifyReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of HashDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
