//! Configuration for HashDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Largest supported bucket-count exponent (2^32 buckets).
pub const MAX_BUCKET_BITS: u32 = 32;

/// Main configuration for a HashDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single database file
    pub path: PathBuf,

    /// Bucket-count exponent B: the table has 2^B buckets.
    /// Only used when creating a file; an existing file carries B in its header.
    pub bucket_bits: u32,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// How each `set` forces its writes to stable storage
    pub sync_mode: SyncMode,

    // -------------------------------------------------------------------------
    // Write Semantics
    // -------------------------------------------------------------------------
    /// What `set` does when the key is already stored
    pub update_policy: UpdatePolicy,
}

/// Sync mode applied at the end of every `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` data and metadata (safest)
    All,

    /// `fdatasync`: data only, skips metadata that is not needed to read it back
    Data,
}

/// Behaviour of `set` for a key that already has a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Replace the stored value (in place when it fits the record's allocation)
    Overwrite,

    /// Keep the first stored value and ignore later writes
    KeepExisting,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./hashdb.db"),
            bucket_bits: 16, // 65536 buckets, 512 KiB directory
            sync_mode: SyncMode::All,
            update_policy: UpdatePolicy::Overwrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the bucket-count exponent used at creation
    pub fn bucket_bits(mut self, bits: u32) -> Self {
        self.config.bucket_bits = bits;
        self
    }

    /// Set the sync mode
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    /// Set the duplicate-key policy
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.config.update_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
