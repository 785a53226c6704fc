//! Database Module
//!
//! The persistent hash table that coordinates all components.
//!
//! ## Responsibilities
//! - Create or open the database file
//! - Route each key to its bucket and walk the bucket tree
//! - Link new records into the tree and persist the directory
//! - Force every `set` to stable storage before returning

use std::path::Path;

use parking_lot::Mutex;

use crate::config::{Config, UpdatePolicy};
use crate::error::Result;
use crate::hash;
use crate::record::{Record, RecordOffset, Side};
use crate::storage::{BucketDirectory, DbFile};
use crate::tree::{self, Search};

/// A file-backed hash table of byte-string keys and values
///
/// ## Concurrency Model: Whole-Database Exclusion
///
/// - Every operation (`get` included) takes the same `Mutex`
/// - A reader therefore never sees a half-written record or directory
/// - Reads need exclusive access anyway: the file handle seeks before reading
///
/// `HashDb` is `Send + Sync`; share it across threads with `Arc`.
pub struct HashDb {
    /// Database configuration
    config: Config,

    /// File handle and bucket directory, only touched under the lock
    inner: Mutex<Inner>,
}

struct Inner {
    file: DbFile,
    directory: BucketDirectory,
}

/// Result of a full integrity check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Buckets with a root record
    pub buckets_used: u64,
    /// Records reachable from any bucket
    pub records: u64,
    /// Longest root-to-leaf path over all buckets
    pub max_depth: u64,
}

impl HashDb {
    /// Create a new database file with `2^bucket_bits` buckets
    ///
    /// Any existing file at `path` is replaced.
    pub fn create(path: impl AsRef<Path>, bucket_bits: u32) -> Result<Self> {
        let config = Config::builder()
            .path(path.as_ref())
            .bucket_bits(bucket_bits)
            .build();
        Self::create_with_config(config)
    }

    /// Create a new database file as described by `config`
    pub fn create_with_config(config: Config) -> Result<Self> {
        let (file, directory) = DbFile::create(&config.path, config.bucket_bits, config.sync_mode)?;

        tracing::info!(
            "Created database {} with 2^{} buckets",
            config.path.display(),
            config.bucket_bits
        );

        Ok(Self::from_parts(config, file, directory))
    }

    /// Open an existing database file with default settings
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open_with_config(config)
    }

    /// Open an existing database file
    ///
    /// The bucket exponent is read from the file; `config.bucket_bits` is
    /// replaced by it.
    pub fn open_with_config(mut config: Config) -> Result<Self> {
        let (file, directory) = DbFile::open(&config.path, config.sync_mode)?;

        if config.bucket_bits != directory.bucket_bits() {
            tracing::debug!(
                "Using bucket exponent {} from file header (configured {})",
                directory.bucket_bits(),
                config.bucket_bits
            );
        }
        config.bucket_bits = directory.bucket_bits();

        tracing::info!(
            "Opened database {}: 2^{} buckets, {} in use, {} bytes",
            config.path.display(),
            directory.bucket_bits(),
            directory.used_buckets(),
            file.len()
        );

        Ok(Self::from_parts(config, file, directory))
    }

    fn from_parts(config: Config, file: DbFile, directory: BucketDirectory) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner { file, directory }),
        }
    }

    /// Get the value stored under `key`
    ///
    /// Returns `Ok(None)` if the key was never set.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let bucket = hash::bucket_index(key, inner.directory.bucket_bits());

        let Some(root) = inner.directory.root(bucket) else {
            return Ok(None);
        };

        tree::lookup(&mut inner.file, root, key)
    }

    /// Check whether `key` has a record
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Store `value` under `key`
    ///
    /// Steps:
    /// 1. Hash the key to its bucket
    /// 2. Empty bucket: append the record, make it the root, rewrite the directory
    /// 3. Otherwise walk the tree, append the record, link it under its parent
    /// 4. Sync before returning
    ///
    /// An existing key is handled according to the configured `UpdatePolicy`.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut record = Record::new(key, value)?;

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let bucket = hash::bucket_index(key, inner.directory.bucket_bits());

        match inner.directory.root(bucket) {
            None => {
                let offset = inner.file.append_record(&mut record)?;
                inner.assign_root(bucket, offset)?;
                tracing::debug!(
                    "Stored {} byte key as root of bucket {} at offset {}",
                    key.len(),
                    bucket,
                    offset.get()
                );
            }
            Some(root) => match tree::search(&mut inner.file, root, key)? {
                Search::Vacant { mut parent, side } => {
                    let offset = inner.file.append_record(&mut record)?;
                    parent.set_child(side, offset);
                    inner.file.write_record(&parent)?;
                    tracing::debug!(
                        "Stored {} byte key in bucket {} at offset {} ({:?} of {})",
                        key.len(),
                        bucket,
                        offset.get(),
                        side,
                        parent.offset
                    );
                }
                Search::Found { record: existing, parent } => match self.config.update_policy {
                    UpdatePolicy::KeepExisting => {
                        tracing::warn!(
                            "Ignoring write to existing key in bucket {} at offset {}",
                            bucket,
                            existing.offset
                        );
                        return Ok(());
                    }
                    UpdatePolicy::Overwrite => {
                        if existing.value == value {
                            return Ok(());
                        }
                        inner.replace(bucket, existing, parent, record)?;
                    }
                },
            },
        }

        inner.file.sync()
    }

    /// Force all writes to stable storage
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync()
    }

    /// Walk every bucket tree and check its structure
    ///
    /// Fails with `Corruption` on the first ordering, bucket-membership, or
    /// link violation.
    pub fn verify(&self) -> Result<VerifyReport> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let bucket_bits = inner.directory.bucket_bits();

        let mut report = VerifyReport::default();
        for (bucket, root) in inner.directory.roots() {
            let stats = tree::verify_bucket(&mut inner.file, bucket, bucket_bits, root)?;
            report.buckets_used += 1;
            report.records += stats.records;
            report.max_depth = report.max_depth.max(stats.depth);
        }

        tracing::debug!(
            "Verified {} records in {} buckets, max depth {}",
            report.records,
            report.buckets_used,
            report.max_depth
        );

        Ok(report)
    }

    /// Close the database, syncing outstanding writes
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the bucket-count exponent B
    pub fn bucket_bits(&self) -> u32 {
        self.config.bucket_bits
    }

    /// Get the number of buckets (2^B)
    pub fn bucket_count(&self) -> u64 {
        1u64 << self.config.bucket_bits
    }

    /// Get the current file size in bytes
    pub fn file_len(&self) -> u64 {
        self.inner.lock().file.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Inner {
    /// Set a bucket's root and rewrite the directory block
    fn assign_root(&mut self, bucket: u64, root: RecordOffset) -> Result<()> {
        self.directory.set_root(bucket, root)?;
        self.file.write_directory(&self.directory)
    }

    /// Replace the value of `existing` with the one carried by `replacement`
    ///
    /// Rewrites in place when the new value fits the existing allocation.
    /// Otherwise appends `replacement` with the same children and relinks the
    /// parent (or the bucket root) to it.
    fn replace(
        &mut self,
        bucket: u64,
        mut existing: Record,
        parent: Option<(Record, Side)>,
        mut replacement: Record,
    ) -> Result<()> {
        if existing.fits_value(replacement.value.len()) {
            existing.value = replacement.value;
            self.file.write_record(&existing)?;
            tracing::debug!(
                "Overwrote value in place at offset {} in bucket {}",
                existing.offset,
                bucket
            );
            return Ok(());
        }

        replacement.left = existing.left;
        replacement.right = existing.right;
        let offset = self.file.append_record(&mut replacement)?;

        match parent {
            Some((mut parent, side)) => {
                parent.set_child(side, offset);
                self.file.write_record(&parent)?;
            }
            None => self.assign_root(bucket, offset)?,
        }

        tracing::debug!(
            "Relocated record for bucket {} from offset {} to {}",
            bucket,
            existing.offset,
            offset.get()
        );

        Ok(())
    }
}

impl std::fmt::Debug for HashDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashDb")
            .field("path", &self.config.path)
            .field("bucket_bits", &self.config.bucket_bits)
            .finish()
    }
}
