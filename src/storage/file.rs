//! Database File
//!
//! Owns the file handle and performs all reads and writes by absolute offset.
//! Every record read is validated against the file layout before its payload
//! is trusted.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::{SyncMode, MAX_BUCKET_BITS};
use crate::error::{HashDbError, Result};
use crate::record::{Record, RecordHeader, RecordOffset, MIN_RECORD_SIZE, RECORD_HEADER_SIZE};

use super::{BucketDirectory, FILE_HEADER_SIZE};

/// The single database file
#[derive(Debug)]
pub struct DbFile {
    file: File,
    path: PathBuf,
    /// Current file length, tracked in memory (all writes go through `self`)
    len: u64,
    /// First byte of the record log
    data_start: u64,
    sync_mode: SyncMode,
}

impl DbFile {
    /// Create a new file with an empty directory of `2^bucket_bits` buckets
    ///
    /// An existing file at `path` is truncated. If the initial header cannot be
    /// written, the file is removed again.
    pub fn create(
        path: &Path,
        bucket_bits: u32,
        sync_mode: SyncMode,
    ) -> Result<(Self, BucketDirectory)> {
        if bucket_bits > MAX_BUCKET_BITS {
            return Err(HashDbError::Config(format!(
                "bucket_bits must be at most {}, got {}",
                MAX_BUCKET_BITS, bucket_bits
            )));
        }

        let create_error = |source: io::Error| HashDbError::Create {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(create_error)?;

        let directory = BucketDirectory::new(bucket_bits);
        let mut db_file = Self {
            file,
            path: path.to_path_buf(),
            len: 0,
            data_start: directory.data_start(),
            sync_mode,
        };

        let initialised = db_file
            .write_directory(&directory)
            .and_then(|()| db_file.sync());
        if let Err(e) = initialised {
            drop(db_file);
            let _ = fs::remove_file(path);
            return Err(match e {
                HashDbError::Io(source) => create_error(source),
                other => other,
            });
        }

        Ok((db_file, directory))
    }

    /// Open an existing file and load its directory
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<(Self, BucketDirectory)> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        let mut db_file = Self {
            file,
            path: path.to_path_buf(),
            len,
            data_start: FILE_HEADER_SIZE,
            sync_mode,
        };

        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        db_file.read_exact_at(0, &mut header)?;
        let bucket_bits = u32::from_be_bytes(header);
        if bucket_bits > MAX_BUCKET_BITS {
            return Err(HashDbError::Corruption(format!(
                "bucket exponent {} exceeds maximum of {}",
                bucket_bits, MAX_BUCKET_BITS
            )));
        }

        let data_start = BucketDirectory::encoded_len(bucket_bits);
        if len < data_start {
            return Err(HashDbError::Corruption(format!(
                "file is {} bytes but its bucket directory ends at {}",
                len, data_start
            )));
        }

        let mut block = vec![0u8; data_start as usize];
        db_file.read_exact_at(0, &mut block)?;
        let directory = BucketDirectory::decode(&block)?;
        db_file.data_start = data_start;

        for (bucket, root) in directory.roots() {
            if !db_file.in_record_log(root.get()) {
                return Err(HashDbError::Corruption(format!(
                    "bucket {} root offset {} lies outside the record log",
                    bucket,
                    root.get()
                )));
            }
        }

        Ok((db_file, directory))
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Read and validate the record at `offset`
    pub fn read_record(&mut self, offset: RecordOffset) -> Result<Record> {
        let start = offset.get();
        if !self.in_record_log(start) {
            return Err(HashDbError::Corruption(format!(
                "record offset {} lies outside the record log",
                start
            )));
        }

        let mut raw = [0u8; RECORD_HEADER_SIZE];
        self.read_exact_at(start, &mut raw)?;
        let header = RecordHeader::decode(&raw);
        header.validate()?;

        let end = start.saturating_add(u64::from(header.allocated_size));
        if end > self.len {
            return Err(HashDbError::Corruption(format!(
                "record at offset {} extends to {} past end of file {}",
                start, end, self.len
            )));
        }

        for link in [header.left, header.right] {
            if link != 0 && !self.in_record_log(link) {
                return Err(HashDbError::Corruption(format!(
                    "record at offset {} links to {} outside the record log",
                    start, link
                )));
            }
        }

        let mut payload = vec![0u8; header.payload_len() as usize];
        self.read_exact_at(start + RECORD_HEADER_SIZE as u64, &mut payload)?;

        Ok(Record::from_parts(start, &header, payload))
    }

    /// Rewrite a placed record at its own offset, within its allocation
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if !self.in_record_log(record.offset) {
            return Err(HashDbError::Corruption(format!(
                "refusing to rewrite record at offset {} outside the record log",
                record.offset
            )));
        }

        let bytes = record.encode()?;
        self.write_all_at(record.offset, &bytes)
    }

    /// Append a record at end of file and assign its offset
    pub fn append_record(&mut self, record: &mut Record) -> Result<RecordOffset> {
        let offset = RecordOffset::new(self.len)
            .ok_or_else(|| HashDbError::Corruption("append at offset 0".to_string()))?;

        record.offset = offset.get();
        let bytes = record.encode()?;
        self.write_all_at(offset.get(), &bytes)?;

        Ok(offset)
    }

    // =========================================================================
    // Directory & Durability
    // =========================================================================

    /// Rewrite the whole header + directory block at offset 0
    pub fn write_directory(&mut self, directory: &BucketDirectory) -> Result<()> {
        self.write_all_at(0, &directory.encode())
    }

    /// Force all issued writes to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        match self.sync_mode {
            SyncMode::All => self.file.sync_all()?,
            SyncMode::Data => self.file.sync_data()?,
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    /// Upper bound on the number of records the record log can hold
    pub fn max_records(&self) -> u64 {
        self.len.saturating_sub(self.data_start) / MIN_RECORD_SIZE
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn in_record_log(&self, offset: u64) -> bool {
        offset >= self.data_start && offset < self.len
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                HashDbError::Corruption(format!(
                    "read of {} bytes at offset {} runs past end of file",
                    buf.len(),
                    offset
                ))
            } else {
                HashDbError::Io(e)
            }
        })
    }

    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        self.len = self.len.max(offset + buf.len() as u64);
        Ok(())
    }
}
