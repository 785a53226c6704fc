//! Bucket Directory
//!
//! In-memory copy of the header and the per-bucket root offsets. The on-disk
//! block is the source of truth; every change rewrites the whole block.

use bytes::{Buf, BufMut, BytesMut};

use crate::config::MAX_BUCKET_BITS;
use crate::error::{HashDbError, Result};
use crate::record::RecordOffset;

use super::{DIRECTORY_ENTRY_SIZE, FILE_HEADER_SIZE};

/// Per-bucket root offsets for a table of `2^bucket_bits` buckets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDirectory {
    bucket_bits: u32,
    /// Raw root offsets, 0 = empty bucket
    roots: Vec<u64>,
}

impl BucketDirectory {
    /// Create an all-empty directory
    pub fn new(bucket_bits: u32) -> Self {
        Self {
            bucket_bits,
            roots: vec![0; 1usize << bucket_bits],
        }
    }

    /// Size of header + directory for a given exponent; records start here
    pub fn encoded_len(bucket_bits: u32) -> u64 {
        FILE_HEADER_SIZE + (DIRECTORY_ENTRY_SIZE << bucket_bits)
    }

    /// Parse a full header + directory block
    pub fn decode(mut block: &[u8]) -> Result<Self> {
        if block.len() < FILE_HEADER_SIZE as usize {
            return Err(HashDbError::Corruption(format!(
                "file header needs {} bytes, got {}",
                FILE_HEADER_SIZE,
                block.len()
            )));
        }

        let bucket_bits = block.get_u32();
        if bucket_bits > MAX_BUCKET_BITS {
            return Err(HashDbError::Corruption(format!(
                "bucket exponent {} exceeds maximum of {}",
                bucket_bits, MAX_BUCKET_BITS
            )));
        }

        let expected = Self::encoded_len(bucket_bits) - FILE_HEADER_SIZE;
        if block.len() as u64 != expected {
            return Err(HashDbError::Corruption(format!(
                "bucket directory for 2^{} buckets needs {} bytes, got {}",
                bucket_bits,
                expected,
                block.len()
            )));
        }

        let mut roots = Vec::with_capacity(1usize << bucket_bits);
        while block.has_remaining() {
            roots.push(block.get_u64());
        }

        Ok(Self { bucket_bits, roots })
    }

    /// Serialize the header followed by every root offset
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::encoded_len(self.bucket_bits) as usize);
        buf.put_u32(self.bucket_bits);
        for &root in &self.roots {
            buf.put_u64(root);
        }
        buf
    }

    /// Root record of a bucket, `None` if the bucket is empty
    pub fn root(&self, bucket: u64) -> Option<RecordOffset> {
        self.roots
            .get(bucket as usize)
            .and_then(|&raw| RecordOffset::new(raw))
    }

    /// Point a bucket at a new root record (memory only)
    pub fn set_root(&mut self, bucket: u64, root: RecordOffset) -> Result<()> {
        let count = self.roots.len();
        let slot = self.roots.get_mut(bucket as usize).ok_or_else(|| {
            HashDbError::Corruption(format!(
                "bucket index {} out of range for {} buckets",
                bucket, count
            ))
        })?;
        *slot = root.get();
        Ok(())
    }

    /// Non-empty buckets and their roots, in bucket order
    pub fn roots(&self) -> impl Iterator<Item = (u64, RecordOffset)> + '_ {
        self.roots
            .iter()
            .enumerate()
            .filter_map(|(bucket, &raw)| RecordOffset::new(raw).map(|root| (bucket as u64, root)))
    }

    pub fn bucket_bits(&self) -> u32 {
        self.bucket_bits
    }

    pub fn bucket_count(&self) -> u64 {
        self.roots.len() as u64
    }

    /// Number of buckets holding at least one record
    pub fn used_buckets(&self) -> usize {
        self.roots.iter().filter(|&&raw| raw != 0).count()
    }

    /// First byte of the record log
    pub fn data_start(&self) -> u64 {
        Self::encoded_len(self.bucket_bits)
    }
}
