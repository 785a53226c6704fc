//! Record encoding and decoding

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{HashDbError, Result};

use super::{RecordOffset, Side, RECORD_HEADER_SIZE};

/// Fixed-size header preceding every record's key and value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub allocated_size: u32,
    pub left: u64,
    pub right: u64,
    pub key_len: u32,
    pub value_len: u32,
}

impl RecordHeader {
    /// Parse the 28 header bytes
    pub fn decode(bytes: &[u8; RECORD_HEADER_SIZE]) -> Self {
        let mut buf = &bytes[..];
        Self {
            allocated_size: buf.get_u32(),
            left: buf.get_u64(),
            right: buf.get_u64(),
            key_len: buf.get_u32(),
            value_len: buf.get_u32(),
        }
    }

    /// Number of key + value bytes following the header
    pub fn payload_len(&self) -> u64 {
        u64::from(self.key_len) + u64::from(self.value_len)
    }

    /// Header + payload, without padding
    pub fn used_len(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.payload_len()
    }

    /// Check that the declared sizes agree with each other
    pub fn validate(&self) -> Result<()> {
        if !self.allocated_size.is_power_of_two() {
            return Err(HashDbError::Corruption(format!(
                "record size {} is not a power of two",
                self.allocated_size
            )));
        }

        if self.used_len() > u64::from(self.allocated_size) {
            return Err(HashDbError::Corruption(format!(
                "record payload of {} bytes exceeds allocated size {}",
                self.used_len(),
                self.allocated_size
            )));
        }

        Ok(())
    }
}

/// One stored key/value pair and its position in a bucket tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Absolute file position (0 until the record is appended)
    pub offset: u64,
    /// Bytes reserved on disk, including padding; never changes
    pub allocated_size: u32,
    pub left: Option<RecordOffset>,
    pub right: Option<RecordOffset>,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    /// Build a new, not yet placed record with no children
    pub fn new(key: &[u8], value: &[u8]) -> Result<Self> {
        Ok(Self {
            offset: 0,
            allocated_size: allocation_size(key.len(), value.len())?,
            left: None,
            right: None,
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Assemble a record from a decoded header and its payload bytes
    pub fn from_parts(offset: u64, header: &RecordHeader, mut payload: Vec<u8>) -> Self {
        let value = payload.split_off(header.key_len as usize);
        Self {
            offset,
            allocated_size: header.allocated_size,
            left: RecordOffset::new(header.left),
            right: RecordOffset::new(header.right),
            key: payload,
            value,
        }
    }

    pub fn child(&self, side: Side) -> Option<RecordOffset> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set_child(&mut self, side: Side, child: RecordOffset) {
        match side {
            Side::Left => self.left = Some(child),
            Side::Right => self.right = Some(child),
        }
    }

    /// Whether a value of `value_len` bytes fits this record's allocation
    pub fn fits_value(&self, value_len: usize) -> bool {
        RECORD_HEADER_SIZE + self.key.len() + value_len <= self.allocated_size as usize
    }

    /// Serialize to exactly `allocated_size` bytes, zero-padded
    pub fn encode(&self) -> Result<BytesMut> {
        let allocated = self.allocated_size as usize;
        let used = RECORD_HEADER_SIZE + self.key.len() + self.value.len();
        if used > allocated {
            return Err(HashDbError::Corruption(format!(
                "record at offset {} needs {} bytes but only {} are allocated",
                self.offset, used, allocated
            )));
        }

        let mut buf = BytesMut::with_capacity(allocated);
        buf.put_u32(self.allocated_size);
        buf.put_u64(RecordOffset::to_raw(self.left));
        buf.put_u64(RecordOffset::to_raw(self.right));
        // Lengths fit in u32: used <= allocated_size
        buf.put_u32(self.key.len() as u32);
        buf.put_u32(self.value.len() as u32);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
        buf.resize(allocated, 0);

        Ok(buf)
    }
}

/// Allocated size for a record: next power of two >= header + key + value
pub fn allocation_size(key_len: usize, value_len: usize) -> Result<u32> {
    let too_large = || HashDbError::RecordTooLarge { key_len, value_len };

    let used = RECORD_HEADER_SIZE
        .checked_add(key_len)
        .and_then(|n| n.checked_add(value_len))
        .ok_or_else(too_large)?;
    let used = u32::try_from(used).map_err(|_| too_large())?;

    next_power_of_two(used).ok_or_else(too_large)
}

/// Smallest power of two >= `x`, with 0 rounding up to 1.
/// `None` when the result does not fit in a `u32`.
pub fn next_power_of_two(x: u32) -> Option<u32> {
    if x == 0 {
        return Some(1);
    }
    x.checked_next_power_of_two()
}
