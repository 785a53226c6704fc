//! Bucket hashing
//!
//! Maps a key to a bucket index in `[0, 2^B)`: the MD5 digest of the key, first
//! 8 bytes read as a little-endian `u64`, masked to the lowest B bits.
//!
//! The file format depends on this exact function. A file written with one
//! hash can only be read back with the same hash.

use md5::{Digest, Md5};

/// Compute the bucket index of `key` for a table of `2^bucket_bits` buckets
pub fn bucket_index(key: &[u8], bucket_bits: u32) -> u64 {
    let digest = Md5::digest(key);

    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[..8]);

    u64::from_le_bytes(low) & bucket_mask(bucket_bits)
}

/// Mask retaining the lowest `bucket_bits` bits
pub fn bucket_mask(bucket_bits: u32) -> u64 {
    if bucket_bits >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << bucket_bits) - 1
    }
}
