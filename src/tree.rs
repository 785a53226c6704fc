//! Tree-walk engine
//!
//! Each bucket's records form an unbalanced binary search tree ordered by
//! byte-wise key comparison. Nodes are addressed by file offset; nothing is
//! cached in memory between calls.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{HashDbError, Result};
use crate::hash;
use crate::record::{Record, RecordOffset, Side};
use crate::storage::DbFile;

/// Outcome of walking a bucket tree for a key
#[derive(Debug)]
pub enum Search {
    /// A record with exactly this key exists
    Found {
        record: Record,
        /// The record's parent and which link points at it; `None` for the root
        parent: Option<(Record, Side)>,
    },

    /// No record matches; a new one belongs under `parent` on `side`
    Vacant { parent: Record, side: Side },
}

/// Walk from `root` towards `key`
pub fn search(file: &mut DbFile, root: RecordOffset, key: &[u8]) -> Result<Search> {
    let max_steps = file.max_records();
    let mut steps = 0u64;

    let mut parent: Option<(Record, Side)> = None;
    let mut current = file.read_record(root)?;

    loop {
        let side = match key.cmp(current.key.as_slice()) {
            Ordering::Equal => {
                return Ok(Search::Found {
                    record: current,
                    parent,
                })
            }
            Ordering::Less => Side::Left,
            Ordering::Greater => Side::Right,
        };

        let Some(child) = current.child(side) else {
            return Ok(Search::Vacant {
                parent: current,
                side,
            });
        };

        steps += 1;
        if steps > max_steps {
            return Err(HashDbError::Corruption(format!(
                "tree walk from offset {} exceeded {} records, links form a cycle",
                root.get(),
                max_steps
            )));
        }

        let next = file.read_record(child)?;
        parent = Some((current, side));
        current = next;
    }
}

/// Value stored under `key` in the tree rooted at `root`, if any
pub fn lookup(file: &mut DbFile, root: RecordOffset, key: &[u8]) -> Result<Option<Vec<u8>>> {
    match search(file, root, key)? {
        Search::Found { record, .. } => Ok(Some(record.value)),
        Search::Vacant { .. } => Ok(None),
    }
}

/// Shape statistics for one verified bucket tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub records: u64,
    /// Number of records on the longest root-to-leaf path
    pub depth: u64,
}

/// Check every record reachable from `root`.
///
/// - keys are strictly ordered: left subtree < node < right subtree
/// - every key hashes to `bucket`
/// - no record is reachable twice
pub fn verify_bucket(
    file: &mut DbFile,
    bucket: u64,
    bucket_bits: u32,
    root: RecordOffset,
) -> Result<TreeStats> {
    struct Pending {
        offset: RecordOffset,
        depth: u64,
        lower: Option<Vec<u8>>,
        upper: Option<Vec<u8>>,
    }

    let mut stats = TreeStats::default();
    let mut seen = HashSet::new();
    let mut stack = vec![Pending {
        offset: root,
        depth: 1,
        lower: None,
        upper: None,
    }];

    while let Some(node) = stack.pop() {
        if !seen.insert(node.offset) {
            return Err(HashDbError::Corruption(format!(
                "bucket {}: record at offset {} is reachable more than once",
                bucket,
                node.offset.get()
            )));
        }

        let record = file.read_record(node.offset)?;

        let above_lower = node.lower.as_deref().map_or(true, |lo| record.key.as_slice() > lo);
        let below_upper = node.upper.as_deref().map_or(true, |hi| record.key.as_slice() < hi);
        if !above_lower || !below_upper {
            return Err(HashDbError::Corruption(format!(
                "bucket {}: record at offset {} breaks the key ordering",
                bucket,
                node.offset.get()
            )));
        }

        let home = hash::bucket_index(&record.key, bucket_bits);
        if home != bucket {
            return Err(HashDbError::Corruption(format!(
                "bucket {}: record at offset {} hashes to bucket {}",
                bucket,
                node.offset.get(),
                home
            )));
        }

        stats.records += 1;
        stats.depth = stats.depth.max(node.depth);

        if let Some(left) = record.left {
            stack.push(Pending {
                offset: left,
                depth: node.depth + 1,
                lower: node.lower.clone(),
                upper: Some(record.key.clone()),
            });
        }
        if let Some(right) = record.right {
            stack.push(Pending {
                offset: right,
                depth: node.depth + 1,
                lower: Some(record.key),
                upper: node.upper,
            });
        }
    }

    Ok(stats)
}
