//! Tests for HashDb
//!
//! These tests verify:
//! - Basic set/get and absence
//! - Length-exact storage of empty and binary keys/values
//! - Duplicate-key policies (overwrite in place, relocation, keep existing)
//! - Persistence across reopen
//! - Concurrent access
//! - Error reporting for bad files and oversized input

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use hashdb::config::MAX_BUCKET_BITS;
use hashdb::hash::bucket_index;
use hashdb::storage::DbFile;
use hashdb::{Config, HashDb, HashDbError, SyncMode, UpdatePolicy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_db(bucket_bits: u32) -> (TempDir, HashDb) {
    let temp_dir = TempDir::new().unwrap();
    let db = HashDb::create(temp_dir.path().join("test.db"), bucket_bits).unwrap();
    (temp_dir, db)
}

fn setup_temp_db_with_policy(bucket_bits: u32, policy: UpdatePolicy) -> (TempDir, HashDb) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(temp_dir.path().join("test.db"))
        .bucket_bits(bucket_bits)
        .update_policy(policy)
        .build();
    let db = HashDb::create_with_config(config).unwrap();
    (temp_dir, db)
}

fn db_path(temp: &TempDir) -> PathBuf {
    temp.path().join("test.db")
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_create_reports_layout() {
    let (temp, db) = setup_temp_db(5);

    assert_eq!(db.bucket_bits(), 5);
    assert_eq!(db.bucket_count(), 32);
    assert_eq!(db.path(), db_path(&temp).as_path());
    assert_eq!(db.file_len(), 4 + 32 * 8);
}

#[test]
fn test_set_get() {
    let (_temp, db) = setup_temp_db(5);

    db.set(b"hello", b"world").unwrap();

    assert_eq!(db.get(b"hello").unwrap(), Some(b"world".to_vec()));
    assert!(db.contains(b"hello").unwrap());
}

#[test]
fn test_get_nonexistent_key() {
    let (_temp, db) = setup_temp_db(5);
    db.set(b"present", b"1").unwrap();

    assert_eq!(db.get(b"absent").unwrap(), None);
    assert!(!db.contains(b"absent").unwrap());
}

#[test]
fn test_absent_key_in_occupied_bucket() {
    let (_temp, db) = setup_temp_db(4);

    // k0, k48, k91 share bucket 8; k110 does too but is never set
    db.set(b"k0", b"a").unwrap();
    db.set(b"k48", b"b").unwrap();
    db.set(b"k91", b"c").unwrap();

    assert_eq!(bucket_index(b"k110", 4), 8);
    assert_eq!(db.get(b"k110").unwrap(), None);
}

#[test]
fn test_empty_value_is_not_absent() {
    let (_temp, db) = setup_temp_db(3);

    db.set(b"empty", b"").unwrap();

    assert_eq!(db.get(b"empty").unwrap(), Some(Vec::new()));
    assert_eq!(db.get(b"missing").unwrap(), None);
}

#[test]
fn test_empty_key() {
    let (_temp, db) = setup_temp_db(3);

    db.set(b"", b"value for empty key").unwrap();
    db.set(b"a", b"1").unwrap();

    assert_eq!(db.get(b"").unwrap(), Some(b"value for empty key".to_vec()));
    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_binary_keys_and_values() {
    let (_temp, db) = setup_temp_db(0);

    let keys: [&[u8]; 4] = [b"\x00", b"\x00\x00", b"a\x00b", b"\xff\xfe"];
    for (i, key) in keys.iter().enumerate() {
        let value = vec![0u8, i as u8, 0, 255];
        db.set(key, &value).unwrap();
    }

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(db.get(key).unwrap(), Some(vec![0u8, i as u8, 0, 255]));
    }
    db.verify().unwrap();
}

#[test]
fn test_large_value() {
    let (_temp, db) = setup_temp_db(2);
    let value: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    db.set(b"blob", &value).unwrap();

    assert_eq!(db.get(b"blob").unwrap(), Some(value));
    // 28 + 4 + 200_000 rounds up to 2^18
    assert_eq!(db.file_len(), 4 + 4 * 8 + (1 << 18));
}

#[test]
fn test_file_grows_by_allocated_size() {
    let (_temp, db) = setup_temp_db(0);
    let start = db.file_len();

    db.set(b"k", b"v").unwrap(); // 30 -> 32
    assert_eq!(db.file_len(), start + 32);

    db.set(b"key", b"value").unwrap(); // 36 -> 64
    assert_eq!(db.file_len(), start + 96);
}

// =============================================================================
// Collision & Bucket Independence Tests
// =============================================================================

#[test]
fn test_many_keys_in_one_bucket() {
    let (_temp, db) = setup_temp_db(0);

    for i in 0..100 {
        db.set(format!("item:{}", i).as_bytes(), format!("{}", i * i).as_bytes())
            .unwrap();
    }

    for i in (0..100).rev() {
        assert_eq!(
            db.get(format!("item:{}", i).as_bytes()).unwrap(),
            Some(format!("{}", i * i).into_bytes())
        );
    }

    let report = db.verify().unwrap();
    assert_eq!(report.records, 100);
    assert_eq!(report.buckets_used, 1);
}

#[test]
fn test_buckets_do_not_share_trees() {
    let (temp, db) = setup_temp_db(5);

    // foo -> 12, key -> 28, user/1102 -> 3, empty -> 2
    db.set(b"foo", b"bar").unwrap();
    db.set(b"key", b"value").unwrap();
    db.set(b"user/1102", b"steve").unwrap();
    db.set(b"empty", b"").unwrap();
    db.close().unwrap();

    let (mut file, directory) = DbFile::open(&db_path(&temp), SyncMode::All).unwrap();
    assert_eq!(directory.used_buckets(), 4);

    let expected: [(u64, &[u8]); 4] = [(12, b"foo"), (28, b"key"), (3, b"user/1102"), (2, b"empty")];
    for (bucket, key) in expected {
        let root = directory.root(bucket).unwrap();
        let record = file.read_record(root).unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.left, None);
        assert_eq!(record.right, None);
    }
}

#[test]
fn test_on_disk_layout_of_first_record() {
    let (temp, db) = setup_temp_db(5);
    db.set(b"foo", b"bar").unwrap();
    db.close().unwrap();

    let bytes = fs::read(db_path(&temp)).unwrap();
    assert_eq!(bytes.len(), 260 + 64);

    // Directory slot 12 holds the record offset
    let slot = 4 + 12 * 8;
    assert_eq!(&bytes[slot..slot + 8], &260u64.to_be_bytes());

    let record = &bytes[260..];
    assert_eq!(&record[0..4], &64u32.to_be_bytes());
    assert_eq!(&record[4..20], &[0u8; 16]);
    assert_eq!(&record[20..24], &3u32.to_be_bytes());
    assert_eq!(&record[24..28], &3u32.to_be_bytes());
    assert_eq!(&record[28..34], b"foobar");
    assert!(record[34..].iter().all(|&b| b == 0));
}

// =============================================================================
// Duplicate Key Tests
// =============================================================================

#[test]
fn test_overwrite_in_place() {
    let (_temp, db) = setup_temp_db(0);
    db.set(b"k", b"v1").unwrap();
    let len = db.file_len();

    db.set(b"k", b"v2").unwrap();

    assert_eq!(db.get(b"k").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(db.file_len(), len);
}

#[test]
fn test_overwrite_with_shorter_value() {
    let (_temp, db) = setup_temp_db(0);
    db.set(b"k", b"a fairly long initial value").unwrap();
    let len = db.file_len();

    db.set(b"k", b"").unwrap();

    assert_eq!(db.get(b"k").unwrap(), Some(Vec::new()));
    assert_eq!(db.file_len(), len);
}

#[test]
fn test_overwrite_root_with_larger_value() {
    let (temp, db) = setup_temp_db(0);
    db.set(b"m", b"1").unwrap();
    db.set(b"c", b"2").unwrap();
    db.set(b"x", b"3").unwrap();

    db.set(b"m", b"a value much longer than the original one").unwrap();

    assert_eq!(
        db.get(b"m").unwrap(),
        Some(b"a value much longer than the original one".to_vec())
    );
    assert_eq!(db.get(b"c").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(b"x").unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.verify().unwrap().records, 3);
    db.close().unwrap();

    // Replacement was appended after the three 32-byte records
    let (mut file, directory) = DbFile::open(&db_path(&temp), SyncMode::All).unwrap();
    let root = directory.root(0).unwrap();
    assert_eq!(root.get(), 12 + 3 * 32);

    let record = file.read_record(root).unwrap();
    assert_eq!(record.key, b"m");
    assert_eq!(record.left.map(|o| o.get()), Some(12 + 32));
    assert_eq!(record.right.map(|o| o.get()), Some(12 + 64));
}

#[test]
fn test_overwrite_child_with_larger_value() {
    let (temp, db) = setup_temp_db(0);
    db.set(b"m", b"1").unwrap();
    db.set(b"c", b"2").unwrap();
    db.set(b"a", b"3").unwrap();

    db.set(b"c", b"grown well beyond its first allocation").unwrap();

    assert_eq!(
        db.get(b"c").unwrap(),
        Some(b"grown well beyond its first allocation".to_vec())
    );
    assert_eq!(db.get(b"a").unwrap(), Some(b"3".to_vec()));
    db.close().unwrap();

    let (mut file, directory) = DbFile::open(&db_path(&temp), SyncMode::All).unwrap();
    let root = directory.root(0).unwrap();
    assert_eq!(root.get(), 12);

    let m = file.read_record(root).unwrap();
    let moved = m.left.unwrap();
    assert_eq!(moved.get(), 12 + 3 * 32);

    let c = file.read_record(moved).unwrap();
    assert_eq!(c.key, b"c");
    assert_eq!(c.left.map(|o| o.get()), Some(12 + 64));
}

#[test]
fn test_overwrite_same_value_writes_nothing() {
    let (_temp, db) = setup_temp_db(0);
    db.set(b"k", b"same").unwrap();
    let len = db.file_len();

    db.set(b"k", b"same").unwrap();

    assert_eq!(db.file_len(), len);
    assert_eq!(db.get(b"k").unwrap(), Some(b"same".to_vec()));
}

#[test]
fn test_keep_existing_policy() {
    let (_temp, db) = setup_temp_db_with_policy(2, UpdatePolicy::KeepExisting);
    db.set(b"k", b"first").unwrap();
    let len = db.file_len();

    db.set(b"k", b"second, and much longer than the first").unwrap();

    assert_eq!(db.get(b"k").unwrap(), Some(b"first".to_vec()));
    assert_eq!(db.file_len(), len);
    assert_eq!(db.verify().unwrap().records, 1);
}

#[test]
fn test_reinsertion_keeps_tree_intact() {
    let (_temp, db) = setup_temp_db(1);

    for i in 0..40 {
        db.set(format!("key{:02}", i).as_bytes(), b"v").unwrap();
    }
    for i in (0..40).step_by(3) {
        db.set(format!("key{:02}", i).as_bytes(), format!("updated value {}", i).as_bytes())
            .unwrap();
    }

    for i in 0..40 {
        let expected = if i % 3 == 0 {
            format!("updated value {}", i).into_bytes()
        } else {
            b"v".to_vec()
        };
        assert_eq!(db.get(format!("key{:02}", i).as_bytes()).unwrap(), Some(expected));
    }
    assert_eq!(db.verify().unwrap().records, 40);
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_open_with_config_uses_file_exponent() {
    let (temp, db) = setup_temp_db(3);
    db.set(b"k", b"v").unwrap();
    db.close().unwrap();

    let config = Config::builder()
        .path(db_path(&temp))
        .bucket_bits(10)
        .sync_mode(SyncMode::Data)
        .build();
    let db = HashDb::open_with_config(config).unwrap();

    assert_eq!(db.bucket_bits(), 3);
    assert_eq!(db.config().sync_mode, SyncMode::Data);
    assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_writes_after_reopen() {
    let (temp, db) = setup_temp_db(2);
    db.set(b"before", b"1").unwrap();
    drop(db);

    let db = HashDb::open(db_path(&temp)).unwrap();
    db.set(b"after", b"2").unwrap();
    drop(db);

    let db = HashDb::open(db_path(&temp)).unwrap();
    assert_eq!(db.get(b"before").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"after").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_create_replaces_existing_database() {
    let (temp, db) = setup_temp_db(2);
    db.set(b"old", b"data").unwrap();
    drop(db);

    let db = HashDb::create(db_path(&temp), 2).unwrap();

    assert_eq!(db.get(b"old").unwrap(), None);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let (_temp, db) = setup_temp_db(4);
    let db = Arc::new(db);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("t{}-k{}", t, i);
                    db.set(key.as_bytes(), key.as_bytes()).unwrap();
                    assert_eq!(db.get(key.as_bytes()).unwrap(), Some(key.into_bytes()));
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }

    for t in 0..4 {
        for i in 0..25 {
            let key = format!("t{}-k{}", t, i);
            assert_eq!(db.get(key.as_bytes()).unwrap(), Some(key.into_bytes()));
        }
    }
    assert_eq!(db.verify().unwrap().records, 100);
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_create_rejects_exponent_above_maximum() {
    let temp = TempDir::new().unwrap();

    let result = HashDb::create(temp.path().join("test.db"), MAX_BUCKET_BITS + 1);

    assert!(matches!(result, Err(HashDbError::Config(_))));
}

#[test]
fn test_create_in_missing_directory() {
    let temp = TempDir::new().unwrap();

    let result = HashDb::create(temp.path().join("no/such/dir/test.db"), 4);

    assert!(matches!(result, Err(HashDbError::Create { .. })));
}

#[test]
fn test_open_missing_file() {
    let temp = TempDir::new().unwrap();

    let result = HashDb::open(temp.path().join("missing.db"));

    assert!(matches!(result, Err(HashDbError::Io(_))));
}

#[test]
fn test_get_reports_truncated_record() {
    let (temp, db) = setup_temp_db(0);
    db.set(b"key", b"value").unwrap();
    drop(db);

    let bytes = fs::read(db_path(&temp)).unwrap();
    fs::write(db_path(&temp), &bytes[..50]).unwrap();

    let db = HashDb::open(db_path(&temp)).unwrap();
    let result = db.get(b"key");

    assert!(result.unwrap_err().is_corruption());
}
