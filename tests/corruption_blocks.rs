//! Block corruption detection tests
//!
//! Damaged files must fail with an explicit error on open or on the first
//! read that touches the damage, never with garbage results.

use isam::{FileConfig, IndexedFile, IsamError, Record, HEADER_SIZE};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn block_size() -> usize {
    FileConfig::default().geometry.block_size()
}

/// Helper: three full primary blocks plus one overflow block
fn build(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("corrupt.isam");
    let mut file = IndexedFile::create(&path, FileConfig::default()).unwrap();
    let g = *file.geometry();
    file.load_sorted((1..=33).map(|i| Record::numbered(i, &g).unwrap()), 1.0)
        .unwrap();
    file.insert(Record::numbered(40, &g).unwrap()).unwrap();
    file.close().unwrap();
    path
}

/// Helper: overwrite bytes at an absolute offset
fn patch(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

/// Helper: truncate file to a specific size
fn truncate_file(path: &Path, size: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(size).unwrap();
}

fn block_offset(index: u64) -> u64 {
    HEADER_SIZE as u64 + index * block_size() as u64
}

#[test]
fn test_truncated_mid_block() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    let len = std::fs::metadata(&path).unwrap().len();
    truncate_file(&path, len - 100);

    let result = IndexedFile::open(&path, FileConfig::default());
    assert!(matches!(result, Err(IsamError::CorruptHeader(_))));
}

#[test]
fn test_truncated_whole_block() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    truncate_file(&path, block_offset(3));

    // Header still claims an overflow block
    let result = IndexedFile::open(&path, FileConfig::default());
    assert!(matches!(result, Err(IsamError::CorruptHeader(_))));
}

#[test]
fn test_truncated_header() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    truncate_file(&path, 7);

    assert!(IndexedFile::open(&path, FileConfig::default()).is_err());
}

#[test]
fn test_negative_header_counter() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    patch(&path, 0, &(-3i32).to_le_bytes());

    let result = IndexedFile::open(&path, FileConfig::default());
    assert!(matches!(result, Err(IsamError::CorruptHeader(_))));
}

#[test]
fn test_bad_marker_byte() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    // Marker of slot 0 in block 1
    patch(&path, block_offset(1) + 8 + 10, b"X");

    let file = IndexedFile::open(&path, FileConfig::default()).unwrap();
    assert!(file.primary_block(0).is_ok());
    assert!(matches!(
        file.primary_block(1),
        Err(IsamError::CorruptBlock { index: 1, .. })
    ));

    // Binary search over three blocks reads block 1 first
    assert!(file.locate(b"0000000005").is_err());

    // Listing stops at the damaged block
    let results: Vec<_> = file.list(b"0", b"9").unwrap().collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 11);
    assert!(results.last().unwrap().is_err());
}

#[test]
fn test_record_count_over_capacity() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    patch(&path, block_offset(0), &500i32.to_le_bytes());

    let file = IndexedFile::open(&path, FileConfig::default()).unwrap();
    assert!(matches!(
        file.read_block(0),
        Err(IsamError::CorruptBlock { .. })
    ));

    let report = file.check().unwrap();
    assert!(!report.is_clean());
}

#[test]
fn test_invalid_overflow_link() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    patch(&path, block_offset(2) + 4, &(-7i32).to_le_bytes());

    let file = IndexedFile::open(&path, FileConfig::default()).unwrap();
    assert!(matches!(
        file.primary_block(2),
        Err(IsamError::CorruptBlock { index: 2, .. })
    ));
}

#[test]
fn test_dangling_overflow_link() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);
    // Block 2's chain points at overflow block 5 which does not exist
    patch(&path, block_offset(2) + 4, &5i32.to_le_bytes());

    let file = IndexedFile::open(&path, FileConfig::default()).unwrap();
    assert!(matches!(
        file.lookup(b"0000000040"),
        Err(IsamError::BlockOutOfRange { .. })
    ));

    let report = file.check().unwrap();
    assert_eq!(report.issues.len(), 2);
}

#[test]
fn test_wrong_geometry_rejected() {
    let dir = TempDir::new().unwrap();
    let path = build(&dir);

    let mut config = FileConfig::default();
    config.geometry.payload_len += 1;
    assert!(IndexedFile::open(&path, config).is_err());
}
