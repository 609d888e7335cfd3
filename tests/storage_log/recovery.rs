//! Reopening a log directory

use crate::test_utils::TestLog;
use std::fs::OpenOptions;
use std::io::Write;
use tidelog::storage::{data_path, list_segments, read_index, StorageConfig};

#[tokio::test]
async fn reopen_resumes_after_clean_shutdown() {
    let log = TestLog::new();
    for i in 0..5 {
        log.append(&format!("m{}", i)).await;
    }

    let log = log.reopen().await;
    assert_eq!(log.writer.tail().next_offset(), 5);
    log.append("m5").await;

    assert_eq!(log.payload(0, 0).await, "m0");
    assert_eq!(log.payload(0, 5).await, "m5");
}

#[tokio::test]
async fn torn_tail_is_truncated() {
    let log = TestLog::new();
    for i in 0..3 {
        log.append(&format!("m{}", i)).await;
    }
    let (dir, config) = log.close().await;

    let path = data_path(dir.path(), 0);
    let clean_len = std::fs::metadata(&path).unwrap().len();
    // Half of a chunk header
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0, 0, 0, 0, 9, 0, 0, 0, 0, 0]).unwrap();
    drop(file);

    let log = TestLog::from_dir(dir, config);
    assert_eq!(log.writer.tail().next_offset(), 3);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);

    log.append("m3").await;
    assert_eq!(log.payload(0, 3).await, "m3");
}

#[tokio::test]
async fn corrupted_last_chunk_is_rewritten() {
    let log = TestLog::new();
    for i in 0..3 {
        log.append(&format!("m{}", i)).await;
    }
    let (dir, config) = log.close().await;

    let path = data_path(dir.path(), 0);
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let log = TestLog::from_dir(dir, config);
    assert_eq!(log.writer.tail().next_offset(), 2);
    // The stale index record for offset 2 was dropped
    assert!(read_index(log.dir.path(), 0)
        .unwrap()
        .iter()
        .all(|r| r.offset < 2));

    log.append("replacement").await;
    assert_eq!(log.payload(0, 2).await, "replacement");
}

#[tokio::test]
async fn reopen_continues_in_last_segment() {
    let config = StorageConfig::for_testing()
        .with_max_segment_size(1024)
        .with_max_chunk_body(512)
        .with_max_scan_bytes(1024);
    let log = TestLog::with_config(config);
    for i in 0..20 {
        log.append(&format!("{:0>200}", i)).await;
    }
    let active = log.writer.tail().active_segment();

    let log = log.reopen().await;
    assert_eq!(log.writer.tail().active_segment(), active);
    assert_eq!(log.writer.tail().next_offset(), 20);
    log.append("after").await;
    assert_eq!(log.payload(active, 20).await, "after");
    assert_eq!(*list_segments(log.dir.path()).unwrap().last().unwrap(), active);
}
