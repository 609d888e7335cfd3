//! Reads through the reader thread

use crate::test_utils::TestLog;
use tidelog::storage::{data_path, list_segments, StorageConfig};
use tidelog::Error;

/// Header size plus body position of chunk `index` when every chunk body is
/// `body_len` bytes.
fn body_position(index: u64, body_len: u64) -> usize {
    const HEADER: u64 = 21;
    (index * (HEADER + body_len) + HEADER) as usize
}

#[tokio::test]
async fn read_at_or_after_tail_is_empty_chunk() {
    let log = TestLog::new();
    for payload in ["a", "b", "c"] {
        log.append(payload).await;
    }

    let chunk = log.reader.read(0, 3).await.unwrap();
    assert!(chunk.is_empty());
    assert_eq!(chunk.record_length(), 0);
    assert_eq!(chunk.start_offset(), 3);

    assert!(log.reader.read(0, 1_000).await.unwrap().is_empty());

    // Once written, the same offset reads the data
    log.append("d").await;
    assert_eq!(log.payload(0, 3).await, "d");
}

#[tokio::test]
async fn read_of_corrupted_chunk_fails() {
    let log = TestLog::new();
    for payload in ["a", "b", "c"] {
        log.append(payload).await;
    }
    log.writer.sync().await.unwrap();

    let path = data_path(log.dir.path(), 0);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[body_position(1, 1)] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let err = log.reader.read(0, 1).await.unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {}", err);

    // Damage is local to the chunk
    assert_eq!(log.payload(0, 0).await, "a");
}

#[tokio::test]
async fn reads_span_rotated_segments() {
    let config = StorageConfig::for_testing()
        .with_max_segment_size(1024)
        .with_max_chunk_body(512)
        .with_max_scan_bytes(1024);
    let log = TestLog::with_config(config);
    for i in 0..30 {
        log.append(&format!("{:0>100}", i)).await;
    }

    let segments = list_segments(log.dir.path()).unwrap();
    assert!(segments.len() >= 3);
    assert_eq!(log.writer.tail().active_segment(), *segments.last().unwrap());

    for offset in 0..30u64 {
        let segment_id = *segments.iter().rev().find(|&&s| s <= offset).unwrap();
        assert_eq!(log.payload(segment_id, offset).await, format!("{:0>100}", offset));
    }

    // Past the end of a closed segment: the error names where to continue
    match log.reader.read(segments[0], segments[1]).await {
        Err(Error::OffsetOutOfSegment { segment_id, end }) => {
            assert_eq!(segment_id, segments[0]);
            assert_eq!(end, segments[1]);
            assert_eq!(log.payload(end, end).await, format!("{:0>100}", end));
        }
        other => panic!("expected OffsetOutOfSegment, got {:?}", other),
    }
}

#[tokio::test]
async fn read_of_unknown_segment_fails() {
    let log = TestLog::new();
    log.append("only").await;

    assert!(matches!(
        log.reader.read(5, 5).await,
        Err(Error::SegmentNotFound(5))
    ));
}
