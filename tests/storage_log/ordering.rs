//! Concurrent producers against one writer

use crate::test_utils::TestLog;
use bytes::Bytes;
use std::sync::Arc;
use tidelog::storage::{list_segments, read_index, LocalWriteItem, ReplicationInfo, StorageConfig};
use tokio::sync::Mutex;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disk_order_matches_enqueue_order() {
    let log = Arc::new(TestLog::new());
    // Held across enqueue, so the recorded order is the queue order.
    let enqueued = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for producer in 0..8u32 {
        let log = Arc::clone(&log);
        let enqueued = Arc::clone(&enqueued);
        tasks.push(tokio::spawn(async move {
            for seq in 0..25u32 {
                let marker = format!("p{}-{}", producer, seq);
                let (item, pending) =
                    LocalWriteItem::new(Bytes::from(marker.clone()), 1, ReplicationInfo::none());
                {
                    let mut order = enqueued.lock().await;
                    log.writer.enqueue(item).await;
                    order.push(marker);
                }
                pending.await.expect("append failed");
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let enqueued = enqueued.lock().await.clone();
    assert_eq!(enqueued.len(), 200);
    assert_eq!(log.writer.tail().next_offset(), 200);
    for (offset, marker) in enqueued.iter().enumerate() {
        assert_eq!(&log.payload(0, offset as u64).await, marker);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn index_records_non_decreasing_after_drain() {
    let config = StorageConfig::for_testing()
        .with_max_segment_size(4096)
        .with_max_chunk_body(1024)
        .with_max_scan_bytes(4096)
        .with_index_interval_bytes(256);
    let log = Arc::new(TestLog::with_config(config));

    let mut tasks = Vec::new();
    for producer in 0..4 {
        let log = Arc::clone(&log);
        tasks.push(tokio::spawn(async move {
            for seq in 0..50 {
                log.append(&format!("{}:{}:{}", producer, seq, "x".repeat(seq % 40)))
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    log.writer.sync().await.unwrap();

    let segments = list_segments(log.dir.path()).unwrap();
    assert!(segments.len() > 1, "expected rotation, got {:?}", segments);
    for segment_id in segments {
        let records = read_index(log.dir.path(), segment_id).unwrap();
        assert!(!records.is_empty());
        assert_eq!(records[0].offset, segment_id);
        assert!(records
            .windows(2)
            .all(|w| w[0].offset <= w[1].offset && w[0].file_offset < w[1].file_offset));
    }
}
