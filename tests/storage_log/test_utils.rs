//! Shared helpers for partition log tests

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tidelog::storage::{
    NoopDispatcher, ReplicationInfo, SegmentReader, SegmentWriter, StorageConfig,
};

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Writer and reader over one temporary log directory
pub struct TestLog {
    pub dir: TempDir,
    pub writer: SegmentWriter,
    pub reader: SegmentReader,
    pub config: StorageConfig,
}

impl TestLog {
    pub fn new() -> Self {
        Self::with_config(StorageConfig::for_testing())
    }

    pub fn with_config(config: StorageConfig) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self::from_dir(dir, config)
    }

    /// Open a writer and reader on an existing directory.
    pub fn from_dir(dir: TempDir, config: StorageConfig) -> Self {
        let (writer, reader) = open_pair(dir.path(), config.clone());
        TestLog {
            dir,
            writer,
            reader,
            config,
        }
    }

    /// Shut the writer down and hand back the directory.
    pub async fn close(self) -> (TempDir, StorageConfig) {
        self.writer.shutdown().await.expect("shutdown failed");
        (self.dir, self.config)
    }

    /// Shut the writer down and open a fresh pair on the same directory.
    pub async fn reopen(self) -> Self {
        let (dir, config) = self.close().await;
        Self::from_dir(dir, config)
    }

    /// Append one single-message chunk.
    pub async fn append(&self, payload: &str) {
        self.writer
            .write(
                Bytes::copy_from_slice(payload.as_bytes()),
                1,
                ReplicationInfo::none(),
            )
            .await
            .expect("append failed");
    }

    /// Payload of the chunk holding `offset` in `segment_id`.
    pub async fn payload(&self, segment_id: u64, offset: u64) -> String {
        let chunk = self
            .reader
            .read(segment_id, offset)
            .await
            .expect("read failed");
        String::from_utf8(chunk.data_block().to_vec()).expect("payload is not UTF-8")
    }
}

fn open_pair(dir: &Path, config: StorageConfig) -> (SegmentWriter, SegmentReader) {
    let writer = SegmentWriter::open(dir.to_path_buf(), config.clone(), Arc::new(NoopDispatcher))
        .expect("Failed to open writer");
    let reader = SegmentReader::spawn(dir.to_path_buf(), writer.tail(), config)
        .expect("Failed to spawn reader");
    (writer, reader)
}
