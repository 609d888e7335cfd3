//! Storage configuration.
//!
//! Controls segment rotation, index density, read fallback bounds and
//! durability of the segment writer.

/// Storage configuration parameters.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Maximum segment size in bytes (default: 1GB).
    ///
    /// When appending a chunk would push the active segment past this size,
    /// the writer closes it and starts a new segment.
    pub max_segment_size: u64,

    /// Minimum file distance between two index entries (default: 0).
    ///
    /// Zero indexes every chunk. Larger values keep the index small at the
    /// cost of longer linear scans on read.
    pub index_interval_bytes: u64,

    /// Maximum bytes a read may scan forward from an index entry (default: 8MB).
    pub max_scan_bytes: u64,

    /// fsync the segment after every append (default: false).
    pub sync_on_write: bool,

    /// Capacity of the writer and reader queues (default: 1024).
    pub queue_capacity: usize,

    /// Maximum chunk body size in bytes (default: 8MB).
    pub max_chunk_body: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            max_segment_size: 1024 * 1024 * 1024, // 1GB
            index_interval_bytes: 0,
            max_scan_bytes: 8 * 1024 * 1024, // 8MB
            sync_on_write: false,
            queue_capacity: 1024,
            max_chunk_body: 8 * 1024 * 1024, // 8MB
        }
    }
}

impl StorageConfig {
    /// Create a new storage configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum segment size (builder pattern).
    pub fn with_max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Set index interval (builder pattern).
    pub fn with_index_interval_bytes(mut self, bytes: u64) -> Self {
        self.index_interval_bytes = bytes;
        self
    }

    /// Set read scan bound (builder pattern).
    pub fn with_max_scan_bytes(mut self, bytes: u64) -> Self {
        self.max_scan_bytes = bytes;
        self
    }

    /// Set fsync-per-append (builder pattern).
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Set queue capacity (builder pattern).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set maximum chunk body size (builder pattern).
    pub fn with_max_chunk_body(mut self, bytes: usize) -> Self {
        self.max_chunk_body = bytes;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), StorageConfigError> {
        if self.max_segment_size < 1024 {
            return Err(StorageConfigError::SegmentSizeTooSmall);
        }
        if self.queue_capacity == 0 {
            return Err(StorageConfigError::ZeroQueueCapacity);
        }
        if self.max_chunk_body as u64 > self.max_segment_size {
            return Err(StorageConfigError::ChunkExceedsSegment);
        }
        if self.max_scan_bytes < self.index_interval_bytes {
            return Err(StorageConfigError::ScanShorterThanInterval);
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small segments).
    pub fn for_testing() -> Self {
        StorageConfig {
            max_segment_size: 64 * 1024, // 64KB for faster rotation in tests
            index_interval_bytes: 0,
            max_scan_bytes: 64 * 1024,
            sync_on_write: false,
            queue_capacity: 64,
            max_chunk_body: 16 * 1024,
        }
    }
}

/// Storage configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageConfigError {
    /// Segment size is too small (minimum 1KB).
    #[error("Segment size must be at least 1KB")]
    SegmentSizeTooSmall,

    /// Queues need room for at least one item.
    #[error("Queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    /// A single chunk could never fit in a segment.
    #[error("Maximum chunk body cannot exceed segment size")]
    ChunkExceedsSegment,

    /// Reads could not reach the next index entry.
    #[error("Read scan bound cannot be smaller than the index interval")]
    ScanShorterThanInterval,
}
