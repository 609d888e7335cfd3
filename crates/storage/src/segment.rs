//! Segment data files.
//!
//! A partition log is a directory of segments. Each segment is named after
//! its id, the offset of the first message it holds:
//!
//! ```text
//! 00000000000000000000.dlog   chunks, appended back to back
//! 00000000000000000000.index  offset index for the segment
//! 00000000000000001024.dlog
//! 00000000000000001024.index
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tidelog_core::SegmentId;

/// Extension of segment data files.
pub const DATA_EXTENSION: &str = "dlog";

/// Extension of segment index files.
pub const INDEX_EXTENSION: &str = "index";

/// Path of a segment's data file.
pub fn data_path(dir: &Path, segment_id: SegmentId) -> PathBuf {
    dir.join(format!("{:020}.{}", segment_id, DATA_EXTENSION))
}

/// Path of a segment's index file.
pub fn index_path(dir: &Path, segment_id: SegmentId) -> PathBuf {
    dir.join(format!("{:020}.{}", segment_id, INDEX_EXTENSION))
}

/// List the ids of all segments in a log directory, ascending.
pub fn list_segments(dir: &Path) -> std::io::Result<Vec<SegmentId>> {
    let mut segments = Vec::new();
    if !dir.exists() {
        return Ok(segments);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DATA_EXTENSION) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<SegmentId>().ok())
        {
            segments.push(id);
        }
    }

    segments.sort_unstable();
    Ok(segments)
}

/// Segment data file handle.
///
/// Only the active segment is writable; closed segments are immutable.
/// The handle is owned by the segment writer thread.
pub struct SegmentFile {
    /// File handle
    file: File,

    /// Segment id (base offset)
    segment_id: SegmentId,

    /// Current write position (bytes from start)
    write_position: u64,

    /// Path to segment file
    path: PathBuf,

    /// Whether this segment is closed (immutable)
    closed: bool,
}

impl SegmentFile {
    /// Create a new, empty segment file.
    pub fn create(dir: &Path, segment_id: SegmentId) -> std::io::Result<Self> {
        let path = data_path(dir, segment_id);

        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(&path)?;

        Ok(SegmentFile {
            file,
            segment_id,
            write_position: 0,
            path,
            closed: false,
        })
    }

    /// Open an existing segment for appending.
    ///
    /// Used when resuming writes to the last segment of a log.
    pub fn open_append(dir: &Path, segment_id: SegmentId) -> std::io::Result<Self> {
        let path = data_path(dir, segment_id);
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let write_position = file.seek(SeekFrom::End(0))?;

        Ok(SegmentFile {
            file,
            segment_id,
            write_position,
            path,
            closed: false,
        })
    }

    /// Get segment id.
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Get current segment size in bytes.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bytes to the segment.
    ///
    /// Returns the file position the bytes were written at. On error the
    /// write position is unchanged, though a prefix of `data` may be on disk.
    pub fn append(&mut self, data: &[u8]) -> std::io::Result<u64> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Cannot write to closed segment",
            ));
        }

        let position = self.write_position;
        self.file.write_all(data)?;
        self.write_position += data.len() as u64;
        Ok(position)
    }

    /// Sync segment data to disk.
    pub fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_data()
    }

    /// Mark segment as closed (immutable).
    ///
    /// Syncs data to disk before closing.
    pub fn close(&mut self) -> std::io::Result<()> {
        if !self.closed {
            self.file.sync_all()?;
            self.closed = true;
        }
        Ok(())
    }

    /// Check if segment is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Truncate segment at the given position.
    ///
    /// Used to drop torn chunks after a failed append or during recovery.
    pub fn truncate(&mut self, position: u64) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "Cannot truncate closed segment",
            ));
        }

        self.file.set_len(position)?;
        self.write_position = position;
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }
}
