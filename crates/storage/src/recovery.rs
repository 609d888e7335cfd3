//! Resume a partition log after restart or crash.
//!
//! Only the last segment can hold torn data: earlier segments were synced
//! when they were closed. Recovery finds the last index record that still
//! points at a valid chunk, scans forward from it, and truncates whatever
//! follows the last valid chunk.

use crate::format::IndexRecord;
use crate::index::{read_index, rewrite_index};
use crate::reader::read_chunk_at;
use crate::segment::{data_path, list_segments};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tidelog_core::{Offset, Result, SegmentId};
use tracing::{info, warn};

/// Where the writer resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredLog {
    /// Last segment of the log, reopened for appends
    pub segment_id: SegmentId,
    /// Offset the next appended message will get
    pub next_offset: Offset,
    /// Size of the segment after truncation
    pub file_len: u64,
    /// Position of the last chunk that has an index record
    pub last_indexed: Option<u64>,
    /// First offset and position of the last valid chunk
    pub last_chunk: Option<(Offset, u64)>,
    /// Bytes dropped from the end of the segment
    pub truncated_bytes: u64,
}

/// Recover the last segment of the log in `dir`.
///
/// Returns `None` for a directory without segments.
pub fn recover_log(dir: &Path) -> Result<Option<RecoveredLog>> {
    let segments = list_segments(dir)?;
    let Some(&segment_id) = segments.last() else {
        return Ok(None);
    };

    let mut file = File::open(data_path(dir, segment_id))?;
    let original_len = file.metadata()?.len();

    // Drop index records whose chunk did not survive.
    let mut index = read_index(dir, segment_id)?;
    let indexed = index.len();
    let resume: Option<IndexRecord> = loop {
        let Some(record) = index.last().copied() else {
            break None;
        };
        match read_chunk_at(&mut file, record.file_offset, original_len) {
            Ok((chunk, _)) if chunk.start_offset() == record.offset => break Some(record),
            Ok(_) => {}
            Err(e) if e.is_corruption() => {}
            Err(e) => return Err(e),
        }
        index.pop();
    };

    let mut position = resume.map_or(0, |r| r.file_offset);
    let mut next_offset = resume.map_or(segment_id, |r| r.offset);
    let mut last_chunk = None;
    while position < original_len {
        match read_chunk_at(&mut file, position, original_len) {
            Ok((chunk, next)) if chunk.start_offset() == next_offset => {
                last_chunk = Some((chunk.start_offset(), position));
                next_offset = chunk.end_offset();
                position = next;
            }
            Ok((chunk, _)) => {
                warn!(
                    segment_id,
                    position,
                    expected = next_offset,
                    found = chunk.start_offset(),
                    "Offset gap in segment"
                );
                break;
            }
            Err(e) if e.is_corruption() => {
                warn!(segment_id, position, error = %e, "Invalid chunk at segment tail");
                break;
            }
            Err(e) => return Err(e),
        }
    }
    drop(file);

    let truncated_bytes = original_len - position;
    if truncated_bytes > 0 {
        warn!(
            segment_id,
            valid_end = position,
            original_len,
            "Truncating segment tail"
        );
        let file = OpenOptions::new()
            .write(true)
            .open(data_path(dir, segment_id))?;
        file.set_len(position)?;
        file.sync_all()?;
    }
    if index.len() != indexed {
        rewrite_index(dir, segment_id, &index)?;
    }

    info!(
        segment_id,
        next_offset,
        file_len = position,
        truncated_bytes,
        "Segment recovered"
    );

    Ok(Some(RecoveredLog {
        segment_id,
        next_offset,
        file_len: position,
        last_indexed: index.last().map(|r| r.file_offset),
        last_chunk,
        truncated_bytes,
    }))
}
