//! Offset index files and the index writer thread.
//!
//! The segment writer emits an [`IndexFileItem`] after each indexed chunk is
//! appended. A dedicated thread owns the index file handle and appends the
//! records in the order they arrive, which is the data write order.

use crate::format::{parse_index, IndexRecord};
use crate::items::{Completion, IndexFileItem};
use crate::segment::index_path;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tidelog_core::{Error, Result, SegmentId};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Append handle for one segment's index file.
pub struct IndexFile {
    file: File,
    segment_id: SegmentId,
    last: Option<IndexRecord>,
}

impl IndexFile {
    /// Open a segment's index file for appending, creating it if needed.
    ///
    /// Records already in the file count towards [`IndexFile::last`].
    pub fn open(dir: &Path, segment_id: SegmentId) -> std::io::Result<Self> {
        let last = read_index(dir, segment_id)?.last().copied();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(index_path(dir, segment_id))?;

        Ok(IndexFile {
            file,
            segment_id,
            last,
        })
    }

    /// Most recent record in the file.
    pub fn last(&self) -> Option<&IndexRecord> {
        self.last.as_ref()
    }

    /// Segment this index belongs to.
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Append one record.
    pub fn append(&mut self, record: &IndexRecord) -> std::io::Result<()> {
        self.file.write_all(&record.to_bytes())?;
        self.last = Some(*record);
        Ok(())
    }

    /// Sync the index file to disk.
    pub fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_data()
    }
}

/// Read every valid record of a segment's index.
///
/// A missing index file reads as empty: the segment is then located by
/// linear scan.
pub fn read_index(dir: &Path, segment_id: SegmentId) -> std::io::Result<Vec<IndexRecord>> {
    match std::fs::read(index_path(dir, segment_id)) {
        Ok(bytes) => Ok(parse_index(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Replace a segment's index with `records`.
///
/// Writes a temporary file and renames it over the old index.
pub fn rewrite_index(
    dir: &Path,
    segment_id: SegmentId,
    records: &[IndexRecord],
) -> std::io::Result<()> {
    let path = index_path(dir, segment_id);
    let tmp = path.with_extension("index.tmp");
    {
        let mut file = File::create(&tmp)?;
        for record in records {
            file.write_all(&record.to_bytes())?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp, &path)
}

/// Commands accepted by the index writer thread.
pub(crate) enum IndexCmd {
    /// Append a record for an appended chunk
    Append(IndexFileItem),
    /// Sync the open index file
    Flush(Completion<()>),
    /// Sync and stop
    Shutdown(Completion<()>),
}

impl IndexCmd {
    /// Resolve a command that will never run.
    pub(crate) fn reject(self) {
        match self {
            IndexCmd::Append(_) => {}
            IndexCmd::Flush(completion) | IndexCmd::Shutdown(completion) => {
                completion.complete(Err(Error::WriterClosed))
            }
        }
    }
}

/// Spawn the thread owning the index file handles of a log directory.
pub(crate) fn spawn_index_writer(
    dir: PathBuf,
) -> std::io::Result<(mpsc::UnboundedSender<IndexCmd>, JoinHandle<()>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = IndexWriter { dir, current: None };
    let handle = std::thread::Builder::new()
        .name("tidelog-index".to_string())
        .spawn(move || writer.run(rx))?;
    Ok((tx, handle))
}

struct IndexWriter {
    dir: PathBuf,
    current: Option<IndexFile>,
}

impl IndexWriter {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<IndexCmd>) {
        while let Some(cmd) = rx.blocking_recv() {
            match cmd {
                IndexCmd::Append(item) => {
                    if let Err(e) = self.append(&item) {
                        error!(
                            segment_id = item.segment_id,
                            offset = item.offset,
                            error = %e,
                            "Index append failed"
                        );
                    }
                }
                IndexCmd::Flush(completion) => completion.complete(self.sync()),
                IndexCmd::Shutdown(completion) => {
                    completion.complete(self.sync());
                    break;
                }
            }
        }

        rx.close();
        while let Ok(cmd) = rx.try_recv() {
            cmd.reject();
        }
    }

    fn append(&mut self, item: &IndexFileItem) -> std::io::Result<()> {
        let stale = matches!(&self.current, Some(f) if f.segment_id() != item.segment_id);
        if stale {
            if let Some(mut previous) = self.current.take() {
                previous.sync()?;
            }
        }

        let index = match self.current.take() {
            Some(index) => self.current.insert(index),
            None => self
                .current
                .insert(IndexFile::open(&self.dir, item.segment_id)?),
        };

        let record = IndexRecord {
            offset: item.offset,
            file_offset: item.file_offset,
            tail_offset: item.tail_offset,
        };

        // The closing record repeats the last chunk when it was already indexed.
        let repeated = matches!(
            index.last,
            Some(last) if last.offset == record.offset && last.file_offset == record.file_offset
        );
        if !repeated {
            index.append(&record)?;
        }

        if item.to_close {
            index.sync()?;
            self.current = None;
            debug!(segment_id = item.segment_id, "Index file closed");
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if let Some(index) = self.current.as_mut() {
            index.sync()?;
        }
        Ok(())
    }
}
