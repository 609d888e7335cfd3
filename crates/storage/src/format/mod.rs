//! Binary on-disk formats
//!
//! - `chunk_header`: chunk header + body records appended to segment files
//! - `index_record`: fixed-size offset index records

pub mod chunk_header;
pub mod index_record;

pub use chunk_header::{
    decode_chunk, encode_chunk, ChunkFormatError, ChunkHeader, CHUNK_HEADER_SIZE,
};
pub use index_record::{floor_entry, parse_index, IndexRecord, INDEX_RECORD_SIZE};
