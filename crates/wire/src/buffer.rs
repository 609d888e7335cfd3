//! Response sinks.
//!
//! Marshaling a header appends it and then patches its CRC in place, so a
//! sink must expose the bytes it already holds, not just accept more.

use bytes::BytesMut;

/// Growable byte sink with a view over already written bytes.
pub trait BufferBackedWriter {
    /// Append bytes at the end.
    fn append(&mut self, bytes: &[u8]);

    /// Bytes written so far.
    fn written(&self) -> &[u8];

    /// Mutable view of the bytes written so far.
    fn written_mut(&mut self) -> &mut [u8];
}

impl BufferBackedWriter for Vec<u8> {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn written(&self) -> &[u8] {
        self.as_slice()
    }

    fn written_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl BufferBackedWriter for BytesMut {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }

    fn written(&self) -> &[u8] {
        self
    }

    fn written_mut(&mut self) -> &mut [u8] {
        self
    }
}
