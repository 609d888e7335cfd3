//! Shared scalar types and the process-wide byte order.

/// Absolute, broker-assigned position of a message in a partition log.
pub type Offset = u64;

/// Identifier of a segment: the offset of the first message it holds.
pub type SegmentId = u64;

/// Byte order used for every on-disk and on-wire integer.
///
/// Chunk headers, index records and protocol frames all go through this
/// alias; producers and consumers must agree on it bit for bit.
pub type Endianness = byteorder::BigEndian;

/// Identifier of a peer broker that receives replicated chunks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a peer id from its name.
    pub fn new(name: impl Into<String>) -> Self {
        PeerId(name.into())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
