//! Index record structures.

use zerocopy::byteorder::big_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Header of one index record, followed by its chunk table.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct IndexRecordHeader {
    /// File id matching a manifest item
    pub id: U64,
    /// Length of the chunk table in bytes
    pub chunk_table_len: U64,
    /// Transform mode for every chunk of the file
    pub mode: U64,
}

/// One chunk table entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct ChunkRecord {
    /// Absolute offset into the data blob
    pub offset: U64,
    /// Length in bytes
    pub length: U64,
}
