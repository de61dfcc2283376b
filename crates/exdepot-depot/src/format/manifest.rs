//! Manifest header and item record structures.

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Manifest file header.
///
/// Only `depot_id`, `depot_version`, `item_count` and `info_count` carry
/// meaning for extraction; the rest is kept for dumps.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct ManifestHeaderRecord {
    pub dummy1: U32,
    /// Depot this manifest describes
    pub depot_id: U32,
    /// Depot version this manifest describes
    pub depot_version: U32,
    /// Number of item records following the header
    pub item_count: U32,
    pub file_count: U32,
    pub block_size: U32,
    pub dir_size: U32,
    pub dir_name_size: U32,
    pub info_count: U32,
    pub copy_count: U32,
    pub local_count: U32,
    pub dummy2: U32,
    pub dummy3: U32,
    pub checksum: U32,
}

/// Item (file or directory) record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct ItemRecord {
    /// Offset of the name inside the name blob
    pub name_offset: U32,
    /// Item size in bytes
    pub size: U32,
    /// File id, the join key into the index
    pub id: U32,
    /// Item type flags
    pub item_type: U32,
    /// Index of the parent item, or `ROOT_PARENT`
    pub parent_index: U32,
    /// Index of the next sibling
    pub next_index: U32,
    /// Index of the first child
    pub first_index: U32,
}
