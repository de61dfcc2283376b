//! Raw on-disk record layouts.
//!
//! The manifest is little-endian 32-bit throughout; the index is big-endian
//! 64-bit throughout. The field types below carry that byte order so the
//! records decode identically on any host.

mod index;
mod manifest;

pub use index::{ChunkRecord, IndexRecordHeader};
pub use manifest::{ItemRecord, ManifestHeaderRecord};

/// Size of the manifest header (14 little-endian u32 fields).
pub const MANIFEST_HEADER_SIZE: usize = 56;

/// Size of one item record (7 little-endian u32 fields).
pub const ITEM_RECORD_SIZE: usize = 28;

/// Parent index marking a root item.
pub const ROOT_PARENT: u32 = 0xFFFF_FFFF;

/// Item type bit set for files, clear for directories.
pub const FILE_TYPE_FLAG: u32 = 0x4000;

/// Longest name read from the name blob.
pub const MAX_NAME_LEN: usize = 255;

/// Size of an index record header (3 big-endian u64 fields).
pub const INDEX_RECORD_HEADER_SIZE: usize = 24;

/// Size of one chunk record (2 big-endian u64 fields).
pub const CHUNK_RECORD_SIZE: usize = 16;

/// Size header preceding encrypted+compressed chunks.
pub const ENCRYPTED_CHUNK_HEADER_SIZE: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<ManifestHeaderRecord>(), MANIFEST_HEADER_SIZE);
        assert_eq!(std::mem::size_of::<ItemRecord>(), ITEM_RECORD_SIZE);
        assert_eq!(std::mem::size_of::<IndexRecordHeader>(), INDEX_RECORD_HEADER_SIZE);
        assert_eq!(std::mem::size_of::<ChunkRecord>(), CHUNK_RECORD_SIZE);
    }
}
