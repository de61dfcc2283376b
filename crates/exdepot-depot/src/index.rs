//! Index decoder.
//!
//! The index is a sequence of records, each a 24-byte big-endian header
//! `(id, chunk_table_len, mode)` followed by `chunk_table_len / 16` chunk
//! records `(offset, length)`. The stream ends cleanly only on a record
//! boundary.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use exdepot_common::ReadExt;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;
use zerocopy::FromBytes;

use crate::blob::ChunkSource;
use crate::file::FileReader;
use crate::format::{ChunkRecord, IndexRecordHeader, CHUNK_RECORD_SIZE, INDEX_RECORD_HEADER_SIZE};
use crate::{Error, Result};

/// Transform applied to every chunk of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u64")]
#[repr(u64)]
pub enum Mode {
    /// Bytes are stored as-is.
    Raw = 0,
    /// zlib-wrapped DEFLATE stream.
    Compressed = 1,
    /// 8-byte size header, then an AES-CFB encrypted zlib stream.
    EncryptedCompressed = 2,
    /// AES-CFB encrypted bytes.
    Encrypted = 3,
}

impl Mode {
    /// Whether chunks need a decryption key.
    #[inline]
    pub fn is_encrypted(self) -> bool {
        matches!(self, Self::Encrypted | Self::EncryptedCompressed)
    }

    /// Whether chunks hold a zlib stream (after any decryption).
    #[inline]
    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Compressed | Self::EncryptedCompressed)
    }
}

impl TryFrom<u64> for Mode {
    type Error = u64;

    fn try_from(value: u64) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Compressed),
            2 => Ok(Self::EncryptedCompressed),
            3 => Ok(Self::Encrypted),
            other => Err(other),
        }
    }
}

impl From<Mode> for u64 {
    fn from(mode: Mode) -> Self {
        mode as u64
    }
}

/// A byte range in the data blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub offset: u64,
    pub length: u64,
}

impl Chunk {
    #[inline]
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Zero-length chunks contribute nothing and are never decoded.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl From<&ChunkRecord> for Chunk {
    fn from(raw: &ChunkRecord) -> Self {
        Self::new(raw.offset.get(), raw.length.get())
    }
}

/// Mode and chunk list of one file. Chunk order is output order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub mode: Mode,
    pub chunks: Vec<Chunk>,
}

impl IndexEntry {
    pub fn new(mode: Mode, chunks: Vec<Chunk>) -> Self {
        Self { mode, chunks }
    }

    /// Total stored (pre-transform) size of all chunks.
    pub fn encoded_len(&self) -> u64 {
        self.chunks.iter().map(|c| c.length).sum()
    }

    /// Stream this file's decoded bytes.
    pub fn reader<'a, S: ChunkSource + ?Sized>(
        &'a self,
        source: &'a S,
        key: Option<&'a [u8]>,
    ) -> FileReader<'a, S> {
        FileReader::new(source, self, key)
    }
}

/// Index entries keyed by file id.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: FxHashMap<u64, IndexEntry>,
}

impl Index {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and parse an index file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from(e).in_file(path))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| e.in_file(path))
    }

    /// Parse an index from its bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::from_reader(data)
    }

    /// Parse an index from a stream.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut entries = FxHashMap::default();
        let mut offset = 0u64;
        let mut header_bytes = [0u8; INDEX_RECORD_HEADER_SIZE];

        loop {
            let filled = reader.fill_record(&mut header_bytes)?;
            if filled == 0 {
                break;
            }
            if filled < INDEX_RECORD_HEADER_SIZE {
                return Err(Error::TruncatedRecord { offset });
            }

            let header = IndexRecordHeader::read_from_bytes(&header_bytes)
                .map_err(|_| Error::TruncatedRecord { offset })?;
            let id = header.id.get();
            let table_len = header.chunk_table_len.get();

            let mode = Mode::try_from(header.mode.get())
                .map_err(|mode| Error::UnknownMode { id, mode })?;

            if table_len % CHUNK_RECORD_SIZE as u64 != 0 {
                return Err(Error::MisalignedChunkTable {
                    id,
                    length: table_len,
                });
            }

            let count = table_len / CHUNK_RECORD_SIZE as u64;
            let mut chunks = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                let record: ChunkRecord = reader.read_struct().map_err(|e| match e.kind() {
                    io::ErrorKind::UnexpectedEof => Error::TruncatedRecord { offset },
                    _ => Error::Io(e),
                })?;
                chunks.push(Chunk::from(&record));
            }

            entries.insert(id, IndexEntry::new(mode, chunks));
            offset += INDEX_RECORD_HEADER_SIZE as u64 + table_len;
        }

        debug!(entries = entries.len(), bytes = offset, "parsed index");

        Ok(Self { entries })
    }

    /// Get the entry for a file id.
    #[inline]
    pub fn get(&self, id: u64) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    /// Insert or replace the entry for a file id.
    pub fn insert(&mut self, id: u64, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(id, entry)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(id, entry)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &IndexEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Iterate over ids in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    /// Stream the decoded bytes of the file with the given id.
    pub fn open_file<'a, S: ChunkSource + ?Sized>(
        &'a self,
        id: u64,
        source: &'a S,
        key: Option<&'a [u8]>,
    ) -> Result<FileReader<'a, S>> {
        self.get(id)
            .map(|entry| entry.reader(source, key))
            .ok_or(Error::UnknownFileId(id))
    }
}
