//! File assembly.
//!
//! A file's content is the concatenation of its decoded chunks in index
//! order. [`FileReader`] opens chunks lazily, so at most one chunk is held
//! in memory at a time.

use std::io::{self, Read, Write};

use crate::blob::ChunkSource;
use crate::chunk::ChunkReader;
use crate::index::IndexEntry;
use crate::{Error, Result};

/// Streaming reader over the decoded content of one file.
pub struct FileReader<'a, S: ChunkSource + ?Sized> {
    source: &'a S,
    entry: &'a IndexEntry,
    key: Option<&'a [u8]>,
    next_chunk: usize,
    current: Option<ChunkReader<'a>>,
}

impl<'a, S: ChunkSource + ?Sized> FileReader<'a, S> {
    pub fn new(source: &'a S, entry: &'a IndexEntry, key: Option<&'a [u8]>) -> Self {
        Self {
            source,
            entry,
            key,
            next_chunk: 0,
            current: None,
        }
    }

    /// Open the next non-empty chunk. Returns false once all chunks are used.
    fn advance(&mut self) -> Result<bool> {
        while let Some(chunk) = self.entry.chunks.get(self.next_chunk) {
            self.next_chunk += 1;
            if chunk.is_empty() {
                continue;
            }

            let reader = ChunkReader::open(self.source, chunk, self.entry.mode, self.key)?;
            self.current = Some(reader);
            return Ok(true);
        }

        self.current = None;
        Ok(false)
    }

    /// Write the whole decoded file to `out`, returning the byte count.
    pub fn write_into<W: Write + ?Sized>(&mut self, out: &mut W) -> Result<u64> {
        io::copy(self, out).map_err(Error::from_io)
    }
}

impl<S: ChunkSource + ?Sized> Read for FileReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(current) = &mut self.current {
                let n = current.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                self.current = None;
            }

            if !self.advance().map_err(Error::into_io)? {
                return Ok(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{encrypt, encrypt_compressed, zlib, BlobBuilder, KEY_128};
    use crate::index::{Chunk, Mode};

    fn entry(mode: Mode, chunks: &[(u64, u64)]) -> IndexEntry {
        IndexEntry::new(
            mode,
            chunks.iter().map(|&(o, l)| Chunk::new(o, l)).collect(),
        )
    }

    #[test]
    fn test_concatenates_chunks_in_order() {
        let mut blob = BlobBuilder::default();
        let second = blob.push(&zlib(b"world"));
        let first = blob.push(&zlib(b"hello "));
        let entry = entry(Mode::Compressed, &[first, second]);

        let mut out = Vec::new();
        let written = entry.reader(&blob.data, None).write_into(&mut out).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(written, 11);
    }

    #[test]
    fn test_small_read_buffer() {
        let plain: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let mut blob = BlobBuilder::default();
        let a = blob.push(&encrypt_compressed(&KEY_128, &plain[..1000]));
        let b = blob.push(&encrypt_compressed(&KEY_128, &plain[1000..]));
        let entry = entry(Mode::EncryptedCompressed, &[a, b]);

        let mut reader = entry.reader(&blob.data, Some(&KEY_128));
        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, plain);
    }

    #[test]
    fn test_empty_chunk_between() {
        let mut blob = BlobBuilder::default();
        let a = blob.push(&encrypt(&KEY_128, b"abc"));
        let b = blob.push(&encrypt(&KEY_128, b"def"));
        let entry = entry(Mode::Encrypted, &[a, (a.0, 0), b]);

        let mut out = Vec::new();
        entry
            .reader(&blob.data, Some(&KEY_128))
            .write_into(&mut out)
            .unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn test_no_chunks_is_empty_file() {
        let blob: Vec<u8> = Vec::new();
        let entry = entry(Mode::Encrypted, &[]);

        let mut out = Vec::new();
        assert_eq!(entry.reader(&blob, None).write_into(&mut out).unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_key_keeps_type() {
        let mut blob = BlobBuilder::default();
        let a = blob.push(&encrypt(&KEY_128, b"abc"));
        let entry = entry(Mode::Encrypted, &[a]);

        let mut out = Vec::new();
        assert!(matches!(
            entry.reader(&blob.data, None).write_into(&mut out),
            Err(Error::MissingKey)
        ));
    }

    #[test]
    fn test_out_of_range_chunk_keeps_type() {
        let blob = vec![0u8; 4];
        let entry = entry(Mode::Raw, &[(0, 4), (2, 8)]);

        let mut out = Vec::new();
        assert!(matches!(
            entry.reader(&blob, None).write_into(&mut out),
            Err(Error::ChunkOutOfRange { offset: 2, length: 8, available: 4 })
        ));
    }
}
