//! Per-chunk decode pipeline.
//!
//! A chunk is a byte range of the data blob transformed according to its
//! file's [`Mode`]. Raw and compressed chunks stream straight from the blob;
//! encrypted chunks are copied and decrypted first since CFB decrypts in
//! place.

use std::io::{self, Cursor, Read};

use flate2::read::ZlibDecoder;

use crate::blob::ChunkSource;
use crate::crypto::decrypt_in_place;
use crate::format::ENCRYPTED_CHUNK_HEADER_SIZE;
use crate::index::{Chunk, Mode};
use crate::{Error, Result};

enum Inner<'a> {
    Empty,
    Raw(&'a [u8]),
    Compressed(ZlibDecoder<&'a [u8]>),
    Encrypted(Cursor<Vec<u8>>),
    EncryptedCompressed(ZlibDecoder<Cursor<Vec<u8>>>),
}

/// Reader over the decoded bytes of one chunk.
pub struct ChunkReader<'a> {
    inner: Inner<'a>,
}

impl<'a> ChunkReader<'a> {
    /// A reader that yields nothing.
    pub fn empty() -> Self {
        Self { inner: Inner::Empty }
    }

    /// Decode raw chunk bytes.
    ///
    /// Empty input yields nothing without consulting the key. Encrypted modes
    /// fail with [`Error::MissingKey`] when no key is given.
    pub fn new(raw: &'a [u8], mode: Mode, key: Option<&[u8]>) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::empty());
        }

        let inner = match mode {
            Mode::Raw => Inner::Raw(raw),
            Mode::Compressed => Inner::Compressed(ZlibDecoder::new(raw)),
            Mode::Encrypted => {
                let key = key.ok_or(Error::MissingKey)?;
                let mut data = raw.to_vec();
                decrypt_in_place(key, &mut data)?;
                data.truncate(raw.len());
                Inner::Encrypted(Cursor::new(data))
            }
            Mode::EncryptedCompressed => {
                if raw.len() < ENCRYPTED_CHUNK_HEADER_SIZE {
                    return Err(Error::TruncatedChunkHeader { length: raw.len() });
                }
                let key = key.ok_or(Error::MissingKey)?;

                // The size header is plaintext and not needed to decode.
                let mut data = raw[ENCRYPTED_CHUNK_HEADER_SIZE..].to_vec();
                decrypt_in_place(key, &mut data)?;
                Inner::EncryptedCompressed(ZlibDecoder::new(Cursor::new(data)))
            }
        };

        Ok(Self { inner })
    }

    /// Read a chunk from `source` and decode it.
    pub fn open<S: ChunkSource + ?Sized>(
        source: &'a S,
        chunk: &Chunk,
        mode: Mode,
        key: Option<&[u8]>,
    ) -> Result<Self> {
        if chunk.is_empty() {
            return Ok(Self::empty());
        }

        let raw = source.read_range(chunk.offset, chunk.length)?;
        Self::new(raw, mode, key)
    }
}

impl Read for ChunkReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Empty => Ok(0),
            Inner::Raw(data) => data.read(buf),
            Inner::Compressed(decoder) => decoder.read(buf),
            Inner::Encrypted(cursor) => cursor.read(buf),
            Inner::EncryptedCompressed(decoder) => decoder.read(buf),
        }
    }
}

impl std::fmt::Debug for ChunkReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.inner {
            Inner::Empty => "Empty",
            Inner::Raw(_) => "Raw",
            Inner::Compressed(_) => "Compressed",
            Inner::Encrypted(_) => "Encrypted",
            Inner::EncryptedCompressed(_) => "EncryptedCompressed",
        };
        f.debug_struct("ChunkReader").field("kind", &kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::fixture::{encrypt, encrypt_compressed, zlib, KEY_128};

    fn decode(raw: &[u8], mode: Mode, key: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        ChunkReader::new(raw, mode, key)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(decode(b"hello", Mode::Raw, None), b"hello");
    }

    #[test]
    fn test_compressed() {
        let plain = b"compressed chunk contents ".repeat(20);
        assert_eq!(decode(&zlib(&plain), Mode::Compressed, None), plain);
    }

    #[test]
    fn test_encrypted_keeps_length() {
        let plain = b"twenty-one bytes long";
        let raw = encrypt(&KEY_128, plain);

        let out = decode(&raw, Mode::Encrypted, Some(&KEY_128));
        assert_eq!(out.len(), raw.len());
        assert_eq!(out, plain);
    }

    #[test]
    fn test_encrypted_compressed_skips_header() {
        let plain = b"encrypted and compressed ".repeat(10);
        let raw = encrypt_compressed(&KEY_128, &plain);

        assert_eq!(
            decode(&raw, Mode::EncryptedCompressed, Some(&KEY_128)),
            plain
        );
    }

    #[test]
    fn test_larger_keys() {
        let plain = b"aes-192 and aes-256".to_vec();
        for key in [vec![7u8; 24], vec![9u8; 32]] {
            let raw = encrypt(&key, &plain);
            assert_eq!(decode(&raw, Mode::Encrypted, Some(&key)), plain);

            let raw = encrypt_compressed(&key, &plain);
            assert_eq!(decode(&raw, Mode::EncryptedCompressed, Some(&key)), plain);
        }
    }

    #[test]
    fn test_missing_key() {
        let raw = encrypt(&KEY_128, b"secret");
        assert!(matches!(
            ChunkReader::new(&raw, Mode::Encrypted, None),
            Err(Error::MissingKey)
        ));

        let raw = encrypt_compressed(&KEY_128, b"secret");
        assert!(matches!(
            ChunkReader::new(&raw, Mode::EncryptedCompressed, None),
            Err(Error::MissingKey)
        ));
    }

    #[test]
    fn test_empty_chunk_never_needs_key() {
        for mode in [Mode::Encrypted, Mode::EncryptedCompressed] {
            assert!(decode(&[], mode, None).is_empty());
        }

        let blob: Vec<u8> = vec![1, 2, 3];
        let mut out = Vec::new();
        ChunkReader::open(&blob, &Chunk::new(99, 0), Mode::Encrypted, None)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_short_size_header() {
        assert!(matches!(
            ChunkReader::new(&[1, 2, 3], Mode::EncryptedCompressed, Some(&KEY_128)),
            Err(Error::TruncatedChunkHeader { length: 3 })
        ));
    }

    #[test]
    fn test_open_from_blob_offset() {
        let plain = vec![b'x'; 4096];
        let compressed = zlib(&plain);
        assert!(compressed.len() <= 42);

        let mut blob = vec![0u8; 1000];
        blob.extend_from_slice(&compressed);
        blob.resize(1042, 0);

        let mut out = Vec::new();
        ChunkReader::open(&blob, &Chunk::new(1000, 42), Mode::Compressed, None)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn test_open_out_of_range() {
        let blob = vec![0u8; 10];
        assert!(matches!(
            ChunkReader::open(&blob, &Chunk::new(8, 4), Mode::Raw, None),
            Err(Error::ChunkOutOfRange { .. })
        ));
    }

    #[test]
    fn test_corrupt_zlib_is_read_error() {
        let mut reader = ChunkReader::new(b"not zlib at all", Mode::Compressed, None).unwrap();
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    fn aes_key() -> impl Strategy<Value = Vec<u8>> {
        prop::sample::select(vec![16usize, 24, 32])
            .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
    }

    proptest! {
        #[test]
        fn prop_compressed_round_trip(plain in prop::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(decode(&zlib(&plain), Mode::Compressed, None), plain);
        }

        #[test]
        fn prop_encrypted_round_trip(
            plain in prop::collection::vec(any::<u8>(), 0..2048),
            key in aes_key()
        ) {
            let raw = encrypt(&key, &plain);
            let out = decode(&raw, Mode::Encrypted, Some(&key));

            prop_assert_eq!(out.len(), raw.len());
            prop_assert_eq!(out, plain);
        }

        #[test]
        fn prop_encrypted_compressed_round_trip(
            plain in prop::collection::vec(any::<u8>(), 0..2048),
            key in aes_key()
        ) {
            let raw = encrypt_compressed(&key, &plain);
            prop_assert_eq!(decode(&raw, Mode::EncryptedCompressed, Some(&key)), plain);
        }
    }
}
