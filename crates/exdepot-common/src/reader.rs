//! Binary cursors for parsing depot files.
//!
//! [`BinaryReader`] walks a byte slice (memory-mapped manifests) without
//! copying. [`ReadExt`] adds the same fixed-width reads to any stream
//! (buffered index files).

use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use zerocopy::FromBytes;

use crate::{Error, Result};

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// # Example
///
/// ```
/// use exdepot_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_u64_be().unwrap(), 0x0100);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

/// Bytes of a null-terminated string scanned with an upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CString<'a> {
    /// String bytes, without the terminator.
    pub bytes: &'a [u8],
    /// False when the scan stopped at the length cap instead of a null byte.
    pub terminated: bool,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    ///
    /// Seeking past the end is allowed; the next read reports the error.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position by a number of bytes.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available: self.remaining(),
                position: self.position,
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }

    /// Read a big-endian u64.
    #[inline]
    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.read_bytes(8).map(BigEndian::read_u64)
    }

    /// Read a null-terminated string of at most `max_len` bytes.
    ///
    /// Stops at the first null byte or after `max_len` bytes, whichever
    /// comes first. Running out of data before either is an error. The
    /// terminator, when present, is consumed.
    pub fn read_cstring_capped(&mut self, max_len: usize) -> Result<CString<'a>> {
        let remaining = self.remaining_bytes();
        let window = &remaining[..remaining.len().min(max_len)];

        match memchr::memchr(0, window) {
            Some(nul) => {
                self.position += nul + 1;
                Ok(CString {
                    bytes: &window[..nul],
                    terminated: true,
                })
            }
            None if window.len() == max_len => {
                self.position += max_len;
                Ok(CString {
                    bytes: window,
                    terminated: false,
                })
            }
            None => Err(Error::UnexpectedEof {
                needed: window.len() + 1,
                available: window.len(),
                position: self.position,
            }),
        }
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let position = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: size,
            available: bytes.len(),
            position,
        })
    }
}

/// Trait for reading binary data from streams.
///
/// This extends `Read` with the fixed-width reads the depot formats use.
pub trait ReadExt: Read {
    /// Read a little-endian u32.
    fn read_u32_le(&mut self) -> io::Result<u32> {
        self.read_u32::<LittleEndian>()
    }

    /// Read a big-endian u64.
    fn read_u64_be(&mut self) -> io::Result<u64> {
        self.read_u64::<BigEndian>()
    }

    /// Read a structure from the stream.
    fn read_struct<T: FromBytes>(&mut self) -> io::Result<T> {
        let size = std::mem::size_of::<T>();
        let mut bytes = vec![0u8; size];
        self.read_exact(&mut bytes)?;
        T::read_from_bytes(&bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "short structure read"))
    }

    /// Fill `buf` from the stream, stopping early only at end of stream.
    ///
    /// Returns the number of bytes read. Zero means the stream was already
    /// exhausted; anything between zero and `buf.len()` is a partial record.
    fn fill_record(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + ?Sized> ReadExt for R {}
