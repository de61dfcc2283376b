//! Data blob access.
//!
//! The data blob is opened once and shared read-only by every worker. Reads
//! are positional slices of a memory map, so concurrent workers never share
//! a cursor.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::{Error, Result};

/// Random-access, read-only source of raw chunk bytes.
pub trait ChunkSource: Sync {
    /// Borrow `length` bytes starting at `offset`.
    fn read_range(&self, offset: u64, length: u64) -> Result<&[u8]>;
}

impl ChunkSource for [u8] {
    fn read_range(&self, offset: u64, length: u64) -> Result<&[u8]> {
        let available = self.len() as u64;
        let out_of_range = || Error::ChunkOutOfRange {
            offset,
            length,
            available,
        };

        let end = offset.checked_add(length).ok_or_else(out_of_range)?;
        if end > available {
            return Err(out_of_range());
        }

        Ok(&self[offset as usize..end as usize])
    }
}

impl ChunkSource for Vec<u8> {
    #[inline]
    fn read_range(&self, offset: u64, length: u64) -> Result<&[u8]> {
        self.as_slice().read_range(offset, length)
    }
}

/// Memory-mapped depot data file.
pub struct DataBlob {
    mmap: Mmap,
    path: PathBuf,
}

impl DataBlob {
    /// Map a data file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let map = || -> Result<Mmap> {
            let file = File::open(path)?;
            Ok(unsafe { Mmap::map(&file)? })
        };

        let mmap = map().map_err(|e| e.in_file(path))?;
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Path the blob was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the blob in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl ChunkSource for DataBlob {
    #[inline]
    fn read_range(&self, offset: u64, length: u64) -> Result<&[u8]> {
        self.mmap[..].read_range(offset, length)
    }
}

impl std::fmt::Debug for DataBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBlob")
            .field("path", &self.path)
            .field("len", &self.mmap.len())
            .finish()
    }
}
