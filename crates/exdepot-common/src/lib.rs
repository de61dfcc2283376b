//! Common utilities for exdepot.
//!
//! This crate provides the binary cursor types shared by the depot parsers:
//!
//! - [`BinaryReader`] - Zero-copy cursor over a byte slice (seekable sources)
//! - [`ReadExt`] - Fixed-width reads over any [`std::io::Read`] stream
//!
//! Depot formats mix byte orders: the manifest is little-endian 32-bit,
//! the index is big-endian 64-bit. Both readers expose exactly those widths.

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::{BinaryReader, CString, ReadExt};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Re-export memchr for terminator scanning
pub use memchr;
