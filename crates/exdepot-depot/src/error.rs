//! Error types for the depot crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when decoding or extracting a depot.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Common library error (truncated reads).
    #[error("{0}")]
    Common(#[from] exdepot_common::Error),

    /// Manifest shorter than its fixed header.
    #[error("truncated manifest header: needed {needed} bytes but only {available} available")]
    TruncatedHeader { needed: usize, available: usize },

    /// Item record lies outside the manifest.
    #[error("item {item} record at offset {offset} lies outside the manifest")]
    ItemOutOfRange { item: usize, offset: u64 },

    /// Name offset points outside the manifest, or the name runs off its end.
    #[error("name of item {item} at offset {offset} lies outside the manifest")]
    NameOutOfRange { item: usize, offset: u64 },

    /// Parent index does not name an item.
    #[error("item {item} has parent index {parent} but the manifest has {count} items")]
    ParentOutOfRange { item: usize, parent: u32, count: usize },

    /// Parent links loop back on themselves.
    #[error("parent chain of item {item} does not reach the root")]
    ParentCycle { item: usize },

    /// Index record cut short by the end of the stream.
    #[error("truncated index record at offset {offset}")]
    TruncatedRecord { offset: u64 },

    /// Chunk table length is not a whole number of chunk records.
    #[error("chunk table of file {id} is {length} bytes, not a multiple of 16")]
    MisalignedChunkTable { id: u64, length: u64 },

    /// Mode value outside the four known transforms.
    #[error("file {id} has unknown mode {mode}")]
    UnknownMode { id: u64, mode: u64 },

    /// Encrypted+compressed chunk shorter than its size header.
    #[error("chunk of {length} bytes is too short for its 8-byte size header")]
    TruncatedChunkHeader { length: usize },

    /// Chunk range lies outside the data blob.
    #[error("chunk at offset {offset} with length {length} lies outside the data ({available} bytes)")]
    ChunkOutOfRange {
        offset: u64,
        length: u64,
        available: u64,
    },

    /// A chunk needs decryption but no key was provided.
    #[error("missing decryption key")]
    MissingKey,

    /// Key is not a valid AES key size.
    #[error("invalid AES key length: {0} bytes")]
    InvalidKeyLength(usize),

    /// Key file could not be interpreted.
    #[error("invalid key file: {0}")]
    KeyFile(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest belongs to a different depot or version.
    #[error("manifest depot {field} {actual} does not match requested {expected}")]
    IdentityMismatch {
        field: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Item path would resolve outside the output directory.
    #[error("item path {path:?} escapes the output directory")]
    UnsafePath { path: String },

    /// No index entry for a requested file id.
    #[error("file id {0} not found in index")]
    UnknownFileId(u64),

    /// Output directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error while reading a depot artifact.
    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Error while extracting a single file.
    #[error("failed to extract {} (id {id}): {source}", path.display())]
    Job {
        path: PathBuf,
        id: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attach the path of the artifact being read.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Error::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Wrap this error for transport through an `io::Read` implementation.
    pub fn into_io(self) -> io::Error {
        match self {
            Error::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }

    /// Recover a typed error from an `io::Error` produced by [`Error::into_io`].
    pub fn from_io(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }

        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Error::Io(io::Error::from(kind)),
        }
    }
}

/// Result type for depot operations.
pub type Result<T> = std::result::Result<T, Error>;
