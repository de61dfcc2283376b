//! Depot decoding and extraction.
//!
//! A depot version is stored as three artifacts:
//!
//! - a **manifest** (`{depot}_{version}.manifest`) listing every file and
//!   directory, with hierarchy encoded as parent indices
//! - an **index** (`{depot}.index`) mapping each file id to a transform
//!   mode and an ordered list of chunks
//! - a **data blob** (`{depot}.data`) holding the raw chunk bytes
//!
//! Chunks are stored raw, zlib-compressed, AES-CFB encrypted, or encrypted
//! and compressed. [`FileReader`] concatenates a file's decoded chunks as a
//! stream, and [`Extractor`] writes a whole manifest to disk with a pool of
//! worker threads.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use exdepot_depot::{Depot, DepotLayout, KeySelector};
//!
//! let layout = DepotLayout::new("manifests", "storages");
//! let depot = Depot::load(&layout, Some(Path::new("depotkeys.json")), 3, 12)?;
//!
//! let data = depot.open_data(&layout)?;
//! let report = depot
//!     .extractor(&data, depot.key(KeySelector::DepotId))
//!     .run(Path::new("3_12"))?;
//! println!("{} files, {} bytes", report.files, report.bytes);
//! # Ok::<(), exdepot_depot::Error>(())
//! ```
//!
//! # Features
//!
//! - `parallel` (default): resolve manifest paths with rayon

mod blob;
mod chunk;
mod crypto;
mod depot;
mod error;
mod export;
mod extract;
mod file;
pub mod format;
mod index;
mod keys;
mod manifest;

#[cfg(test)]
mod fixture;

pub use blob::{ChunkSource, DataBlob};
pub use chunk::ChunkReader;
pub use crypto::decrypt_in_place;
pub use depot::{Depot, DepotLayout};
pub use error::{Error, Result};
pub use export::{write_file_list, write_index_json, write_manifest_json};
pub use extract::{
    ExtractOptions, ExtractReport, Extractor, FailurePolicy, JobFailure, JobOutcome,
};
pub use file::FileReader;
pub use index::{Chunk, Index, IndexEntry, Mode};
pub use keys::{KeySelector, KeyTable};
pub use manifest::{sanitize_name, Item, Manifest, ManifestHeader, PATH_SEPARATOR};
