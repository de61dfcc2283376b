//! Exdepot - game content depot decoding and extraction library.
//!
//! This crate provides a unified interface to the exdepot crates.
//!
//! # Crates
//!
//! - [`exdepot_common`] - Binary cursors over slices and streams
//! - [`exdepot_depot`] - Manifest, index and chunk decoding plus extraction
//!
//! # Example
//!
//! ```no_run
//! use exdepot::prelude::*;
//!
//! let layout = DepotLayout::default();
//! let depot = Depot::load(&layout, None, 3, 12)?;
//!
//! for item in depot.manifest().files() {
//!     println!("{} ({} bytes)", item.path(), item.size());
//! }
//! # Ok::<(), exdepot::depot::Error>(())
//! ```

pub use exdepot_common as common;
pub use exdepot_depot as depot;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use exdepot_common::{BinaryReader, ReadExt};
    pub use exdepot_depot::{
        ChunkSource, DataBlob, Depot, DepotLayout, ExtractOptions, ExtractReport, Extractor,
        FailurePolicy, Index, IndexEntry, Item, KeySelector, KeyTable, Manifest, Mode,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
