//! Listing and JSON dumps of parsed depot structures.

use std::collections::BTreeMap;
use std::io::Write;

use crate::index::{Index, IndexEntry};
use crate::manifest::Manifest;
use crate::Result;

/// Write every non-empty item path, one per line.
pub fn write_file_list<W: Write>(manifest: &Manifest, mut out: W) -> Result<()> {
    for item in manifest.iter().filter(|item| !item.path().is_empty()) {
        writeln!(out, "{}", item.path())?;
    }
    out.flush()?;
    Ok(())
}

/// Write the manifest header and items as JSON.
pub fn write_manifest_json<W: Write>(manifest: &Manifest, mut out: W) -> Result<()> {
    serde_json::to_writer(&mut out, manifest)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write the index as a JSON object keyed by file id, in id order.
pub fn write_index_json<W: Write>(index: &Index, mut out: W) -> Result<()> {
    let sorted: BTreeMap<u64, &IndexEntry> = index.iter().collect();
    serde_json::to_writer(&mut out, &sorted)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
