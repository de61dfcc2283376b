//! Manifest decoder.
//!
//! A manifest is a 56-byte header, `item_count` fixed 28-byte item records,
//! and a blob of null-terminated names addressed by offset. Hierarchy is
//! encoded through parent indices into the item array, so paths can only
//! be built once every item has been read.

use std::fs::File;
use std::path::Path;

use exdepot_common::BinaryReader;
use memmap2::Mmap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::format::{
    ItemRecord, ManifestHeaderRecord, FILE_TYPE_FLAG, ITEM_RECORD_SIZE, MANIFEST_HEADER_SIZE,
    MAX_NAME_LEN, ROOT_PARENT,
};
use crate::{Error, Result};

/// Characters stripped from names on platforms that reject them in paths.
const ILLEGAL_NAME_CHARS: [char; 8] = ['\\', '/', ':', '*', '"', '<', '>', '|'];

/// Separator used when joining item names into paths.
pub const PATH_SEPARATOR: char = '/';

/// Decoded manifest header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestHeader {
    pub dummy1: u32,
    pub depot_id: u32,
    pub depot_version: u32,
    #[serde(rename = "numItems")]
    pub item_count: u32,
    #[serde(rename = "numFiles")]
    pub file_count: u32,
    pub block_size: u32,
    pub dir_size: u32,
    pub dir_name_size: u32,
    pub info_count: u32,
    pub copy_count: u32,
    pub local_count: u32,
    pub dummy2: u32,
    pub dummy3: u32,
    pub checksum: u32,
}

impl From<&ManifestHeaderRecord> for ManifestHeader {
    fn from(raw: &ManifestHeaderRecord) -> Self {
        Self {
            dummy1: raw.dummy1.get(),
            depot_id: raw.depot_id.get(),
            depot_version: raw.depot_version.get(),
            item_count: raw.item_count.get(),
            file_count: raw.file_count.get(),
            block_size: raw.block_size.get(),
            dir_size: raw.dir_size.get(),
            dir_name_size: raw.dir_name_size.get(),
            info_count: raw.info_count.get(),
            copy_count: raw.copy_count.get(),
            local_count: raw.local_count.get(),
            dummy2: raw.dummy2.get(),
            dummy3: raw.dummy3.get(),
            checksum: raw.checksum.get(),
        }
    }
}

/// A file or directory in the manifest tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    size: u32,
    id: u32,
    #[serde(rename = "type")]
    item_type: u32,
    parent_index: u32,
    next_index: u32,
    first_index: u32,
    name: String,
    path: String,
}

impl Item {
    fn from_record(record: &ItemRecord, name: String) -> Self {
        Self {
            size: record.size.get(),
            id: record.id.get(),
            item_type: record.item_type.get(),
            parent_index: record.parent_index.get(),
            next_index: record.next_index.get(),
            first_index: record.first_index.get(),
            name,
            path: String::new(),
        }
    }

    /// Item size in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// File id, the join key into the index.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Raw type flags.
    #[inline]
    pub fn item_type(&self) -> u32 {
        self.item_type
    }

    /// Index of the parent item, [`ROOT_PARENT`] for roots.
    #[inline]
    pub fn parent_index(&self) -> u32 {
        self.parent_index
    }

    /// Index of the next sibling.
    #[inline]
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Index of the first child.
    #[inline]
    pub fn first_index(&self) -> u32 {
        self.first_index
    }

    /// Item name as stored in the name blob.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names from the root down to this item, joined by [`PATH_SEPARATOR`].
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Directories have the file type bit clear.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.item_type & FILE_TYPE_FLAG == 0
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        !self.is_directory()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index == ROOT_PARENT
    }
}

/// A parsed manifest: header plus items in file order.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    #[serde(flatten)]
    header: ManifestHeader,
    items: Vec<Item>,
}

impl Manifest {
    /// Open and parse a manifest file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let map = || -> Result<Mmap> {
            let file = File::open(path)?;
            Ok(unsafe { Mmap::map(&file)? })
        };

        let mmap = map().map_err(|e| e.in_file(path))?;
        Self::parse(&mmap).map_err(|e| e.in_file(path))
    }

    /// Parse a manifest from its bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let raw: ManifestHeaderRecord =
            reader.read_struct().map_err(|_| Error::TruncatedHeader {
                needed: MANIFEST_HEADER_SIZE,
                available: data.len(),
            })?;
        let header = ManifestHeader::from(&raw);

        let count = header.item_count as usize;
        let names_base = MANIFEST_HEADER_SIZE as u64 + count as u64 * ITEM_RECORD_SIZE as u64;

        // Item count is untrusted; never reserve more records than the file can hold.
        let mut items = Vec::with_capacity(count.min(data.len() / ITEM_RECORD_SIZE));

        for index in 0..count {
            let record_offset = MANIFEST_HEADER_SIZE + index * ITEM_RECORD_SIZE;
            reader.seek(record_offset);

            let record: ItemRecord = reader.read_struct().map_err(|_| Error::ItemOutOfRange {
                item: index,
                offset: record_offset as u64,
            })?;

            let name_offset = names_base + u64::from(record.name_offset.get());
            let name = read_name(&mut reader, index, name_offset)?;

            items.push(Item::from_record(&record, name));
        }

        let paths = resolve_paths(&items)?;
        for (item, path) in items.iter_mut().zip(paths) {
            item.path = path;
        }

        debug!(
            depot = header.depot_id,
            version = header.depot_version,
            items = items.len(),
            "parsed manifest"
        );

        Ok(Self { header, items })
    }

    /// Get the manifest header.
    #[inline]
    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    /// Get all items in file order.
    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter()
    }

    /// Get the number of items.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an item by its position in the item array.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Iterate over file items.
    pub fn files(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(|item| item.is_file())
    }

    /// Iterate over directory items.
    pub fn directories(&self) -> impl Iterator<Item = &Item> + '_ {
        self.items.iter().filter(|item| item.is_directory())
    }

    /// Check that this manifest describes the requested depot and version.
    pub fn verify_identity(&self, depot_id: u32, depot_version: u32) -> Result<()> {
        if self.header.depot_id != depot_id {
            return Err(Error::IdentityMismatch {
                field: "id",
                expected: depot_id,
                actual: self.header.depot_id,
            });
        }
        if self.header.depot_version != depot_version {
            return Err(Error::IdentityMismatch {
                field: "version",
                expected: depot_version,
                actual: self.header.depot_version,
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Remove characters that are not allowed in Windows file names.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_NAME_CHARS.contains(c))
        .collect()
}

fn read_name(reader: &mut BinaryReader<'_>, item: usize, offset: u64) -> Result<String> {
    let position =
        usize::try_from(offset).map_err(|_| Error::NameOutOfRange { item, offset })?;
    reader.seek(position);

    let raw = reader
        .read_cstring_capped(MAX_NAME_LEN)
        .map_err(|_| Error::NameOutOfRange { item, offset })?;

    if !raw.terminated {
        warn!(item, offset, "item name exceeds {} bytes, truncating", MAX_NAME_LEN);
    }

    let name = String::from_utf8_lossy(raw.bytes);
    if cfg!(windows) {
        Ok(sanitize_name(&name))
    } else {
        Ok(name.into_owned())
    }
}

/// Build the path of every item, in item order.
fn resolve_paths(items: &[Item]) -> Result<Vec<String>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        (0..items.len())
            .into_par_iter()
            .map(|index| resolve_path(items, index))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..items.len())
            .map(|index| resolve_path(items, index))
            .collect()
    }
}

/// Walk parent links from `index` to a root and join the names root-first.
///
/// The walk takes at most `items.len()` parent steps; a longer chain must
/// revisit an item and is reported as a cycle.
fn resolve_path(items: &[Item], index: usize) -> Result<String> {
    let item = &items[index];
    let mut hierarchy = vec![item.name.as_str()];
    let mut parent = item.parent_index;
    let mut steps_left = items.len();

    while parent != ROOT_PARENT {
        if steps_left == 0 {
            return Err(Error::ParentCycle { item: index });
        }
        steps_left -= 1;

        let ancestor = items.get(parent as usize).ok_or(Error::ParentOutOfRange {
            item: index,
            parent,
            count: items.len(),
        })?;
        hierarchy.push(&ancestor.name);
        parent = ancestor.parent_index;
    }

    hierarchy.reverse();

    let mut path = String::with_capacity(hierarchy.iter().map(|n| n.len() + 1).sum());
    for (depth, name) in hierarchy.iter().enumerate() {
        if depth > 0 {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(name);
    }
    Ok(path)
}
