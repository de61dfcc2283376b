//! Loading a depot from its on-disk layout.

use std::path::{Path, PathBuf};
use std::thread::{self, ScopedJoinHandle};

use tracing::{info, warn};

use crate::blob::{ChunkSource, DataBlob};
use crate::extract::Extractor;
use crate::index::Index;
use crate::keys::{KeySelector, KeyTable};
use crate::manifest::Manifest;
use crate::Result;

/// Where depot artifacts live.
///
/// Manifests are `{manifest_dir}/{depot}_{version}.manifest`; index and data
/// files are `{storage_dir}/{depot}.index` and `{storage_dir}/{depot}.data`.
#[derive(Debug, Clone)]
pub struct DepotLayout {
    pub manifest_dir: PathBuf,
    pub storage_dir: PathBuf,
}

impl Default for DepotLayout {
    fn default() -> Self {
        Self::new("manifests", "storages")
    }
}

impl DepotLayout {
    pub fn new(manifest_dir: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_dir: manifest_dir.into(),
            storage_dir: storage_dir.into(),
        }
    }

    pub fn manifest_path(&self, depot_id: u32, depot_version: u32) -> PathBuf {
        self.manifest_dir
            .join(format!("{depot_id}_{depot_version}.manifest"))
    }

    pub fn index_path(&self, depot_id: u32) -> PathBuf {
        self.storage_dir.join(format!("{depot_id}.index"))
    }

    pub fn data_path(&self, depot_id: u32) -> PathBuf {
        self.storage_dir.join(format!("{depot_id}.data"))
    }
}

/// A parsed depot: manifest, index and key table.
#[derive(Debug)]
pub struct Depot {
    manifest: Manifest,
    index: Index,
    keys: KeyTable,
}

impl Depot {
    pub fn new(manifest: Manifest, index: Index, keys: KeyTable) -> Self {
        Self {
            manifest,
            index,
            keys,
        }
    }

    /// Parse the manifest, index and optional key file of a depot version.
    ///
    /// The three files are parsed concurrently. The manifest must declare
    /// the requested depot id and version.
    pub fn load(
        layout: &DepotLayout,
        key_file: Option<&Path>,
        depot_id: u32,
        depot_version: u32,
    ) -> Result<Self> {
        let manifest_path = layout.manifest_path(depot_id, depot_version);
        let index_path = layout.index_path(depot_id);

        let (manifest, index, keys) = thread::scope(|scope| {
            let manifest = scope.spawn(|| Manifest::open(&manifest_path));
            let index = scope.spawn(|| Index::open(&index_path));
            let keys = scope.spawn(|| key_file.map(KeyTable::open).transpose());

            (join(manifest), join(index), join(keys))
        });

        let manifest = manifest?;
        let index = index?;
        let keys = keys?.unwrap_or_default();

        manifest.verify_identity(depot_id, depot_version)?;

        info!(
            depot = depot_id,
            version = depot_version,
            items = manifest.len(),
            entries = index.len(),
            keys = keys.len(),
            "loaded depot"
        );

        Ok(Self::new(manifest, index, keys))
    }

    #[inline]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[inline]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[inline]
    pub fn keys(&self) -> &KeyTable {
        &self.keys
    }

    /// Look up this depot's decryption key.
    ///
    /// A missing key is only logged; it becomes an error once an encrypted
    /// chunk is decoded.
    pub fn key(&self, selector: KeySelector) -> Option<&[u8]> {
        let id = selector.key_id(self.manifest.header());
        let key = self.keys.get(id);
        if key.is_none() {
            warn!(key_id = id, ?selector, "no decryption key for depot");
        }
        key
    }

    /// Map this depot's data file.
    pub fn open_data(&self, layout: &DepotLayout) -> Result<DataBlob> {
        DataBlob::open(layout.data_path(self.manifest.header().depot_id))
    }

    /// Extractor over this depot's manifest and index.
    pub fn extractor<'a, S: ChunkSource + ?Sized>(
        &'a self,
        source: &'a S,
        key: Option<&'a [u8]>,
    ) -> Extractor<'a, S> {
        Extractor::new(&self.manifest, &self.index, source, key)
    }
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::fixture::{encrypt, BlobBuilder, IndexBuilder, ManifestBuilder, KEY_128};
    use crate::format::ROOT_PARENT;
    use crate::Error;

    fn write_depot(root: &Path, manifest_name: &str, depot: u32, version: u32) -> DepotLayout {
        let layout = DepotLayout::new(root.join("manifests"), root.join("storages"));
        fs::create_dir_all(&layout.manifest_dir).unwrap();
        fs::create_dir_all(&layout.storage_dir).unwrap();

        let manifest = ManifestBuilder::new(depot, version)
            .info_count(77)
            .dir("root", ROOT_PARENT)
            .file("secret.bin", 0, 5, 6)
            .build();
        fs::write(layout.manifest_dir.join(manifest_name), manifest).unwrap();

        let mut blob = BlobBuilder::default();
        let chunk = blob.push(&encrypt(&KEY_128, b"secret"));
        fs::write(layout.data_path(depot), &blob.data).unwrap();
        fs::write(
            layout.index_path(depot),
            IndexBuilder::new().entry(5, 3, &[chunk]).build(),
        )
        .unwrap();

        let keys = format!(r#"{{"keys": {{"{depot}": "{}"}}}}"#, hex::encode(KEY_128));
        fs::write(root.join("keys.json"), keys).unwrap();

        layout
    }

    #[test]
    fn test_layout_paths() {
        let layout = DepotLayout::default();
        assert_eq!(
            layout.manifest_path(3, 9),
            Path::new("manifests").join("3_9.manifest")
        );
        assert_eq!(layout.index_path(3), Path::new("storages").join("3.index"));
        assert_eq!(layout.data_path(3), Path::new("storages").join("3.data"));
    }

    #[test]
    fn test_load_and_extract() {
        let dir = tempfile::tempdir().unwrap();
        let layout = write_depot(dir.path(), "12_4.manifest", 12, 4);
        let key_file = dir.path().join("keys.json");

        let depot = Depot::load(&layout, Some(&key_file), 12, 4).unwrap();
        assert_eq!(depot.manifest().len(), 2);
        assert_eq!(depot.index().len(), 1);
        assert_eq!(depot.keys().len(), 1);
        assert!(depot.key(KeySelector::InfoCount).is_none());

        let data = depot.open_data(&layout).unwrap();
        let out = dir.path().join("out");
        let report = depot
            .extractor(&data, depot.key(KeySelector::DepotId))
            .run(&out)
            .unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(fs::read(out.join("root/secret.bin")).unwrap(), b"secret");
    }

    #[test]
    fn test_load_without_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = write_depot(dir.path(), "12_4.manifest", 12, 4);

        let depot = Depot::load(&layout, None, 12, 4).unwrap();
        assert!(depot.keys().is_empty());
        assert!(depot.key(KeySelector::DepotId).is_none());
    }

    #[test]
    fn test_identity_mismatch_before_output() {
        let dir = tempfile::tempdir().unwrap();
        // Manifest declares version 4 but is stored under version 5.
        let layout = write_depot(dir.path(), "12_5.manifest", 12, 4);

        let err = Depot::load(&layout, None, 12, 5).unwrap_err();
        assert!(matches!(
            err,
            Error::IdentityMismatch {
                field: "version",
                expected: 5,
                actual: 4
            }
        ));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_index_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let layout = write_depot(dir.path(), "12_4.manifest", 12, 4);
        fs::remove_file(layout.index_path(12)).unwrap();

        match Depot::load(&layout, None, 12, 4) {
            Err(Error::InFile { path, .. }) => assert_eq!(path, layout.index_path(12)),
            other => panic!("expected file error, got {other:?}"),
        }
    }
}
