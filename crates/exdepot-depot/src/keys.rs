//! Depot decryption keys.
//!
//! Keys are loaded from a JSON file of the form
//! `{"keys": {"<decimal depot id>": "<hex key>"}}`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

use crate::manifest::ManifestHeader;
use crate::{Error, Result};

#[derive(Deserialize)]
struct KeyFile {
    keys: HashMap<String, String>,
}

/// Mapping from lookup id to raw AES key bytes.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: FxHashMap<u32, Vec<u8>>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a key file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from(e).in_file(path))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| e.in_file(path))
    }

    /// Parse a key file from a JSON stream.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let file: KeyFile = serde_json::from_reader(reader)?;
        Self::from_key_file(file)
    }

    /// Parse a key file from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: KeyFile = serde_json::from_str(json)?;
        Self::from_key_file(file)
    }

    fn from_key_file(file: KeyFile) -> Result<Self> {
        let mut keys = FxHashMap::default();

        for (id, key) in file.keys {
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| Error::KeyFile(format!("invalid depot id {id:?}")))?;
            let key = hex::decode(key.trim())
                .map_err(|e| Error::KeyFile(format!("invalid key for depot {id}: {e}")))?;
            keys.insert(id, key);
        }

        debug!(keys = keys.len(), "loaded key table");

        Ok(Self { keys })
    }

    pub fn insert(&mut self, id: u32, key: Vec<u8>) -> Option<Vec<u8>> {
        self.keys.insert(id, key)
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&[u8]> {
        self.keys.get(&id).map(Vec::as_slice)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Manifest header field used to look up a depot's key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeySelector {
    /// The depot id (`depot_id`).
    #[default]
    DepotId,
    /// The `info_count` field, used by some depot versions.
    InfoCount,
}

impl KeySelector {
    /// Key table id for a manifest.
    pub fn key_id(self, header: &ManifestHeader) -> u32 {
        match self {
            Self::DepotId => header.depot_id,
            Self::InfoCount => header.info_count,
        }
    }
}
