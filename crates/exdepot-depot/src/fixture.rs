//! Synthetic depot artifacts for tests.

use std::io::Write;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use cipher::{AsyncStreamCipher, KeyIvInit};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::format::{FILE_TYPE_FLAG, ROOT_PARENT};

pub const KEY_128: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
];

struct FixtureItem {
    name: Vec<u8>,
    item_type: u32,
    parent: u32,
    id: u32,
    size: u32,
}

/// Builds manifest bytes item by item.
pub struct ManifestBuilder {
    depot_id: u32,
    depot_version: u32,
    info_count: u32,
    items: Vec<FixtureItem>,
    name_offsets: Vec<(usize, u32)>,
}

impl ManifestBuilder {
    pub fn new(depot_id: u32, depot_version: u32) -> Self {
        Self {
            depot_id,
            depot_version,
            info_count: 0,
            items: Vec::new(),
            name_offsets: Vec::new(),
        }
    }

    pub fn info_count(mut self, info_count: u32) -> Self {
        self.info_count = info_count;
        self
    }

    pub fn dir(self, name: &str, parent: u32) -> Self {
        self.raw_item(name.as_bytes(), 0, parent, 0)
    }

    pub fn file(mut self, name: &str, parent: u32, id: u32, size: u32) -> Self {
        self.items.push(FixtureItem {
            name: name.as_bytes().to_vec(),
            item_type: FILE_TYPE_FLAG,
            parent,
            id,
            size,
        });
        self
    }

    pub fn raw_item(mut self, name: &[u8], item_type: u32, parent: u32, id: u32) -> Self {
        self.items.push(FixtureItem {
            name: name.to_vec(),
            item_type,
            parent,
            id,
            size: 0,
        });
        self
    }

    pub fn name_offset_override(mut self, item: usize, offset: u32) -> Self {
        self.name_offsets.push((item, offset));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let files = self.items.iter().filter(|i| i.item_type & FILE_TYPE_FLAG != 0).count();
        let header = [
            0,
            self.depot_id,
            self.depot_version,
            self.items.len() as u32,
            files as u32,
            0,
            0,
            0,
            self.info_count,
            0,
            0,
            0,
            0,
            0,
        ];
        for value in header {
            out.write_u32::<LittleEndian>(value).unwrap();
        }

        let mut names = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            let offset = self
                .name_offsets
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, o)| *o)
                .unwrap_or(names.len() as u32);
            names.extend_from_slice(&item.name);
            names.push(0);

            for value in [
                offset,
                item.size,
                item.id,
                item.item_type,
                item.parent,
                ROOT_PARENT,
                ROOT_PARENT,
            ] {
                out.write_u32::<LittleEndian>(value).unwrap();
            }
        }

        out.extend_from_slice(&names);
        out
    }
}

/// Builds index bytes record by record.
#[derive(Default)]
pub struct IndexBuilder {
    out: Vec<u8>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, id: u64, mode: u64, chunks: &[(u64, u64)]) -> Self {
        self.out.write_u64::<BigEndian>(id).unwrap();
        self.out.write_u64::<BigEndian>(chunks.len() as u64 * 16).unwrap();
        self.out.write_u64::<BigEndian>(mode).unwrap();
        for (offset, length) in chunks {
            self.out.write_u64::<BigEndian>(*offset).unwrap();
            self.out.write_u64::<BigEndian>(*length).unwrap();
        }
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.out
    }
}

/// Appends chunk payloads to a data blob, returning `(offset, length)`.
#[derive(Default)]
pub struct BlobBuilder {
    pub data: Vec<u8>,
}

impl BlobBuilder {
    pub fn push(&mut self, bytes: &[u8]) -> (u64, u64) {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(bytes);
        (offset, bytes.len() as u64)
    }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn encrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let iv = [0u8; 16];
    let mut buf = data.to_vec();
    match key.len() {
        16 => cfb_mode::Encryptor::<aes::Aes128>::new_from_slices(key, &iv)
            .unwrap()
            .encrypt(&mut buf),
        24 => cfb_mode::Encryptor::<aes::Aes192>::new_from_slices(key, &iv)
            .unwrap()
            .encrypt(&mut buf),
        32 => cfb_mode::Encryptor::<aes::Aes256>::new_from_slices(key, &iv)
            .unwrap()
            .encrypt(&mut buf),
        other => panic!("unsupported key length {other}"),
    }
    buf
}

/// Size header (ignored by the decoder), then the encrypted zlib stream.
pub fn encrypt_compressed(key: &[u8], data: &[u8]) -> Vec<u8> {
    let compressed = zlib(data);
    let mut chunk = Vec::new();
    chunk.write_u32::<LittleEndian>(compressed.len() as u32).unwrap();
    chunk.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    chunk.extend_from_slice(&encrypt(key, &compressed));
    chunk
}
