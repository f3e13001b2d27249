//! Dex header parsing and method counting

use crate::apk::{self, ApkError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Size of the fixed dex header
pub const HEADER_SIZE: usize = 0x70;

const DEX_MAGIC_PREFIX: &[u8; 4] = b"dex\n";

/// Errors that can occur while reading dex files
#[derive(Error, Debug)]
pub enum DexError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data does not start with `dex\n`
    #[error("{0}: not a dex file")]
    BadMagic(String),

    /// Fewer bytes than a dex header
    #[error("{name}: truncated dex header ({len} bytes)")]
    Truncated {
        /// File or entry name
        name: String,
        /// Bytes available
        len: usize,
    },

    /// The container could not be read
    #[error(transparent)]
    Apk(#[from] ApkError),
}

/// Counts from a dex header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexHeader {
    /// File size recorded in the header
    pub file_size: u32,
    /// Entries in `string_ids`
    pub string_ids: u32,
    /// Entries in `type_ids`
    pub type_ids: u32,
    /// Entries in `proto_ids`
    pub proto_ids: u32,
    /// Entries in `field_ids`
    pub field_ids: u32,
    /// Entries in `method_ids`
    pub method_ids: u32,
    /// Entries in `class_defs`
    pub class_defs: u32,
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

impl DexHeader {
    /// Parse the header at the start of `bytes`. `name` is used in errors.
    pub fn parse(name: &str, bytes: &[u8]) -> Result<Self, DexError> {
        if !bytes.starts_with(DEX_MAGIC_PREFIX) {
            return Err(DexError::BadMagic(name.to_string()));
        }
        if bytes.len() < HEADER_SIZE {
            return Err(DexError::Truncated {
                name: name.to_string(),
                len: bytes.len(),
            });
        }
        Ok(Self {
            file_size: read_u32(bytes, 32),
            string_ids: read_u32(bytes, 56),
            type_ids: read_u32(bytes, 64),
            proto_ids: read_u32(bytes, 72),
            field_ids: read_u32(bytes, 80),
            method_ids: read_u32(bytes, 88),
            class_defs: read_u32(bytes, 96),
        })
    }

    /// Bytes taken by the id tables
    pub fn id_table_size(&self) -> u64 {
        u64::from(self.string_ids) * 4
            + u64::from(self.type_ids) * 4
            + u64::from(self.proto_ids) * 12
            + u64::from(self.field_ids) * 8
            + u64::from(self.method_ids) * 8
            + u64::from(self.class_defs) * 32
    }

    /// Estimated runtime dex cache size: one 4-byte slot per string, type,
    /// method and field id
    pub fn dex_cache_size(&self) -> u64 {
        4 * (u64::from(self.string_ids)
            + u64::from(self.type_ids)
            + u64::from(self.method_ids)
            + u64::from(self.field_ids))
    }

    fn accumulate(&mut self, other: &DexHeader) {
        self.file_size = self.file_size.saturating_add(other.file_size);
        self.string_ids = self.string_ids.saturating_add(other.string_ids);
        self.type_ids = self.type_ids.saturating_add(other.type_ids);
        self.proto_ids = self.proto_ids.saturating_add(other.proto_ids);
        self.field_ids = self.field_ids.saturating_add(other.field_ids);
        self.method_ids = self.method_ids.saturating_add(other.method_ids);
        self.class_defs = self.class_defs.saturating_add(other.class_defs);
    }
}

/// Counts for one dex file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexFileCounts {
    /// File or entry name
    pub name: String,
    /// Header counts
    pub header: DexHeader,
}

/// Counts for every dex file of an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCountReport {
    /// Per-file counts
    pub files: Vec<DexFileCounts>,
    /// Sum over all files
    pub total: DexHeader,
    /// Estimated dex cache size in bytes
    pub dex_cache_size: u64,
    /// Bytes used by id tables
    pub id_table_size: u64,
}

impl MethodCountReport {
    fn from_files(files: Vec<DexFileCounts>) -> Self {
        let mut total = DexHeader::default();
        for file in &files {
            total.accumulate(&file.header);
        }
        Self {
            dex_cache_size: total.dex_cache_size(),
            id_table_size: total.id_table_size(),
            files,
            total,
        }
    }
}

/// Count methods (and the other id tables) of a `.dex` file or of every
/// `.dex` entry in a zip container (`.apk`, `.jar`, `.aab`, `.zip`).
pub fn count_methods(path: &Path) -> Result<MethodCountReport, DexError> {
    let name = path.display().to_string();
    let is_dex = path.extension().is_some_and(|ext| ext == "dex");

    let files = if is_dex {
        let bytes = std::fs::read(path)?;
        vec![DexFileCounts {
            header: DexHeader::parse(&name, &bytes)?,
            name,
        }]
    } else {
        apk::read_entries(path, |n| n.ends_with(".dex"), Some(HEADER_SIZE as u64))?
            .into_iter()
            .map(|(entry, bytes)| {
                Ok(DexFileCounts {
                    header: DexHeader::parse(&entry, &bytes)?,
                    name: entry,
                })
            })
            .collect::<Result<Vec<_>, DexError>>()?
    };

    Ok(MethodCountReport::from_files(files))
}
