//! Snapshot containers

use super::delta::DeltaSymbolGroup;
use super::symbol::{SymbolGroup, SECTION_BSS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Facts about the build a snapshot was taken from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// `HEAD` of the checkout that produced the build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_revision: Option<String>,
    /// `key=value` lines of `args.gn`, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gn_args: Vec<String>,
    /// APK path relative to the output directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk_file_name: Option<String>,
    /// APK size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apk_size: Option<u64>,
    /// ELF path relative to the output directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elf_file_name: Option<String>,
    /// ELF modification time, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elf_mtime: Option<u64>,
    /// Symbol dump the native symbols were read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols_file_name: Option<String>,
}

/// Everything known about one build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeInfo {
    /// Section name to total size in bytes
    pub section_sizes: BTreeMap<String, i64>,
    /// Symbols, sorted by section and address
    pub raw_symbols: SymbolGroup,
    /// Build facts
    #[serde(default)]
    pub metadata: Metadata,
}

impl SizeInfo {
    /// Create a snapshot
    pub fn new(
        section_sizes: BTreeMap<String, i64>,
        raw_symbols: SymbolGroup,
        metadata: Metadata,
    ) -> Self {
        Self {
            section_sizes,
            raw_symbols,
            metadata,
        }
    }

    /// Bytes on disk: every section except `.bss`
    pub fn file_size(&self) -> i64 {
        self.section_sizes
            .iter()
            .filter(|(name, _)| name.as_str() != SECTION_BSS)
            .map(|(_, size)| *size)
            .sum()
    }
}

/// Result of diffing two [`SizeInfo`]s
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaSizeInfo {
    /// Section name to size change (after - before)
    pub section_sizes: BTreeMap<String, i64>,
    /// Paired symbols
    pub symbols: DeltaSymbolGroup,
    /// Metadata of the before snapshot
    pub before_metadata: Metadata,
    /// Metadata of the after snapshot
    pub after_metadata: Metadata,
}

impl DeltaSizeInfo {
    /// Change in on-disk bytes (every section except `.bss`)
    pub fn file_size_delta(&self) -> i64 {
        self.section_sizes
            .iter()
            .filter(|(name, _)| name.as_str() != SECTION_BSS)
            .map(|(_, size)| *size)
            .sum()
    }
}
