//! Symbols and symbol groups
//!
//! A [`Symbol`] is a named span of bytes attributed to a section, an object
//! file and a source file. Native symbols come from the linker, dex symbols
//! from apkanalyzer and `.other` symbols from APK entries.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// `.bss` (zero-initialized data, not stored in the file)
pub const SECTION_BSS: &str = ".bss";
/// `.data`
pub const SECTION_DATA: &str = ".data";
/// `.data.rel.ro` (relocated read-only data)
pub const SECTION_DATA_REL_RO: &str = ".data.rel.ro";
/// `.rodata`
pub const SECTION_RODATA: &str = ".rodata";
/// `.text`
pub const SECTION_TEXT: &str = ".text";
/// Dex non-method entries (classes, fields, packages)
pub const SECTION_DEX: &str = ".dex";
/// Dex methods
pub const SECTION_DEX_METHOD: &str = ".dex.method";
/// Everything in an APK that is not code or a pak
pub const SECTION_OTHER: &str = ".other";
/// Untranslated pak resources
pub const SECTION_PAK_NONTRANSLATED: &str = ".pak.nontranslated";
/// Translated pak resources
pub const SECTION_PAK_TRANSLATIONS: &str = ".pak.translations";

/// Sections that hold native code or data
pub const NATIVE_SECTIONS: [&str; 5] = [
    SECTION_BSS,
    SECTION_DATA,
    SECTION_DATA_REL_RO,
    SECTION_RODATA,
    SECTION_TEXT,
];

/// Object path prefix for symbols with no build-time object
pub const APK_PREFIX_PATH: &str = "$APK";

/// Name given to string literals merged by the linker
pub const STRING_LITERAL_NAME: &str = "string literal";

/// Maps a section name to its one-letter code.
///
/// Unknown sections map to `'?'`.
///
/// # Examples
///
/// ```
/// use supersize::models::symbol::section_code;
///
/// assert_eq!(section_code(".text"), 't');
/// assert_eq!(section_code(".dex.method"), 'm');
/// assert_eq!(section_code(".note"), '?');
/// ```
pub fn section_code(section_name: &str) -> char {
    match section_name {
        SECTION_BSS => 'b',
        SECTION_DATA => 'd',
        SECTION_DATA_REL_RO => 'R',
        SECTION_RODATA => 'r',
        SECTION_TEXT => 't',
        SECTION_DEX => 'x',
        SECTION_DEX_METHOD => 'm',
        SECTION_OTHER => 'o',
        SECTION_PAK_NONTRANSLATED => 'P',
        SECTION_PAK_TRANSLATIONS => 'p',
        _ => '?',
    }
}

bitflags! {
    /// Properties recorded while normalizing symbol names
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SymbolFlags: u32 {
        /// Placed in `.text.startup`
        const STARTUP = 1;
        /// Placed in `.text.unlikely`
        const UNLIKELY = 1 << 1;
        /// Placed in `.data.rel`
        const REL = 1 << 2;
        /// Placed in `.data.rel.local`
        const REL_LOCAL = 1 << 3;
        /// Placed in `.text.hot`
        const HOT = 1 << 4;
        /// Compiler-generated clone (`[clone .part.0]` and friends)
        const CLONE = 1 << 5;
        /// Source path came from generated code
        const GENERATED_SOURCE = 1 << 6;
    }
}

/// A single sized entity in a binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Section the symbol lives in (e.g. `.text`)
    pub section_name: String,
    /// Full (demangled) name
    pub full_name: String,
    /// Size in bytes, padding included
    pub size: i64,
    /// Bytes between the previous symbol's end and this symbol's start
    #[serde(default)]
    pub padding: i64,
    /// Virtual address, 0 when not applicable
    #[serde(default)]
    pub address: u64,
    /// Build output that contributed the symbol
    #[serde(default)]
    pub object_path: String,
    /// Source file the object was compiled from
    #[serde(default)]
    pub source_path: String,
    /// Whether `source_path` is a generated file
    #[serde(default)]
    pub generated_source: bool,
    /// Flags recorded during name normalization
    #[serde(default = "SymbolFlags::empty", skip_serializing_if = "SymbolFlags::is_empty")]
    pub flags: SymbolFlags,
}

impl Symbol {
    /// Create a symbol with no padding, address or paths
    pub fn new(section_name: impl Into<String>, full_name: impl Into<String>, size: i64) -> Self {
        Self {
            section_name: section_name.into(),
            full_name: full_name.into(),
            size,
            padding: 0,
            address: 0,
            object_path: String::new(),
            source_path: String::new(),
            generated_source: false,
            flags: SymbolFlags::empty(),
        }
    }

    /// Set the object path
    pub fn with_object_path(mut self, object_path: impl Into<String>) -> Self {
        self.object_path = object_path.into();
        self
    }

    /// Set the source path
    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = source_path.into();
        self
    }

    /// Set the address
    pub fn with_address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }

    /// Set the padding, which is added to the size
    pub fn with_padding(mut self, padding: i64) -> Self {
        self.size += padding - self.padding;
        self.padding = padding;
        self
    }

    /// Size of the symbol itself, excluding alignment padding
    pub fn size_without_padding(&self) -> i64 {
        self.size - self.padding
    }

    /// First address past the symbol
    pub fn end_address(&self) -> u64 {
        self.address
            .saturating_add(self.size_without_padding().max(0) as u64)
    }

    /// One-letter section code
    pub fn section(&self) -> char {
        section_code(&self.section_name)
    }

    /// Whether the symbol lives in an ELF section
    pub fn is_native(&self) -> bool {
        NATIVE_SECTIONS.contains(&self.section_name.as_str())
    }

    /// Whether the symbol is a dex entry
    pub fn is_dex(&self) -> bool {
        self.section_name == SECTION_DEX || self.section_name == SECTION_DEX_METHOD
    }

    /// Whether the symbol is a pak entry
    pub fn is_pak(&self) -> bool {
        self.section_name == SECTION_PAK_NONTRANSLATED
            || self.section_name == SECTION_PAK_TRANSLATIONS
    }

    /// Whether the symbol is `.bss`
    pub fn is_bss(&self) -> bool {
        self.section_name == SECTION_BSS
    }

    /// Whether the symbol stands for container overhead rather than content
    pub fn is_overhead(&self) -> bool {
        self.full_name.starts_with("Overhead: ")
    }

    /// Whether the symbol is padding only (no bytes of its own)
    pub fn is_padding_only(&self) -> bool {
        self.size_without_padding() == 0 && self.padding != 0
    }
}

/// An ordered collection of symbols
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolGroup {
    symbols: Vec<Symbol>,
}

impl SymbolGroup {
    /// Wrap a list of symbols, keeping their order
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    /// Number of symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the group holds no symbols
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// Iterate mutably in order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Symbol> {
        self.symbols.iter_mut()
    }

    /// Borrow the symbols as a slice
    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Append a symbol
    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    /// Append every symbol of `other`
    pub fn extend(&mut self, other: impl IntoIterator<Item = Symbol>) {
        self.symbols.extend(other);
    }

    /// Sum of sizes, padding included
    pub fn total_size(&self) -> i64 {
        self.symbols.iter().map(|s| s.size).sum()
    }

    /// Sum of padding
    pub fn total_padding(&self) -> i64 {
        self.symbols.iter().map(|s| s.padding).sum()
    }

    /// Symbols of one section, in order
    pub fn where_section(&self, section_name: &str) -> SymbolGroup {
        self.symbols
            .iter()
            .filter(|s| s.section_name == section_name)
            .cloned()
            .collect()
    }

    /// Symbols sorted by size, largest first (ties keep their order)
    pub fn sorted_by_size(&self) -> SymbolGroup {
        let mut symbols = self.symbols.clone();
        symbols.sort_by(|a, b| b.size.abs().cmp(&a.size.abs()));
        SymbolGroup::new(symbols)
    }

    /// Unwrap into the underlying list
    pub fn into_vec(self) -> Vec<Symbol> {
        self.symbols
    }
}

impl From<Vec<Symbol>> for SymbolGroup {
    fn from(symbols: Vec<Symbol>) -> Self {
        Self::new(symbols)
    }
}

impl FromIterator<Symbol> for SymbolGroup {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for SymbolGroup {
    type Item = Symbol;
    type IntoIter = std::vec::IntoIter<Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.into_iter()
    }
}

impl<'a> IntoIterator for &'a SymbolGroup {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}
