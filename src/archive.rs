//! Snapshot creation
//!
//! [`Archiver`] combines the available build outputs into a [`SizeInfo`]:
//!
//! - native symbols from a symbol dump, with object paths resolved through
//!   the ninja build graph and thin archives
//! - dex symbols from apkanalyzer
//! - every other APK entry as a `.other` symbol
//! - container overhead for the ELF and the APK
//!
//! Mismatches in the inputs are logged; only structurally broken inputs are
//! errors.

use crate::apk::{self, ApkEntry, ApkError};
use crate::apkanalyzer::{ApkAnalyzer, ApkAnalyzerError};
use crate::ar::{self, ArError};
use crate::config::{ConfigFile, Knobs};
use crate::git::GitRepository;
use crate::infra::{CommandExecutor, RealCommandExecutor};
use crate::models::symbol::{
    APK_PREFIX_PATH, SECTION_BSS, SECTION_DEX, SECTION_OTHER, STRING_LITERAL_NAME,
};
use crate::models::{Metadata, SizeInfo, Symbol, SymbolFlags, SymbolGroup};
use crate::ninja::{self, NinjaError, SourceMapper};
use crate::paths;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Name of the symbol holding ELF bytes outside any section
pub const ELF_OVERHEAD_NAME: &str = "Overhead: ELF file";

/// Name of the symbol holding zip headers and directory bytes
pub const APK_OVERHEAD_NAME: &str = "Overhead: APK file";

/// Errors that can occur while creating a snapshot
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Nothing to measure
    #[error("At least one of an APK, an ELF file or a symbols file is required")]
    NoInputs,

    /// An ELF can only be attributed through a symbol dump
    #[error("An ELF file requires a symbols file")]
    ElfWithoutSymbols,

    /// Reading an input failed
    #[error("Failed to read {}", path.display())]
    Io {
        /// Input path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The symbol dump is not valid JSON of the expected shape
    #[error("Invalid symbols file {}", path.display())]
    SymbolsFile {
        /// Dump path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// No ninja statement links the ELF
    #[error("Failed to find link command in ninja files for {0}")]
    MissingLinkCommand(String),

    /// Section sizes add up to more than the ELF file
    #[error("Negative ELF overhead: {0} bytes")]
    NegativeElfOverhead(i64),

    /// Entry sizes add up to more than the APK file
    #[error("Negative APK overhead: {0} bytes")]
    NegativeApkOverhead(i64),

    /// Ninja parsing failed
    #[error(transparent)]
    Ninja(#[from] NinjaError),

    /// Archive parsing failed
    #[error(transparent)]
    Ar(#[from] ArError),

    /// Dex attribution failed
    #[error(transparent)]
    ApkAnalyzer(#[from] ApkAnalyzerError),

    /// The APK could not be read
    #[error(transparent)]
    Apk(#[from] ApkError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Inputs of one snapshot
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// APK to measure
    pub apk_path: Option<PathBuf>,
    /// Unstripped ELF the symbol dump describes
    pub elf_path: Option<PathBuf>,
    /// JSON symbol dump (`{"section_sizes": {...}, "symbols": [...]}`)
    pub symbols_path: Option<PathBuf>,
    /// Build output directory, for source paths and metadata
    pub output_directory: Option<PathBuf>,
}

#[derive(Deserialize)]
struct SymbolsDump {
    #[serde(default)]
    section_sizes: BTreeMap<String, i64>,
    #[serde(default)]
    symbols: Vec<Symbol>,
}

/// Read a symbol dump
pub fn load_symbols_dump(path: &Path) -> Result<(BTreeMap<String, i64>, Vec<Symbol>), ArchiveError> {
    let contents = std::fs::read(path).map_err(io_error(path))?;
    let dump: SymbolsDump =
        serde_json::from_slice(&contents).map_err(|source| ArchiveError::SymbolsFile {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        "Read {} symbols in {} sections from {}",
        dump.symbols.len(),
        dump.section_sizes.len(),
        path.display()
    );
    Ok((dump.section_sizes, dump.symbols))
}

struct OutputDirectoryContext {
    source_mapper: SourceMapper,
    known_inputs: Option<BTreeSet<String>>,
    thin_archives: BTreeSet<String>,
}

fn load_output_directory_context(
    output_directory: &Path,
    elf_path: Option<&Path>,
    knobs: &Knobs,
) -> Result<OutputDirectoryContext, ArchiveError> {
    info!("Parsing ninja files");
    let (source_mapper, elf_inputs) = ninja::parse(output_directory, elf_path)?;
    let source_mapper = source_mapper.with_max_unmatched_to_log(knobs.max_unmatched_paths_to_log);
    debug!("Parsed {} .ninja files", source_mapper.parsed_file_count());

    if let (Some(elf_path), None) = (elf_path, &elf_inputs) {
        return Err(ArchiveError::MissingLinkCommand(
            elf_path.display().to_string(),
        ));
    }

    match elf_inputs {
        Some(inputs) => {
            let (expanded, thin_archives) = ar::expand_thin_archives(&inputs, output_directory)?;
            let mut known_inputs: BTreeSet<String> = expanded.into_iter().collect();
            known_inputs.extend(inputs);
            Ok(OutputDirectoryContext {
                source_mapper,
                known_inputs: Some(known_inputs),
                thin_archives,
            })
        }
        None => {
            let thin_archives = source_mapper
                .iter_archive_paths()
                .filter(|p| ar::is_thin_archive(&output_directory.join(p)).unwrap_or(false))
                .map(str::to_string)
                .collect();
            Ok(OutputDirectoryContext {
                source_mapper,
                known_inputs: None,
                thin_archives,
            })
        }
    }
}

fn split_archive_member(path: &str) -> Option<(&str, &str)> {
    if !path.ends_with(')') {
        return None;
    }
    let start = path.rfind('(')?;
    Some((&path[..start], &path[start + 1..path.len() - 1]))
}

/// Rewrite `foo.a(bar.o)` object paths of thin archives to the external
/// `.o` path
pub fn resolve_thin_archive_paths(symbols: &mut [Symbol], thin_archives: &BTreeSet<String>) {
    for symbol in symbols {
        if let Some((archive, member)) = split_archive_member(&symbol.object_path) {
            if thin_archives.contains(archive) {
                symbol.object_path = ar::create_thin_object_path(archive, member);
            }
        }
    }
}

/// Object paths (archives for archive members) the link statement does not
/// list, typically `.a` files pulled in through `-l` flags
pub fn discover_missed_object_paths(
    symbols: &[Symbol],
    known_inputs: &BTreeSet<String>,
) -> BTreeSet<String> {
    symbols
        .iter()
        .map(|s| match split_archive_member(&s.object_path) {
            Some((archive, _)) => archive,
            None => s.object_path.as_str(),
        })
        .filter(|path| !path.is_empty() && !known_inputs.contains(*path))
        .map(str::to_string)
        .collect()
}

/// Remove prefixes the linker adds to names and record them as flags
///
/// # Examples
///
/// ```
/// use supersize::archive::strip_linker_added_prefixes;
/// use supersize::models::{Symbol, SymbolFlags};
///
/// let mut symbols = vec![Symbol::new(".text", "startup._GLOBAL__sub_I_foo.cc", 8)];
/// strip_linker_added_prefixes(&mut symbols);
/// assert_eq!(symbols[0].full_name, "_GLOBAL__sub_I_foo.cc");
/// assert!(symbols[0].flags.contains(SymbolFlags::STARTUP));
/// ```
pub fn strip_linker_added_prefixes(symbols: &mut [Symbol]) {
    const PREFIXES: [(&str, SymbolFlags); 5] = [
        ("startup.", SymbolFlags::STARTUP),
        ("unlikely.", SymbolFlags::UNLIKELY),
        ("rel.local.", SymbolFlags::REL_LOCAL),
        ("rel.", SymbolFlags::REL),
        ("hot.", SymbolFlags::HOT),
    ];

    for symbol in symbols {
        if let Some((prefix, flag)) = PREFIXES
            .iter()
            .find(|(prefix, _)| symbol.full_name.starts_with(prefix))
        {
            symbol.flags |= *flag;
            symbol.full_name.replace_range(..prefix.len(), "");
        } else if symbol.full_name.starts_with(".L.str") {
            symbol.full_name = STRING_LITERAL_NAME.to_string();
        }
        if symbol.full_name.contains(" [clone ") {
            symbol.flags |= SymbolFlags::CLONE;
        }
    }
}

/// Drop `obj/` and `../../` prefixes and turn `foo.a(bar.o)` into
/// `foo.a/bar.o`
///
/// # Examples
///
/// ```
/// use supersize::archive::normalize_object_path;
///
/// assert_eq!(normalize_object_path("obj/base/libbase.a(file.o)"), "base/libbase.a/file.o");
/// assert_eq!(normalize_object_path("../../third_party/lib.o"), "third_party/lib.o");
/// ```
pub fn normalize_object_path(path: &str) -> String {
    let path = path
        .strip_prefix("obj/")
        .or_else(|| path.strip_prefix("../../"))
        .unwrap_or(path);
    match split_archive_member(path) {
        Some((archive, member)) => paths::join(archive, member),
        None => path.to_string(),
    }
}

/// Returns `(is_generated, normalized_path)` for a source path
pub fn normalize_source_path(path: &str) -> (bool, String) {
    if let Some(rest) = path.strip_prefix("gen/") {
        return (true, rest.to_string());
    }
    if let Some(rest) = path.strip_prefix("../../") {
        return (false, rest.to_string());
    }
    (true, path.to_string())
}

fn set_source_path(symbol: &mut Symbol, source_path: &str) {
    let (generated, normalized) = normalize_source_path(source_path);
    symbol.generated_source = generated;
    if generated {
        symbol.flags |= SymbolFlags::GENERATED_SOURCE;
    }
    symbol.source_path = normalized;
}

/// Fill in source paths from the build graph and normalize object paths
pub fn extract_source_paths_and_normalize_object_paths(
    symbols: &mut [Symbol],
    mut source_mapper: Option<&mut SourceMapper>,
) {
    if source_mapper.is_some() {
        info!("Looking up source paths from ninja files");
    }
    for symbol in symbols.iter_mut() {
        if symbol.is_dex() || symbol.section_name == SECTION_OTHER {
            if !symbol.source_path.is_empty() {
                let source_path = std::mem::take(&mut symbol.source_path);
                set_source_path(symbol, &source_path);
            }
        } else if !symbol.object_path.is_empty() {
            if let Some(mapper) = source_mapper.as_mut() {
                let object_path = &symbol.object_path;
                // Prebuilt objects have no ninja rule.
                if !object_path.starts_with('/') && !object_path.starts_with("..") {
                    if let Some(source_path) = mapper.find_source_for_path(object_path) {
                        set_source_path(symbol, &source_path);
                    }
                }
            }
            symbol.object_path = normalize_object_path(&symbol.object_path);
        }
    }

    if let Some(mapper) = source_mapper {
        let unmatched = mapper.unmatched_paths_count();
        if unmatched > 0 {
            warn!(
                "{} object paths had no source file; the .ninja files may be newer than the symbols",
                unmatched
            );
        }
    }
}

/// Bytes of an ELF file not covered by its sections (`.bss` excluded)
pub fn calculate_elf_overhead(
    section_sizes: &BTreeMap<String, i64>,
    elf_size: u64,
) -> Result<i64, ArchiveError> {
    let sections_total: i64 = section_sizes
        .iter()
        .filter(|(name, _)| name.as_str() != SECTION_BSS)
        .map(|(_, size)| size)
        .sum();
    let overhead = elf_size as i64 - sections_total;
    if overhead < 0 {
        return Err(ArchiveError::NegativeElfOverhead(overhead));
    }
    Ok(overhead)
}

fn dollar_underscore_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$(.*?)__\d+").expect("resource rename regex is valid"))
}

fn version_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-v\d+/").expect("resource version regex is valid"))
}

/// Maps APK resource entries back to the files they were built from
#[derive(Debug, Default)]
pub struct ResourceSourceMapper {
    res_info: HashMap<String, String>,
}

impl ResourceSourceMapper {
    /// Parse a `.res.info` file: `dest,source` lines, where a `Rename:dest`
    /// line points at another dest
    pub fn parse(contents: &str) -> Self {
        let mut direct: HashMap<String, String> = HashMap::new();
        let mut renames: HashMap<String, String> = HashMap::new();
        for line in contents.lines() {
            let Some((dest, source)) = line.trim().split_once(',') else {
                continue;
            };
            match dest.strip_prefix("Rename:") {
                Some(renamed) => renames.insert(renamed.to_string(), source.to_string()),
                None => direct.insert(dest.to_string(), source.to_string()),
            };
        }
        for (dest, renamed_dest) in &renames {
            // One extra level of indirection for renamed renames.
            let renamed_dest = renames.get(renamed_dest).unwrap_or(renamed_dest);
            if let Some(source) = direct.get(renamed_dest).cloned() {
                direct.insert(dest.clone(), source);
            }
        }

        Self {
            res_info: direct
                .into_iter()
                .map(|(dest, source)| (paths::join("res", &dest), source))
                .collect(),
        }
    }

    /// Load `size-info/<apk name>.res.info`. A missing file yields an empty
    /// mapper.
    pub fn load(output_directory: &Path, apk_path: &Path) -> Self {
        let apk_name = apk_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let info_path = output_directory
            .join("size-info")
            .join(format!("{}.res.info", apk_name));
        match std::fs::read_to_string(&info_path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) => {
                warn!(
                    "Resource source paths unavailable, could not read {}: {}",
                    info_path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Source file of an APK entry
    pub fn find_source_for_path(&self, path: &str) -> Option<&str> {
        let path = dollar_underscore_regex().replace_all(path, "$1");
        if let Some(source) = self.res_info.get(&*path) {
            return Some(source.as_str());
        }
        let path = version_suffix_regex().replace_all(&path, "/");
        self.res_info.get(&*path).map(String::as_str)
    }
}

/// The native library a symbol dump describes, as an APK entry name.
///
/// With an ELF name, the `lib/` entry of that name; otherwise the largest
/// `lib/**.so` entry.
pub fn find_main_library(entries: &[ApkEntry], elf_name: Option<&str>) -> Option<String> {
    let mut libraries = entries
        .iter()
        .filter(|e| e.name.starts_with("lib/") && e.name.ends_with(".so"));
    let found = match elf_name {
        Some(name) => libraries.find(|e| paths::basename(&e.name) == name),
        None => libraries.max_by_key(|e| e.size),
    };
    found.map(|e| e.name.clone())
}

/// `.other` symbols for APK entries not covered elsewhere, plus the zip
/// container overhead.
///
/// `.dex` and `.pak` entries and `main_library` are skipped; entry sizes are
/// compressed sizes.
pub fn create_apk_other_symbols(
    entries: &[ApkEntry],
    apk_size: u64,
    main_library: Option<&str>,
    res_mapper: &ResourceSourceMapper,
) -> Result<Vec<Symbol>, ArchiveError> {
    let mut symbols = Vec::new();
    let mut entries_total: i64 = 0;
    for entry in entries {
        entries_total += entry.compressed_size as i64;
        if Some(entry.name.as_str()) == main_library
            || entry.name.ends_with(".dex")
            || entry.name.ends_with(".pak")
        {
            continue;
        }
        let source_path = match res_mapper.find_source_for_path(&entry.name) {
            Some(source) => source.to_string(),
            None => {
                debug!("No source for APK entry {}", entry.name);
                paths::join(APK_PREFIX_PATH, &entry.name)
            }
        };
        symbols.push(
            Symbol::new(SECTION_OTHER, entry.name.clone(), entry.compressed_size as i64)
                .with_source_path(source_path),
        );
    }

    let overhead = apk_size as i64 - entries_total;
    if overhead < 0 {
        return Err(ArchiveError::NegativeApkOverhead(overhead));
    }
    symbols.push(Symbol::new(SECTION_OTHER, APK_OVERHEAD_NAME, overhead));
    Ok(symbols)
}

/// Order symbols by section then address, with pak and `.bss` sections last
pub fn sort_symbols(symbols: &mut [Symbol]) {
    symbols.sort_by(|a, b| {
        (a.is_pak(), a.is_bss(), &a.section_name, a.address).cmp(&(
            b.is_pak(),
            b.is_bss(),
            &b.section_name,
            b.address,
        ))
    });
}

/// Attribute the gap before each native symbol to it as padding.
///
/// Symbols must be sorted with [`sort_symbols`]. Overhead symbols become
/// padding-only. Overlapping symbols get no padding.
pub fn calculate_padding(symbols: &mut [Symbol], knobs: &Knobs) {
    for symbol in symbols.iter_mut().filter(|s| s.is_overhead()) {
        symbol.padding = symbol.size;
    }
    let Some(first) = symbols.first() else {
        return;
    };

    let mut seen_sections: HashSet<String> = HashSet::from([first.section_name.clone()]);
    for i in 1..symbols.len() {
        let (head, tail) = symbols.split_at_mut(i);
        let prev = &head[i - 1];
        let symbol = &mut tail[0];

        if prev.section_name != symbol.section_name {
            if !seen_sections.insert(symbol.section_name.clone()) {
                warn!("Symbols of {} are not contiguous", symbol.section_name);
            }
            continue;
        }
        if symbol.address == 0 || prev.address == 0 || !symbol.is_native() || !prev.is_native() {
            continue;
        }

        let padding = symbol.address as i64 - prev.end_address() as i64;
        if padding < 0 {
            warn!(
                "Overlapping symbols at {:#x}:\n  A) {}\n  B) {}",
                symbol.address, prev.full_name, symbol.full_name
            );
            continue;
        }
        let threshold = match symbol.section() {
            't' => Some(knobs.text_padding_warning),
            'r' | 'd' => Some(knobs.data_padding_warning),
            _ => None,
        };
        if threshold.is_some_and(|t| padding >= t)
            && !symbol.full_name.starts_with('*')
            && symbol.full_name != STRING_LITERAL_NAME
        {
            warn!(
                "Large padding of {} between:\n  A) {}\n  B) {}",
                padding, prev.full_name, symbol.full_name
            );
        }
        symbol.size = symbol.size_without_padding() + padding;
        symbol.padding = padding;
    }
}

/// Parse `args.gn` into sorted `key=value` strings. `#` starts a comment.
///
/// # Examples
///
/// ```
/// use supersize::archive::parse_gn_args;
///
/// let args = parse_gn_args("target_os = \"android\"  # phone\nis_debug=false\n");
/// assert_eq!(args, vec!["is_debug=false", "target_os=\"android\""]);
/// ```
pub fn parse_gn_args(contents: &str) -> Vec<String> {
    let mut args = BTreeMap::new();
    for line in contents.lines() {
        let code = line.split('#').next().unwrap_or_default();
        let parts: Vec<&str> = code.split('=').collect();
        if let [key, value] = parts.as_slice() {
            args.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    args.into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

fn add_section_size(section_sizes: &mut BTreeMap<String, i64>, section: &str, symbols: &[Symbol]) {
    let total: i64 = symbols.iter().map(|s| s.size).sum();
    *section_sizes.entry(section.to_string()).or_insert(0) += total;
}

fn file_size(path: &Path) -> Result<u64, ArchiveError> {
    Ok(std::fs::metadata(path).map_err(io_error(path))?.len())
}

/// Builds snapshots
///
/// # Examples
///
/// ```no_run
/// use supersize::archive::{Archiver, ArchiveOptions};
/// use supersize::config::ConfigFile;
///
/// let archiver = Archiver::new(&ConfigFile::default());
/// let size_info = archiver.create_size_info(&ArchiveOptions {
///     apk_path: Some("out/Release/apks/ChromePublic.apk".into()),
///     output_directory: Some("out/Release".into()),
///     ..Default::default()
/// })?;
/// println!("{} symbols", size_info.raw_symbols.len());
/// # Ok::<(), supersize::archive::ArchiveError>(())
/// ```
pub struct Archiver<CE: CommandExecutor = RealCommandExecutor> {
    analyzer: ApkAnalyzer<CE>,
    git: GitRepository<CE>,
    knobs: Knobs,
}

impl Archiver<RealCommandExecutor> {
    /// Create an archiver using the tools and knobs from `config`
    pub fn new(config: &ConfigFile) -> Self {
        Self::with_executor(config, RealCommandExecutor)
    }
}

impl<CE: CommandExecutor + Clone> Archiver<CE> {
    /// Create an archiver with a custom command executor (for testing)
    pub fn with_executor(config: &ConfigFile, cmd_executor: CE) -> Self {
        Self {
            analyzer: ApkAnalyzer::with_executor(
                config.apkanalyzer_binary(),
                config.java_home.clone(),
                cmd_executor.clone(),
            ),
            git: GitRepository::with_executor(cmd_executor),
            knobs: config.knobs.clone(),
        }
    }
}

impl<CE: CommandExecutor> Archiver<CE> {
    /// Measure the inputs named by `options`
    pub fn create_size_info(&self, options: &ArchiveOptions) -> Result<SizeInfo, ArchiveError> {
        if options.apk_path.is_none() && options.elf_path.is_none() && options.symbols_path.is_none()
        {
            return Err(ArchiveError::NoInputs);
        }
        if options.elf_path.is_some() && options.symbols_path.is_none() {
            return Err(ArchiveError::ElfWithoutSymbols);
        }

        let mut context = match &options.output_directory {
            Some(dir) => Some(load_output_directory_context(
                dir,
                options.elf_path.as_deref(),
                &self.knobs,
            )?),
            None => None,
        };

        let mut section_sizes = BTreeMap::new();
        let mut raw_symbols = Vec::new();

        if let Some(symbols_path) = &options.symbols_path {
            let (sizes, mut symbols) = load_symbols_dump(symbols_path)?;
            if let Some(context) = &context {
                resolve_thin_archive_paths(&mut symbols, &context.thin_archives);
                if let Some(known_inputs) = &context.known_inputs {
                    let missed = discover_missed_object_paths(&symbols, known_inputs);
                    if !missed.is_empty() {
                        info!("{} object paths are not explicit linker inputs", missed.len());
                        debug!("Missed object paths: {:?}", missed);
                    }
                }
            }
            info!("Stripping linker prefixes from symbol names");
            strip_linker_added_prefixes(&mut symbols);
            section_sizes = sizes;
            raw_symbols = symbols;
        }

        let elf_overhead = match &options.elf_path {
            Some(elf_path) => Some(calculate_elf_overhead(&section_sizes, file_size(elf_path)?)?),
            None => None,
        };

        if let Some(apk_path) = &options.apk_path {
            info!("Attributing dex bytes with apkanalyzer");
            let dex_symbols = self
                .analyzer
                .create_dex_symbols(apk_path, options.output_directory.as_deref())?;
            add_section_size(&mut section_sizes, SECTION_DEX, &dex_symbols);
            raw_symbols.extend(dex_symbols);

            let entries = apk::list_entries(apk_path)?;
            let main_library = options.symbols_path.as_ref().and_then(|_| {
                let elf_name = options
                    .elf_path
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned());
                find_main_library(&entries, elf_name.as_deref())
            });
            let res_mapper = match &options.output_directory {
                Some(dir) => ResourceSourceMapper::load(dir, apk_path),
                None => ResourceSourceMapper::default(),
            };
            let other_symbols = create_apk_other_symbols(
                &entries,
                file_size(apk_path)?,
                main_library.as_deref(),
                &res_mapper,
            )?;
            add_section_size(&mut section_sizes, SECTION_OTHER, &other_symbols);
            raw_symbols.extend(other_symbols);
        }

        if let Some(overhead) = elf_overhead {
            let symbol = Symbol::new(SECTION_OTHER, ELF_OVERHEAD_NAME, overhead);
            add_section_size(&mut section_sizes, SECTION_OTHER, std::slice::from_ref(&symbol));
            raw_symbols.push(symbol);
        }

        extract_source_paths_and_normalize_object_paths(
            &mut raw_symbols,
            context.as_mut().map(|c| &mut c.source_mapper),
        );

        debug!("Sorting {} symbols", raw_symbols.len());
        sort_symbols(&mut raw_symbols);
        info!("Calculating padding");
        calculate_padding(&mut raw_symbols, &self.knobs);

        let metadata = self.create_metadata(options)?;
        info!("Processed {} symbols", raw_symbols.len());
        Ok(SizeInfo::new(
            section_sizes,
            SymbolGroup::new(raw_symbols),
            metadata,
        ))
    }

    fn create_metadata(&self, options: &ArchiveOptions) -> Result<Metadata, ArchiveError> {
        let output_directory = options.output_directory.as_deref();
        let relative = |path: &Path| -> String {
            output_directory
                .and_then(|dir| pathdiff::diff_paths(path, dir))
                .unwrap_or_else(|| path.to_path_buf())
                .to_string_lossy()
                .replace('\\', "/")
        };

        let mut metadata = Metadata::default();

        let revision_dir = [&options.elf_path, &options.apk_path, &options.symbols_path]
            .into_iter()
            .flatten()
            .next()
            .and_then(|p| p.parent())
            .map(|p| {
                if p.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    p
                }
            });
        if let Some(dir) = revision_dir {
            metadata.git_revision = match self.git.get_revision(dir) {
                Ok(revision) => revision,
                Err(e) => {
                    warn!("Failed to detect git revision for file metadata: {}", e);
                    None
                }
            };
        }

        if let Some(elf_path) = &options.elf_path {
            metadata.elf_file_name = Some(relative(elf_path));
            metadata.elf_mtime = std::fs::metadata(elf_path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs());
        }
        if let Some(apk_path) = &options.apk_path {
            metadata.apk_file_name = Some(relative(apk_path));
            metadata.apk_size = Some(file_size(apk_path)?);
        }
        if let Some(symbols_path) = &options.symbols_path {
            metadata.symbols_file_name = Some(relative(symbols_path));
        }

        if let Some(dir) = output_directory {
            let args_path = dir.join("args.gn");
            match std::fs::read_to_string(&args_path) {
                Ok(contents) => metadata.gn_args = parse_gn_args(&contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("No args.gn in {}", dir.display());
                }
                Err(e) => return Err(io_error(&args_path)(e)),
            }
        }

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apk::test_support::write_zip;
    use crate::ar::test_support::build_archive;
    use crate::infra::mock_exit_status;
    use crate::models::symbol::{SECTION_DEX_METHOD, SECTION_RODATA, SECTION_TEXT};
    use std::io;
    use std::process::{Command, Output};
    use tempfile::TempDir;

    #[derive(Clone)]
    struct MockCommandExecutor {
        apkanalyzer_stdout: String,
    }

    impl CommandExecutor for MockCommandExecutor {
        fn output(&self, cmd: &mut Command) -> io::Result<Output> {
            let stdout = if cmd.get_program() == "git" {
                "0123456789abcdef\n".to_string()
            } else {
                self.apkanalyzer_stdout.clone()
            };
            Ok(Output {
                status: mock_exit_status(0),
                stdout: stdout.into_bytes(),
                stderr: Vec::new(),
            })
        }
    }

    fn archiver(apkanalyzer_stdout: &str) -> Archiver<MockCommandExecutor> {
        Archiver::with_executor(
            &ConfigFile::default(),
            MockCommandExecutor {
                apkanalyzer_stdout: apkanalyzer_stdout.to_string(),
            },
        )
    }

    fn native(name: &str, address: u64, size: i64) -> Symbol {
        Symbol::new(SECTION_TEXT, name, size).with_address(address)
    }

    #[test]
    fn test_strip_linker_added_prefixes() {
        let mut symbols = vec![
            native("unlikely.foo", 0, 1),
            native("rel.local.kTable", 0, 1),
            native("rel.kOther", 0, 1),
            native("hot.bar", 0, 1),
            native(".L.str.12", 0, 1),
            native("baz [clone .part.0]", 0, 1),
            native("plain", 0, 1),
        ];
        strip_linker_added_prefixes(&mut symbols);

        let names: Vec<&str> = symbols.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["foo", "kTable", "kOther", "bar", "string literal", "baz [clone .part.0]", "plain"]
        );
        assert_eq!(symbols[0].flags, SymbolFlags::UNLIKELY);
        assert_eq!(symbols[1].flags, SymbolFlags::REL_LOCAL);
        assert_eq!(symbols[2].flags, SymbolFlags::REL);
        assert_eq!(symbols[3].flags, SymbolFlags::HOT);
        assert_eq!(symbols[5].flags, SymbolFlags::CLONE);
        assert!(symbols[6].flags.is_empty());
    }

    #[test]
    fn test_normalize_source_path() {
        assert_eq!(normalize_source_path("gen/foo/bar.cc"), (true, "foo/bar.cc".to_string()));
        assert_eq!(normalize_source_path("../../base/a.cc"), (false, "base/a.cc".to_string()));
        assert_eq!(normalize_source_path("$APK/res/a.png"), (true, "$APK/res/a.png".to_string()));
    }

    #[test]
    fn test_resolve_thin_archive_paths_only_touches_thin_archives() {
        let mut symbols = vec![
            native("a", 0, 1).with_object_path("obj/base/libbase.a(file.o)"),
            native("b", 0, 1).with_object_path("obj/fat.a(x.o)"),
        ];
        let thin = BTreeSet::from(["obj/base/libbase.a".to_string()]);
        resolve_thin_archive_paths(&mut symbols, &thin);

        assert_eq!(symbols[0].object_path, "obj/base/file.o");
        assert_eq!(symbols[1].object_path, "obj/fat.a(x.o)");
    }

    #[test]
    fn test_discover_missed_object_paths() {
        let symbols = vec![
            native("a", 0, 1).with_object_path("obj/a.o"),
            native("b", 0, 1).with_object_path("libc++.a(new.o)"),
            native("c", 0, 1),
        ];
        let known = BTreeSet::from(["obj/a.o".to_string()]);
        assert_eq!(
            discover_missed_object_paths(&symbols, &known),
            BTreeSet::from(["libc++.a".to_string()])
        );
    }

    #[test]
    fn test_calculate_elf_overhead() {
        let sizes = BTreeMap::from([
            (".text".to_string(), 600),
            (".bss".to_string(), 5000),
            (".rodata".to_string(), 300),
        ]);
        assert_eq!(calculate_elf_overhead(&sizes, 1000).unwrap(), 100);
        assert!(matches!(
            calculate_elf_overhead(&sizes, 800),
            Err(ArchiveError::NegativeElfOverhead(-100))
        ));
    }

    #[test]
    fn test_resource_source_mapper_follows_renames_and_decorations() {
        let mapper = ResourceSourceMapper::parse(
            "drawable/icon.png,../../chrome/res/icon.png\n\
             Rename:drawable/alias.png,drawable/icon.png\n\
             layout/main.xml,../../chrome/res/main.xml\n\
             garbage\n",
        );

        assert_eq!(
            mapper.find_source_for_path("res/drawable/icon.png"),
            Some("../../chrome/res/icon.png")
        );
        assert_eq!(
            mapper.find_source_for_path("res/drawable/alias.png"),
            Some("../../chrome/res/icon.png")
        );
        assert_eq!(
            mapper.find_source_for_path("res/$layout__0/main.xml"),
            Some("../../chrome/res/main.xml")
        );
        assert_eq!(
            mapper.find_source_for_path("res/layout-v21/main.xml"),
            Some("../../chrome/res/main.xml")
        );
        assert_eq!(mapper.find_source_for_path("assets/x.bin"), None);
    }

    #[test]
    fn test_resource_source_mapper_strips_dollar_underscore() {
        let mapper = ResourceSourceMapper::parse("drawable/a.png,../../a.png\n");
        assert_eq!(
            mapper.find_source_for_path("res/drawable/$a__0.png"),
            Some("../../a.png")
        );
    }

    #[test]
    fn test_find_main_library() {
        let entry = |name: &str, size| ApkEntry {
            name: name.to_string(),
            size,
            compressed_size: size,
        };
        let entries = vec![
            entry("lib/arm64-v8a/libsmall.so", 10),
            entry("lib/arm64-v8a/libchrome.so", 500),
            entry("assets/big.so.txt", 9000),
        ];
        assert_eq!(
            find_main_library(&entries, Some("libsmall.so")).as_deref(),
            Some("lib/arm64-v8a/libsmall.so")
        );
        assert_eq!(
            find_main_library(&entries, None).as_deref(),
            Some("lib/arm64-v8a/libchrome.so")
        );
        assert_eq!(find_main_library(&entries, Some("libmissing.so")), None);
    }

    #[test]
    fn test_create_apk_other_symbols_skips_accounted_entries() {
        let entry = |name: &str, size| ApkEntry {
            name: name.to_string(),
            size: size * 2,
            compressed_size: size,
        };
        let entries = vec![
            entry("classes.dex", 100),
            entry("assets/resources.pak", 50),
            entry("lib/arm64-v8a/libchrome.so", 1000),
            entry("res/raw/a.txt", 7),
            entry("AndroidManifest.xml", 3),
        ];
        let symbols = create_apk_other_symbols(
            &entries,
            1200,
            Some("lib/arm64-v8a/libchrome.so"),
            &ResourceSourceMapper::default(),
        )
        .unwrap();

        let summary: Vec<(&str, i64, &str)> = symbols
            .iter()
            .map(|s| (s.full_name.as_str(), s.size, s.source_path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("res/raw/a.txt", 7, "$APK/res/raw/a.txt"),
                ("AndroidManifest.xml", 3, "$APK/AndroidManifest.xml"),
                (APK_OVERHEAD_NAME, 40, ""),
            ]
        );
    }

    #[test]
    fn test_create_apk_other_symbols_negative_overhead_is_error() {
        let entries = vec![ApkEntry {
            name: "a".to_string(),
            size: 10,
            compressed_size: 10,
        }];
        assert!(matches!(
            create_apk_other_symbols(&entries, 5, None, &ResourceSourceMapper::default()),
            Err(ArchiveError::NegativeApkOverhead(-5))
        ));
    }

    #[test]
    fn test_sort_symbols_puts_bss_last() {
        let mut symbols = vec![
            Symbol::new(SECTION_BSS, "z", 1).with_address(1),
            native("b", 20, 1),
            native("a", 10, 1),
            Symbol::new(SECTION_RODATA, "r", 1).with_address(5),
        ];
        sort_symbols(&mut symbols);
        let names: Vec<&str> = symbols.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(names, vec!["r", "a", "b", "z"]);
    }

    #[test]
    fn test_calculate_padding_fills_gaps() {
        let mut symbols = vec![
            native("a", 0x100, 0x10),
            native("b", 0x118, 0x8),
            native("c", 0x120, 0x4),
            Symbol::new(SECTION_OTHER, ELF_OVERHEAD_NAME, 50),
        ];
        calculate_padding(&mut symbols, &Knobs::default());

        assert_eq!(symbols[0].padding, 0);
        assert_eq!(symbols[1].padding, 8);
        assert_eq!(symbols[1].size, 16);
        assert_eq!(symbols[1].size_without_padding(), 8);
        assert_eq!(symbols[2].padding, 0);
        assert!(symbols[3].is_padding_only());
    }

    #[test]
    fn test_calculate_padding_replaces_existing_padding() {
        let mut b = native("b", 0x118, 0x8);
        b.padding = 3;
        b.size += 3;
        let mut symbols = vec![native("a", 0x100, 0x10), b];
        calculate_padding(&mut symbols, &Knobs::default());

        assert_eq!(symbols[1].padding, 8);
        assert_eq!(symbols[1].size, 16);
        assert_eq!(symbols[1].size_without_padding(), 8);
    }

    #[test]
    fn test_calculate_padding_overlap_gets_zero() {
        let mut symbols = vec![native("a", 0x100, 0x20), native("b", 0x110, 0x8)];
        calculate_padding(&mut symbols, &Knobs::default());
        assert_eq!(symbols[1].padding, 0);
        assert_eq!(symbols[1].size, 8);
    }

    #[test]
    fn test_calculate_padding_ignores_section_boundaries() {
        let mut symbols = vec![
            Symbol::new(SECTION_RODATA, "r", 4).with_address(0x10),
            native("t", 0x1000, 4),
        ];
        calculate_padding(&mut symbols, &Knobs::default());
        assert_eq!(symbols[1].padding, 0);
    }

    #[test]
    fn test_extract_source_paths_with_mapper() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("build.ninja"),
            "build obj/base/a.o: cxx ../../base/a.cc\nbuild gen/b.o: cxx gen/b.cc\n",
        )
        .unwrap();
        let (mut mapper, _) = ninja::parse(temp.path(), None).unwrap();

        let mut symbols = vec![
            native("a", 0, 1).with_object_path("obj/base/a.o"),
            native("b", 0, 1).with_object_path("gen/b.o"),
            native("c", 0, 1).with_object_path("../../prebuilt/c.o"),
            Symbol::new(SECTION_DEX_METHOD, "org.Foo void f()", 4)
                .with_source_path("../../chrome/Foo.java"),
        ];
        extract_source_paths_and_normalize_object_paths(&mut symbols, Some(&mut mapper));

        assert_eq!(symbols[0].object_path, "base/a.o");
        assert_eq!(symbols[0].source_path, "base/a.cc");
        assert!(!symbols[0].generated_source);
        assert_eq!(symbols[1].source_path, "b.cc");
        assert!(symbols[1].generated_source);
        assert!(symbols[1].flags.contains(SymbolFlags::GENERATED_SOURCE));
        assert_eq!(symbols[2].object_path, "prebuilt/c.o");
        assert!(symbols[2].source_path.is_empty());
        assert_eq!(symbols[3].source_path, "chrome/Foo.java");
        assert_eq!(mapper.unmatched_paths_count(), 0);
    }

    #[test]
    fn test_create_size_info_without_inputs_is_error() {
        let result = archiver("").create_size_info(&ArchiveOptions::default());
        assert!(matches!(result, Err(ArchiveError::NoInputs)));
    }

    #[test]
    fn test_create_size_info_elf_without_symbols_is_error() {
        let result = archiver("").create_size_info(&ArchiveOptions {
            elf_path: Some("libchrome.so".into()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ArchiveError::ElfWithoutSymbols)));
    }

    #[test]
    fn test_create_size_info_native_build() {
        let temp = TempDir::new().unwrap();
        let out = temp.path();
        std::fs::create_dir_all(out.join("obj/base")).unwrap();
        std::fs::write(
            out.join("build.ninja"),
            "build obj/base/a.o: cxx ../../base/a.cc\n\
             build obj/base/b.o: cxx ../../base/b.cc\n\
             build obj/base/libbase.a: alink obj/base/a.o obj/base/b.o\n\
             build libchrome.so: solink obj/base/libbase.a\n",
        )
        .unwrap();
        std::fs::write(
            out.join("obj/base/libbase.a"),
            build_archive(true, &[("a.o", b""), ("b.o", b"")]),
        )
        .unwrap();
        std::fs::write(out.join("libchrome.so"), vec![0u8; 200]).unwrap();
        std::fs::write(out.join("args.gn"), "is_debug = false\n").unwrap();
        std::fs::write(
            out.join("symbols.json"),
            r#"{
                "section_sizes": {".text": 48, ".bss": 16},
                "symbols": [
                    {"section_name": ".text", "full_name": "startup.b_init", "size": 16,
                     "address": 4128, "object_path": "obj/base/libbase.a(b.o)"},
                    {"section_name": ".text", "full_name": "a_main", "size": 16,
                     "address": 4096, "object_path": "obj/base/libbase.a(a.o)"},
                    {"section_name": ".bss", "full_name": "g_state", "size": 16,
                     "address": 8192, "object_path": "obj/base/libbase.a(a.o)"}
                ]
            }"#,
        )
        .unwrap();

        let size_info = archiver("")
            .create_size_info(&ArchiveOptions {
                elf_path: Some(out.join("libchrome.so")),
                symbols_path: Some(out.join("symbols.json")),
                output_directory: Some(out.to_path_buf()),
                ..Default::default()
            })
            .unwrap();

        let symbols = size_info.raw_symbols.as_slice();
        let names: Vec<&str> = symbols.iter().map(|s| s.full_name.as_str()).collect();
        assert_eq!(names, vec![ELF_OVERHEAD_NAME, "a_main", "b_init", "g_state"]);

        assert_eq!(symbols[0].size, 200 - 48);
        assert_eq!(symbols[1].object_path, "base/a.o");
        assert_eq!(symbols[1].source_path, "base/a.cc");
        assert_eq!(symbols[2].object_path, "base/b.o");
        assert_eq!(symbols[2].padding, 16);
        assert!(symbols[2].flags.contains(SymbolFlags::STARTUP));
        assert_eq!(size_info.section_sizes[SECTION_OTHER], 152);

        let metadata = &size_info.metadata;
        assert_eq!(metadata.git_revision.as_deref(), Some("0123456789abcdef"));
        assert_eq!(metadata.elf_file_name.as_deref(), Some("libchrome.so"));
        assert_eq!(metadata.symbols_file_name.as_deref(), Some("symbols.json"));
        assert_eq!(metadata.gn_args, vec!["is_debug=false"]);
        assert!(metadata.elf_mtime.is_some());
    }

    #[test]
    fn test_create_size_info_missing_link_command_is_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("build.ninja"), "build obj/a.o: cxx ../../a.cc\n").unwrap();
        std::fs::write(temp.path().join("symbols.json"), "{}").unwrap();
        std::fs::write(temp.path().join("libchrome.so"), b"").unwrap();

        let result = archiver("").create_size_info(&ArchiveOptions {
            elf_path: Some(temp.path().join("libchrome.so")),
            symbols_path: Some(temp.path().join("symbols.json")),
            output_directory: Some(temp.path().to_path_buf()),
            ..Default::default()
        });
        assert!(matches!(result, Err(ArchiveError::MissingLinkCommand(_))));
    }

    #[test]
    fn test_create_size_info_apk_only() {
        let temp = TempDir::new().unwrap();
        let apk = temp.path().join("Test.apk");
        write_zip(
            &apk,
            &[
                ("classes.dex", &[0u8; 100]),
                ("res/raw/data.bin", &[1u8; 30]),
            ],
        );
        let apkanalyzer_output = "\
P d 2 2 80 <TOTAL>
C d 1 1 60 org.Foo
M d 1 1 20 org.Foo void run()
";

        let size_info = archiver(apkanalyzer_output)
            .create_size_info(&ArchiveOptions {
                apk_path: Some(apk.clone()),
                ..Default::default()
            })
            .unwrap();

        let symbols = &size_info.raw_symbols;
        let dex_total: i64 = symbols.iter().filter(|s| s.is_dex()).map(|s| s.size).sum();
        assert_eq!(dex_total, 100);
        assert_eq!(size_info.section_sizes[SECTION_DEX], 100);

        let data = symbols
            .iter()
            .find(|s| s.full_name == "res/raw/data.bin")
            .unwrap();
        assert_eq!(data.size, 30);
        assert_eq!(data.source_path, "$APK/res/raw/data.bin");

        let apk_size = std::fs::metadata(&apk).unwrap().len() as i64;
        assert_eq!(size_info.section_sizes[SECTION_OTHER], apk_size - 100);
        assert_eq!(size_info.metadata.apk_size, Some(apk_size as u64));
        assert!(symbols.iter().any(|s| s.full_name == APK_OVERHEAD_NAME && s.is_padding_only()));
    }
}
