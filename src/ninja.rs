//! Ninja build file parsing
//!
//! Extracts two things from `build.ninja` (and every `subninja` it pulls in):
//! which source file each `.o` was compiled from, and which objects each `.a`
//! archive holds. Optionally also finds the direct link inputs of an ELF.

use crate::infra::{FileSystem, RealFileSystem};
use crate::paths;
use log::{debug, warn};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// Default number of unresolved paths logged before going quiet
pub const DEFAULT_MAX_UNMATCHED_TO_LOG: usize = 10;

const ROOT_NINJA_FILE: &str = "build.ninja";

/// Errors that can occur while parsing ninja files
#[derive(Error, Debug)]
pub enum NinjaError {
    /// A ninja file could not be read
    #[error("Failed to read {}", path.display())]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A `subninja` was included a second time
    #[error("{0} was included more than once")]
    DoubleInclude(String),

    /// Two build statements produce the same `.o` or `.a`
    #[error("Duplicate build output: {0}")]
    DuplicateOutput(String),

    /// Two build statements produce the ELF being analyzed
    #[error("Found more than one link statement for {0}")]
    DuplicateElfOutput(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DepEntry {
    /// `.o` → source file
    Object(String),
    /// `.a` → member basename → member path
    Archive(BTreeMap<String, String>),
}

fn build_statement_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^build ([^:]+): \w+ (.*?)(?: *\||$)").expect("build statement regex is valid")
    })
}

/// Split a ninja path list on unescaped spaces.
///
/// Both `$ ` and `\ ` escape a space; `$$` and `$:` are unescaped too.
///
/// # Examples
///
/// ```
/// use supersize::ninja::parse_path_list;
///
/// assert_eq!(parse_path_list("a.o b$ c.o  d\\ e.o"), vec!["a.o", "b c.o", "d e.o"]);
/// ```
pub fn parse_path_list(list: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current = String::new();
    let mut chars = list.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('$', Some(next @ (' ' | ':' | '$'))) | ('\\', Some(next @ ' ')) => {
                current.push(next);
                chars.next();
            }
            (' ', _) => {
                if !current.is_empty() {
                    paths.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        paths.push(current);
    }
    paths
}

/// Maps object paths to the source files they were built from
#[derive(Debug)]
pub struct SourceMapper {
    dep_map: BTreeMap<String, DepEntry>,
    parsed_files: Vec<String>,
    unmatched_paths: BTreeSet<String>,
    max_unmatched_to_log: usize,
}

impl SourceMapper {
    fn new() -> Self {
        Self {
            dep_map: BTreeMap::new(),
            parsed_files: Vec::new(),
            unmatched_paths: BTreeSet::new(),
            max_unmatched_to_log: DEFAULT_MAX_UNMATCHED_TO_LOG,
        }
    }

    /// Change how many unresolved paths get a warning
    pub fn with_max_unmatched_to_log(mut self, max: usize) -> Self {
        self.max_unmatched_to_log = max;
        self
    }

    /// Source file for an object path.
    ///
    /// Accepts plain `.o` paths and archive members written as
    /// `foo/bar.a(baz.o)`. Plain paths starting with `..` are already source
    /// paths and are returned unchanged. Unresolved paths are remembered and
    /// return `None`.
    pub fn find_source_for_path(&mut self, path: &str) -> Option<String> {
        let found = match path.find('(') {
            Some(paren) if path.ends_with(')') => {
                let archive = &path[..paren];
                let member = &path[paren + 1..path.len() - 1];
                self.find_archive_member_source(archive, member)
            }
            _ if path.starts_with("..") => return Some(path.to_string()),
            _ => match self.dep_map.get(path) {
                Some(DepEntry::Object(source)) => Some(source.clone()),
                _ => None,
            },
        };

        if found.is_none() && self.unmatched_paths.insert(path.to_string()) {
            if self.unmatched_paths.len() <= self.max_unmatched_to_log {
                warn!("Could not find source path for {}", path);
            } else if self.unmatched_paths.len() == self.max_unmatched_to_log + 1 {
                warn!("Not logging further unmatched paths");
            }
        }
        found
    }

    fn find_archive_member_source(&self, archive: &str, member: &str) -> Option<String> {
        match self.dep_map.get(archive) {
            Some(DepEntry::Archive(members)) => {
                let object_path = members.get(member)?;
                match self.dep_map.get(object_path) {
                    Some(DepEntry::Object(source)) => Some(source.clone()),
                    _ => None,
                }
            }
            _ if archive.ends_with(".rlib") && archive.contains("/rustlib/") => {
                Some(format!("(Rust stdlib)/{}", paths::basename(archive)))
            }
            _ => None,
        }
    }

    /// Number of distinct paths that could not be resolved
    pub fn unmatched_paths_count(&self) -> usize {
        self.unmatched_paths.len()
    }

    /// Number of ninja files that were read
    pub fn parsed_file_count(&self) -> usize {
        self.parsed_files.len()
    }

    /// Ninja files that were read, in the order they were read
    pub fn parsed_files(&self) -> &[String] {
        &self.parsed_files
    }

    /// Every `.o` and `.a` output the build knows about
    pub fn iter_all_paths(&self) -> impl Iterator<Item = &str> {
        self.dep_map.keys().map(String::as_str)
    }

    /// Every `.a` output the build knows about
    pub fn iter_archive_paths(&self) -> impl Iterator<Item = &str> {
        self.dep_map
            .iter()
            .filter(|(_, entry)| matches!(entry, DepEntry::Archive(_)))
            .map(|(path, _)| path.as_str())
    }
}

struct NinjaParser<'a, FS: FileSystem> {
    fs: &'a FS,
    output_directory: &'a Path,
    elf_path: Option<String>,
    mapper: SourceMapper,
    seen_files: HashSet<String>,
    elf_inputs: Option<Vec<String>>,
}

impl<FS: FileSystem> NinjaParser<'_, FS> {
    fn parse_file(&mut self, rel_path: &str) -> Result<(), NinjaError> {
        if !self.seen_files.insert(rel_path.to_string()) {
            return Err(NinjaError::DoubleInclude(rel_path.to_string()));
        }

        let path = self.output_directory.join(rel_path);
        let contents = self
            .fs
            .read_to_string(&path)
            .map_err(|source| NinjaError::Read { path, source })?;
        self.mapper.parsed_files.push(rel_path.to_string());

        let mut sub_ninjas = Vec::new();
        for line in contents.lines() {
            if let Some(sub) = line.strip_prefix("subninja ") {
                sub_ninjas.push(sub.trim().to_string());
                continue;
            }
            let Some(caps) = build_statement_regex().captures(line) else {
                continue;
            };
            let outputs = parse_path_list(&caps[1]);
            let inputs = &caps[2];
            self.record_statement(&outputs, inputs)?;
        }

        for sub in sub_ninjas {
            self.parse_file(&sub)?;
        }
        Ok(())
    }

    fn record_statement(&mut self, outputs: &[String], inputs: &str) -> Result<(), NinjaError> {
        if let Some(elf_path) = &self.elf_path {
            if outputs.iter().any(|o| paths::normalize_path(o) == *elf_path) {
                if self.elf_inputs.is_some() {
                    return Err(NinjaError::DuplicateElfOutput(elf_path.clone()));
                }
                self.elf_inputs = Some(parse_path_list(inputs));
            }
        }

        for output in outputs {
            let entry = if output.ends_with(".o") {
                match parse_path_list(inputs).into_iter().next() {
                    Some(source) => DepEntry::Object(source),
                    None => continue,
                }
            } else if output.ends_with(".a") {
                DepEntry::Archive(
                    parse_path_list(inputs)
                        .into_iter()
                        .map(|p| (paths::basename(&p).to_string(), p))
                        .collect(),
                )
            } else {
                continue;
            };

            if self.mapper.dep_map.insert(output.clone(), entry).is_some() {
                return Err(NinjaError::DuplicateOutput(output.clone()));
            }
        }
        Ok(())
    }
}

/// Express `elf_path` relative to the output directory when possible
fn relative_elf_path(elf_path: &Path, output_directory: &Path) -> String {
    let relative = if elf_path.is_absolute() == output_directory.is_absolute() {
        pathdiff::diff_paths(elf_path, output_directory).unwrap_or_else(|| elf_path.to_path_buf())
    } else {
        elf_path.to_path_buf()
    };
    paths::normalize_path(&relative.to_string_lossy().replace('\\', "/"))
}

/// Parse `build.ninja` in `output_directory` and everything it includes.
///
/// When `elf_path` is given, also returns the direct inputs of the statement
/// that links it (`None` if no statement does).
pub fn parse(
    output_directory: &Path,
    elf_path: Option<&Path>,
) -> Result<(SourceMapper, Option<Vec<String>>), NinjaError> {
    parse_with_fs(&RealFileSystem, output_directory, elf_path)
}

/// [`parse`] with a custom filesystem implementation
pub fn parse_with_fs<FS: FileSystem>(
    fs: &FS,
    output_directory: &Path,
    elf_path: Option<&Path>,
) -> Result<(SourceMapper, Option<Vec<String>>), NinjaError> {
    let mut parser = NinjaParser {
        fs,
        output_directory,
        elf_path: elf_path.map(|p| relative_elf_path(p, output_directory)),
        mapper: SourceMapper::new(),
        seen_files: HashSet::new(),
        elf_inputs: None,
    };
    parser.parse_file(ROOT_NINJA_FILE)?;

    debug!(
        "Parsed {} .ninja files with {} outputs",
        parser.mapper.parsed_file_count(),
        parser.mapper.dep_map.len()
    );
    Ok((parser.mapper, parser.elf_inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    struct MockFileSystem {
        files: HashMap<PathBuf, String>,
    }

    impl MockFileSystem {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (Path::new("out").join(p), c.to_string()))
                    .collect(),
            }
        }
    }

    impl FileSystem for MockFileSystem {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file not found"))
        }

        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.read_to_string(path).map(String::into_bytes)
        }

        fn write(&self, _path: &Path, _contents: impl AsRef<[u8]>) -> io::Result<()> {
            unimplemented!()
        }
    }

    fn parse_mock(
        files: &[(&str, &str)],
        elf: Option<&str>,
    ) -> Result<(SourceMapper, Option<Vec<String>>), NinjaError> {
        let fs = MockFileSystem::new(files);
        parse_with_fs(&fs, Path::new("out"), elf.map(Path::new))
    }

    #[test]
    fn test_object_maps_to_source() {
        let (mut mapper, elf_inputs) =
            parse_mock(&[("build.ninja", "build obj/foo.o: cxx ../../foo.cc\n")], None).unwrap();

        assert_eq!(
            mapper.find_source_for_path("obj/foo.o"),
            Some("../../foo.cc".to_string())
        );
        assert!(elf_inputs.is_none());
        assert_eq!(mapper.parsed_file_count(), 1);
    }

    #[test]
    fn test_implicit_and_order_only_deps_are_ignored() {
        let (mut mapper, _) = parse_mock(
            &[(
                "build.ninja",
                "build obj/foo.o: cxx ../../foo.cc | ../../foo.h || obj/gen.stamp\n",
            )],
            None,
        )
        .unwrap();

        assert_eq!(
            mapper.find_source_for_path("obj/foo.o"),
            Some("../../foo.cc".to_string())
        );
    }

    #[test]
    fn test_archive_member_resolves_through_archive() {
        let ninja = "\
build obj/base/a.o: cxx ../../base/a.cc
build obj/base/b.o: cxx ../../base/b.cc
build obj/base/libbase.a: alink obj/base/a.o obj/base/b.o
";
        let (mut mapper, _) = parse_mock(&[("build.ninja", ninja)], None).unwrap();

        assert_eq!(
            mapper.find_source_for_path("obj/base/libbase.a(b.o)"),
            Some("../../base/b.cc".to_string())
        );
        assert_eq!(
            mapper.iter_archive_paths().collect::<Vec<_>>(),
            vec!["obj/base/libbase.a"]
        );
    }

    #[test]
    fn test_subninja_files_are_followed() {
        let (mut mapper, _) = parse_mock(
            &[
                ("build.ninja", "subninja obj/base/base.ninja\n"),
                ("obj/base/base.ninja", "build obj/base/x.o: cxx ../../base/x.cc\n"),
            ],
            None,
        )
        .unwrap();

        assert_eq!(mapper.parsed_file_count(), 2);
        assert_eq!(
            mapper.find_source_for_path("obj/base/x.o"),
            Some("../../base/x.cc".to_string())
        );
    }

    #[test]
    fn test_double_include_is_an_error() {
        let result = parse_mock(
            &[
                ("build.ninja", "subninja a.ninja\nsubninja a.ninja\n"),
                ("a.ninja", ""),
            ],
            None,
        );
        assert!(matches!(result, Err(NinjaError::DoubleInclude(p)) if p == "a.ninja"));
    }

    #[test]
    fn test_duplicate_output_is_an_error() {
        let result = parse_mock(
            &[(
                "build.ninja",
                "build obj/a.o: cxx ../../a.cc\nbuild obj/a.o: cxx ../../b.cc\n",
            )],
            None,
        );
        assert!(matches!(result, Err(NinjaError::DuplicateOutput(p)) if p == "obj/a.o"));
    }

    #[test]
    fn test_missing_subninja_is_a_read_error() {
        let result = parse_mock(&[("build.ninja", "subninja gone.ninja\n")], None);
        assert!(matches!(result, Err(NinjaError::Read { .. })));
    }

    #[test]
    fn test_elf_link_inputs_are_returned() {
        let ninja = "\
build obj/main.o: cxx ../../main.cc
build ./libchrome.so: solink obj/main.o obj/base/libbase.a | ../../build/toolchain.py
";
        let (_, elf_inputs) = parse_mock(&[("build.ninja", ninja)], Some("out/libchrome.so")).unwrap();

        assert_eq!(
            elf_inputs,
            Some(vec![
                "obj/main.o".to_string(),
                "obj/base/libbase.a".to_string()
            ])
        );
    }

    #[test]
    fn test_duplicate_elf_output_is_an_error() {
        let ninja = "\
build libchrome.so: solink obj/a.o
build libchrome.so libchrome.so.TOC: solink obj/b.o
";
        let result = parse_mock(&[("build.ninja", ninja)], Some("out/libchrome.so"));
        assert!(matches!(result, Err(NinjaError::DuplicateElfOutput(_))));
    }

    #[test]
    fn test_escaped_spaces_in_paths() {
        let (mut mapper, _) = parse_mock(
            &[("build.ninja", "build obj/my$ file.o: cxx ../../my$ file.cc\n")],
            None,
        )
        .unwrap();

        assert_eq!(
            mapper.find_source_for_path("obj/my file.o"),
            Some("../../my file.cc".to_string())
        );
    }

    #[test]
    fn test_parent_relative_paths_are_already_sources() {
        let (mut mapper, _) = parse_mock(&[("build.ninja", "")], None).unwrap();
        assert_eq!(
            mapper.find_source_for_path("../../third_party/x.cc"),
            Some("../../third_party/x.cc".to_string())
        );
        assert_eq!(mapper.unmatched_paths_count(), 0);
    }

    #[test]
    fn test_unmatched_paths_are_counted_once() {
        let (mapper, _) = parse_mock(&[("build.ninja", "")], None).unwrap();
        let mut mapper = mapper.with_max_unmatched_to_log(1);

        assert_eq!(mapper.find_source_for_path("obj/a.o"), None);
        assert_eq!(mapper.find_source_for_path("obj/a.o"), None);
        assert_eq!(mapper.find_source_for_path("obj/lib.a(b.o)"), None);
        assert_eq!(mapper.unmatched_paths_count(), 2);
    }

    #[test]
    fn test_rust_stdlib_rlib_members() {
        let (mut mapper, _) = parse_mock(&[("build.ninja", "")], None).unwrap();
        assert_eq!(
            mapper.find_source_for_path(
                "../../third_party/rust/lib/rustlib/x86_64/lib/libstd.rlib(std.o)"
            ),
            Some("(Rust stdlib)/libstd.rlib".to_string())
        );
    }

    #[test]
    fn test_iter_all_paths_lists_outputs() {
        let ninja = "\
build obj/a.o: cxx ../../a.cc
build obj/liba.a: alink obj/a.o
build gen/x.stamp: stamp obj/a.o
";
        let (mapper, _) = parse_mock(&[("build.ninja", ninja)], None).unwrap();
        let all: Vec<&str> = mapper.iter_all_paths().collect();
        assert_eq!(all, vec!["obj/a.o", "obj/liba.a"]);
    }

    #[test]
    fn test_parse_path_list_escapes() {
        assert_eq!(parse_path_list(""), Vec::<String>::new());
        assert_eq!(parse_path_list("  a  b "), vec!["a", "b"]);
        assert_eq!(parse_path_list("c$:\\x$$y"), vec!["c:\\x$y"]);
    }

    #[test]
    fn test_relative_elf_path() {
        assert_eq!(
            relative_elf_path(Path::new("/src/out/lib.so"), Path::new("/src/out")),
            "lib.so"
        );
        assert_eq!(
            relative_elf_path(Path::new("./lib.so"), Path::new("/src/out")),
            "lib.so"
        );
    }
}
