//! `ar` archive parsing
//!
//! Reads the GNU archive format used for static libraries, including thin
//! archives (`!<thin>`), whose members are stored as paths to external object
//! files instead of embedded data.
//!
//! # Examples
//!
//! ```no_run
//! use supersize::ar::iter_archive_chunks;
//! use std::path::Path;
//!
//! for chunk in iter_archive_chunks(Path::new("obj/base/libbase.a"))? {
//!     let chunk = chunk?;
//!     println!("{}", chunk.name);
//! }
//! # Ok::<(), supersize::ar::ArError>(())
//! ```

use crate::paths;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Global header of a regular archive
pub const AR_MAGIC: &[u8; 8] = b"!<arch>\n";
/// Global header of a thin archive
pub const THIN_MAGIC: &[u8; 8] = b"!<thin>\n";

const HEADER_LEN: usize = 60;
const HEADER_TRAILER: &[u8; 2] = b"`\n";

/// Errors that can occur while reading an archive
#[derive(Error, Debug)]
pub enum ArError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with an archive magic
    #[error("Invalid archive magic: {0:?}")]
    InvalidMagic(String),

    /// A member header was cut short
    #[error("Truncated member header at offset {0}")]
    TruncatedHeader(u64),

    /// A member header could not be decoded
    #[error("Invalid member header at offset {offset}: {reason}")]
    InvalidHeader {
        /// Byte offset of the header
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// A member's data ended early
    #[error("Truncated data for member '{0}'")]
    TruncatedPayload(String),

    /// A `/N` name points outside the name table
    #[error("Name table offset {0} is out of range")]
    BadNameOffset(usize),
}

/// One archive member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveChunk {
    /// Member name (for thin archives, a path relative to the archive)
    pub name: String,
    /// Member data, `None` for thin archives
    pub payload: Option<Vec<u8>>,
}

/// Lazy iterator over the members of an archive
pub struct ArchiveChunks<R: Read> {
    reader: R,
    thin: bool,
    name_table: Vec<u8>,
    offset: u64,
    done: bool,
}

impl<R: Read> ArchiveChunks<R> {
    /// Read the global header and prepare to iterate members
    pub fn new(mut reader: R) -> Result<Self, ArError> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                ArError::InvalidMagic(String::from_utf8_lossy(&magic).into_owned())
            }
            _ => ArError::Io(e),
        })?;

        let thin = if &magic == THIN_MAGIC {
            true
        } else if &magic == AR_MAGIC {
            false
        } else {
            return Err(ArError::InvalidMagic(
                String::from_utf8_lossy(&magic).into_owned(),
            ));
        };

        Ok(Self {
            reader,
            thin,
            name_table: Vec::new(),
            offset: magic.len() as u64,
            done: false,
        })
    }

    /// Whether this is a thin archive
    pub fn is_thin(&self) -> bool {
        self.thin
    }

    /// Read a member header, `None` at a clean end of file
    fn read_header(&mut self) -> Result<Option<[u8; HEADER_LEN]>, ArError> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match self.reader.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        match filled {
            0 => Ok(None),
            HEADER_LEN => Ok(Some(header)),
            _ => Err(ArError::TruncatedHeader(self.offset)),
        }
    }

    fn read_payload(&mut self, name: &str, size: usize) -> Result<Vec<u8>, ArError> {
        // The size field is untrusted; grow the buffer only as data arrives.
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(size as u64)
            .read_to_end(&mut payload)?;
        if payload.len() < size {
            return Err(ArError::TruncatedPayload(name.to_string()));
        }
        self.offset += size as u64;

        // Members are 2-byte aligned; the final pad byte may be missing.
        if size % 2 == 1 {
            self.offset += io::copy(&mut (&mut self.reader).take(1), &mut io::sink())?;
        }
        Ok(payload)
    }

    fn resolve_name(&self, raw_name: &str) -> Result<String, ArError> {
        let Some(index) = raw_name
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        else {
            return Ok(raw_name.trim_end_matches('/').to_string());
        };

        let start: usize = index
            .parse()
            .map_err(|_| ArError::BadNameOffset(usize::MAX))?;
        if start >= self.name_table.len() {
            return Err(ArError::BadNameOffset(start));
        }
        let rest = &self.name_table[start..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        let name = String::from_utf8_lossy(&rest[..end]);
        Ok(name.trim_end_matches('/').to_string())
    }

    fn next_chunk(&mut self) -> Result<Option<ArchiveChunk>, ArError> {
        loop {
            let header_offset = self.offset;
            let Some(header) = self.read_header()? else {
                return Ok(None);
            };
            self.offset += HEADER_LEN as u64;

            if &header[58..60] != HEADER_TRAILER {
                return Err(ArError::InvalidHeader {
                    offset: header_offset,
                    reason: "missing header trailer".to_string(),
                });
            }

            let raw_name = String::from_utf8_lossy(&header[..16]).trim_end().to_string();
            let size_field = String::from_utf8_lossy(&header[48..58]);
            let size: usize =
                size_field
                    .trim()
                    .parse()
                    .map_err(|_| ArError::InvalidHeader {
                        offset: header_offset,
                        reason: format!("bad size field '{}'", size_field.trim()),
                    })?;

            let is_symbol_table = raw_name == "/" || raw_name == "/SYM64/";
            let is_name_table = raw_name == "//";

            // Thin archives still embed the symbol and name tables.
            let payload = if !self.thin || is_symbol_table || is_name_table {
                Some(self.read_payload(&raw_name, size)?)
            } else {
                None
            };

            if is_symbol_table {
                continue;
            }
            if is_name_table {
                self.name_table = payload.unwrap_or_default();
                continue;
            }

            let name = self.resolve_name(&raw_name)?;
            return Ok(Some(ArchiveChunk { name, payload }));
        }
    }
}

impl<R: Read> Iterator for ArchiveChunks<R> {
    type Item = Result<ArchiveChunk, ArError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Open an archive and iterate its members
pub fn iter_archive_chunks(path: &Path) -> Result<ArchiveChunks<BufReader<File>>, ArError> {
    let file = File::open(path)?;
    ArchiveChunks::new(BufReader::new(file))
}

/// Whether the file at `path` is a thin archive
pub fn is_thin_archive(path: &Path) -> io::Result<bool> {
    let mut magic = [0u8; 8];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == THIN_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Path of a thin archive member, relative to the output directory.
///
/// Members starting with `obj/` are already output-relative. Everything else
/// is relative to the archive's directory.
///
/// # Examples
///
/// ```
/// use supersize::ar::create_thin_object_path;
///
/// assert_eq!(create_thin_object_path("obj/base/libbase.a", "foo.o"), "obj/base/foo.o");
/// assert_eq!(create_thin_object_path("obj/base/libbase.a", "obj/x/y.o"), "obj/x/y.o");
/// assert_eq!(create_thin_object_path("obj/base/libbase.a", "../z.o"), "obj/z.o");
/// ```
pub fn create_thin_object_path(archive_path: &str, subpath: &str) -> String {
    if subpath.starts_with("obj/") {
        return subpath.to_string();
    }
    paths::normalize_path(&paths::join(paths::dirname(archive_path), subpath))
}

/// Replace thin archives in a list of linker inputs with their members.
///
/// Returns the expanded paths and the set of archives that were thin. Missing
/// archives are logged and dropped; regular archives are kept as-is.
pub fn expand_thin_archives(
    paths: &[String],
    output_directory: &Path,
) -> Result<(Vec<String>, BTreeSet<String>), ArError> {
    let mut expanded = Vec::with_capacity(paths.len());
    let mut thin_archives = BTreeSet::new();
    let mut num_archives = 0;

    for path in paths {
        if !path.ends_with(".a") {
            expanded.push(path.clone());
            continue;
        }
        num_archives += 1;

        let abs_path = output_directory.join(path);
        if !abs_path.exists() {
            warn!("Linker input not found: {}", path);
            continue;
        }

        if is_thin_archive(&abs_path)? {
            thin_archives.insert(path.clone());
            for chunk in iter_archive_chunks(&abs_path)? {
                let chunk = chunk?;
                expanded.push(create_thin_object_path(path, &chunk.name));
            }
        } else {
            expanded.push(path.clone());
        }
    }

    info!(
        "{} of {} .a files were thin archives",
        thin_archives.len(),
        num_archives
    );
    debug!("Expanded {} linker inputs to {}", paths.len(), expanded.len());
    Ok((expanded, thin_archives))
}
