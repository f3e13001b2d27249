//! APK container access
//!
//! APKs, jars and app bundles are zip files; this module lists their entries
//! and reads individual entries.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

/// Errors that can occur while reading a zip container
#[derive(Error, Debug)]
pub enum ApkError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a readable zip
    #[error("Failed to read zip {}", path.display())]
    Zip {
        /// Container path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: zip::result::ZipError,
    },
}

/// A file inside a zip container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApkEntry {
    /// Path inside the container
    pub name: String,
    /// Uncompressed size
    pub size: u64,
    /// Bytes the entry occupies in the container
    pub compressed_size: u64,
}

fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>, ApkError> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|source| ApkError::Zip {
        path: path.to_path_buf(),
        source,
    })
}

/// List every file entry, in container order. Directories are skipped.
pub fn list_entries(path: &Path) -> Result<Vec<ApkEntry>, ApkError> {
    let mut archive = open(path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|source| ApkError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        if file.is_dir() {
            continue;
        }
        entries.push(ApkEntry {
            name: file.name().to_string(),
            size: file.size(),
            compressed_size: file.compressed_size(),
        });
    }
    Ok(entries)
}

/// Read up to `limit` bytes of every entry whose name satisfies `filter`
pub fn read_entries<F>(
    path: &Path,
    filter: F,
    limit: Option<u64>,
) -> Result<Vec<(String, Vec<u8>)>, ApkError>
where
    F: Fn(&str) -> bool,
{
    let mut archive = open(path)?;
    let mut contents = Vec::new();
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|source| ApkError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        if file.is_dir() || !filter(file.name()) {
            continue;
        }
        let name = file.name().to_string();
        let mut buf = Vec::new();
        file.take(limit.unwrap_or(u64::MAX)).read_to_end(&mut buf)?;
        contents.push((name, buf));
    }
    Ok(contents)
}

/// Total uncompressed size of the `.dex` entries
pub fn expected_dex_total_size(path: &Path) -> Result<u64, ApkError> {
    Ok(list_entries(path)?
        .iter()
        .filter(|e| e.name.ends_with(".dex"))
        .map(|e| e.size)
        .sum())
}
