//! `.size` snapshot files
//!
//! A `.size` file is a JSON document holding a format version and a
//! [`SizeInfo`]. Loading rejects versions this build does not understand.

use crate::infra::{FileSystem, RealFileSystem};
use crate::models::SizeInfo;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Format version written by this build
pub const SIZE_FILE_VERSION: u32 = 1;

/// Required extension of snapshot files
pub const SIZE_FILE_EXTENSION: &str = "size";

/// Errors that can occur while reading or writing `.size` files
#[derive(Error, Debug)]
pub enum FileFormatError {
    /// Reading or writing failed
    #[error("Failed to access {}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The path does not end in `.size`
    #[error("Size files must end in .size: {}", .0.display())]
    BadExtension(PathBuf),

    /// The contents are not a valid snapshot
    #[error("Invalid size file {}", path.display())]
    Json {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Written by an incompatible version
    #[error("Unsupported size file version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Version this build reads
        expected: u32,
    },
}

#[derive(Serialize)]
struct SizeFileRef<'a> {
    version: u32,
    size_info: &'a SizeInfo,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Deserialize)]
struct SizeFile {
    size_info: SizeInfo,
}

fn check_extension(path: &Path) -> Result<(), FileFormatError> {
    if path.extension().is_some_and(|ext| ext == SIZE_FILE_EXTENSION) {
        Ok(())
    } else {
        Err(FileFormatError::BadExtension(path.to_path_buf()))
    }
}

/// Write `size_info` to `path`
pub fn save_size_info(size_info: &SizeInfo, path: &Path) -> Result<(), FileFormatError> {
    save_size_info_with_fs(&RealFileSystem, size_info, path)
}

/// [`save_size_info`] with a custom filesystem implementation
pub fn save_size_info_with_fs<FS: FileSystem>(
    fs: &FS,
    size_info: &SizeInfo,
    path: &Path,
) -> Result<(), FileFormatError> {
    check_extension(path)?;
    let contents = serde_json::to_vec(&SizeFileRef {
        version: SIZE_FILE_VERSION,
        size_info,
    })
    .map_err(|source| FileFormatError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        "Writing {} symbols ({} bytes) to {}",
        size_info.raw_symbols.len(),
        contents.len(),
        path.display()
    );
    fs.write(path, contents).map_err(|source| FileFormatError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a snapshot from `path`
pub fn load_size_info(path: &Path) -> Result<SizeInfo, FileFormatError> {
    load_size_info_with_fs(&RealFileSystem, path)
}

/// [`load_size_info`] with a custom filesystem implementation
pub fn load_size_info_with_fs<FS: FileSystem>(
    fs: &FS,
    path: &Path,
) -> Result<SizeInfo, FileFormatError> {
    check_extension(path)?;
    let contents = fs.read(path).map_err(|source| FileFormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json_err = |source| FileFormatError::Json {
        path: path.to_path_buf(),
        source,
    };

    let probe: VersionProbe = serde_json::from_slice(&contents).map_err(json_err)?;
    if probe.version != SIZE_FILE_VERSION {
        return Err(FileFormatError::UnsupportedVersion {
            found: probe.version,
            expected: SIZE_FILE_VERSION,
        });
    }

    let file: SizeFile = serde_json::from_slice(&contents).map_err(json_err)?;
    debug!(
        "Loaded {} symbols from {}",
        file.size_info.raw_symbols.len(),
        path.display()
    );
    Ok(file.size_info)
}
