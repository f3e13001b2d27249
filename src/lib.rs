#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! supersize library
//!
//! Measures Android APKs and native libraries symbol by symbol, attributes
//! every byte to the source file that produced it, and diffs two snapshots.
//! It can be used programmatically in addition to the CLI interface.
//!
//! # Basic Example
//!
//! Diffing two in-memory snapshots:
//!
//! ```
//! use std::collections::BTreeMap;
//! use supersize::diff::diff;
//! use supersize::models::symbol::SECTION_TEXT;
//! use supersize::models::{Metadata, SizeInfo, Symbol, SymbolGroup};
//!
//! let snapshot = |size| {
//!     SizeInfo::new(
//!         BTreeMap::from([(SECTION_TEXT.to_string(), size)]),
//!         SymbolGroup::new(vec![Symbol::new(SECTION_TEXT, "main", size)]),
//!         Metadata::default(),
//!     )
//! };
//!
//! let delta = diff(&snapshot(10), &snapshot(12));
//! assert_eq!(delta.symbols.len(), 1);
//! assert_eq!(delta.symbols.total_size(), 2);
//! ```
//!
//! # Advanced Example: Source Attribution
//!
//! Mapping object files back to sources with the build's ninja files:
//!
//! ```
//! use std::fs;
//! use supersize::ninja;
//! use tempfile::TempDir;
//!
//! let out = TempDir::new().unwrap();
//! fs::write(out.path().join("build.ninja"), "build obj/foo.o: cxx ../../foo.cc\n").unwrap();
//!
//! let (mut mapper, _) = ninja::parse(out.path(), None).unwrap();
//! assert_eq!(mapper.find_source_for_path("obj/foo.o").as_deref(), Some("../../foo.cc"));
//! ```

/// APK (zip) entry listing
pub mod apk;
/// Dex size attribution through apkanalyzer
pub mod apkanalyzer;
/// `ar` archive parsing and thin archive expansion
pub mod ar;
/// Snapshot creation from build outputs
pub mod archive;
/// Command handlers for CLI operations
pub mod cmd;
/// Configuration file management
pub mod config;
/// Dex header parsing and method counting
pub mod dex;
/// Symbol matching between snapshots
pub mod diff;
/// Enhanced error types with contextual suggestions
pub mod error;
/// `.size` snapshot files
pub mod file_format;
/// Shared formatting utilities
pub mod fmt;
/// Git metadata utilities
pub mod git;
/// Infrastructure traits for filesystem and command execution
pub mod infra;
/// Snapshot data model
pub mod models;
/// Ninja build file parsing
pub mod ninja;
/// Path string helpers
pub mod paths;
/// Console and JSON reports
pub mod report;
/// Tool detection and version checking
pub mod tools;
