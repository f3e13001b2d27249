//! Enhanced error types with contextual suggestions
//!
//! Provides structured error types that include:
//! - Actionable error messages
//! - Suggested fixes
//! - Documentation links
//! - sysexits-style exit codes for scripts
//!
//! # Examples
//!
//! ```no_run
//! use supersize::archive::{ArchiveOptions, Archiver};
//! use supersize::config::ConfigFile;
//! use supersize::error::SupersizeError;
//!
//! let archiver = Archiver::new(&ConfigFile::default());
//! match archiver.create_size_info(&ArchiveOptions::default()) {
//!     Ok(size_info) => println!("{} symbols", size_info.raw_symbols.len()),
//!     Err(e) => {
//!         let e = SupersizeError::from(e);
//!         eprintln!("{}", e);
//!         std::process::exit(e.exit_code());
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::file_format::FileFormatError;

const README_URL: &str =
    "https://chromium.googlesource.com/chromium/src/+/main/tools/binary_size/README.md";

/// Errors surfaced to the user with suggestions and exit codes
#[derive(Error, Debug)]
pub enum SupersizeError {
    /// Required tool is not installed
    #[error("Tool not installed: {tool}")]
    ToolMissing {
        /// Tool name
        tool: String,
        /// How to get it
        install_hint: String,
        /// Optional documentation URL
        docs_url: Option<String>,
    },

    /// `.supersize.toml` exists but is unusable
    #[error("Invalid configuration in {}: {reason}", path.display())]
    InvalidConfig {
        /// Path to config file
        path: PathBuf,
        /// What is wrong
        reason: String,
    },

    /// Input file does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// Path to missing file
        path: PathBuf,
        /// Operation that required the file
        operation: String,
    },

    /// Command invoked without the inputs it needs
    #[error("Missing input for {operation}")]
    MissingInput {
        /// Operation lacking input
        operation: String,
        /// Correct invocation
        usage: String,
    },

    /// A `.size` file could not be loaded or written
    #[error("Size file error: {}", path.display())]
    InvalidSizeFile {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: FileFormatError,
    },

    /// Snapshot creation failed
    #[error("Failed to create size snapshot")]
    Archive(#[from] ArchiveError),

    /// Generic I/O error with context
    #[error("I/O error: {context}")]
    Io {
        /// Context about where the error occurred
        context: String,
        /// IO error source
        #[source]
        source: std::io::Error,
    },
}

impl SupersizeError {
    /// Get actionable suggestion for resolving this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use supersize::error::SupersizeError;
    ///
    /// let error = SupersizeError::ToolMissing {
    ///     tool: "apkanalyzer".to_string(),
    ///     install_hint: "sdkmanager \"cmdline-tools;latest\"".to_string(),
    ///     docs_url: None,
    /// };
    ///
    /// assert!(error.suggestion().unwrap().contains("sdkmanager"));
    /// ```
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ToolMissing { install_hint, .. } => {
                Some(format!("Install with: {}", install_hint))
            }
            Self::InvalidConfig { path, .. } => Some(format!(
                "Fix {} or delete it and run 'supersize init' to write the defaults",
                path.display()
            )),
            Self::FileNotFound { path, operation } => Some(format!(
                "Ensure {} exists before running {}",
                path.display(),
                operation
            )),
            Self::MissingInput { usage, .. } => Some(format!("Usage: supersize {}", usage)),
            Self::InvalidSizeFile { source, .. } => match source {
                FileFormatError::BadExtension(_) => {
                    Some("Size files must use the .size extension".to_string())
                }
                FileFormatError::UnsupportedVersion { .. } => Some(
                    "Recreate the file with this version of 'supersize archive'".to_string(),
                ),
                _ => Some("Create the file with 'supersize archive'".to_string()),
            },
            Self::Archive(e) => Some(match e {
                ArchiveError::NoInputs => {
                    "Pass at least one of --apk-file, --elf-file or --symbols-file".to_string()
                }
                ArchiveError::ElfWithoutSymbols => {
                    "Pass --symbols-file with the symbol dump of the ELF".to_string()
                }
                ArchiveError::MissingLinkCommand(_) => {
                    "Check that --output-directory is the build directory that linked the ELF"
                        .to_string()
                }
                ArchiveError::ApkAnalyzer(_) => {
                    "Run 'supersize tools' to check that apkanalyzer works".to_string()
                }
                ArchiveError::NegativeElfOverhead(_) => {
                    "The symbols file does not describe this ELF; regenerate one of them"
                        .to_string()
                }
                _ => "Check that the inputs come from the same build".to_string(),
            }),
            Self::Io { context, .. } => Some(format!(
                "Check file permissions and that {} is accessible",
                context
            )),
        }
    }

    /// Get documentation URL for this error.
    pub fn docs_url(&self) -> Option<&str> {
        match self {
            Self::ToolMissing { docs_url, .. } => docs_url.as_deref(),
            Self::Archive(_) | Self::MissingInput { .. } => Some(README_URL),
            _ => None,
        }
    }

    /// Get appropriate exit code for this error.
    ///
    /// Follows sysexits.h conventions.
    ///
    /// # Examples
    ///
    /// ```
    /// use supersize::error::SupersizeError;
    ///
    /// let error = SupersizeError::MissingInput {
    ///     operation: "archive".to_string(),
    ///     usage: "archive out.size --apk-file app.apk".to_string(),
    /// };
    /// assert_eq!(error.exit_code(), 64);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ToolMissing { .. } => 127, // Command not found
            Self::InvalidConfig { .. } => 65, // EX_DATAERR
            Self::FileNotFound { .. } => 66, // EX_NOINPUT
            Self::MissingInput { .. } => 64, // EX_USAGE
            Self::InvalidSizeFile { source, .. } => match source {
                FileFormatError::Io { .. } => 74,
                _ => 65,
            },
            Self::Archive(e) => match e {
                ArchiveError::NoInputs | ArchiveError::ElfWithoutSymbols => 64,
                ArchiveError::Io { .. } => 74,
                ArchiveError::ApkAnalyzer(_) => 1,
                _ => 65,
            },
            Self::Io { .. } => 74, // EX_IOERR
        }
    }
}

/// Error formatter with colors and structured output
pub struct ErrorFormatter;

impl ErrorFormatter {
    /// Format error with suggestions and documentation links
    pub fn format(error: &anyhow::Error) -> String {
        use console::style;

        let mut output = String::new();

        output.push_str(&format!("{} {}\n", style("error:").red().bold(), error));

        let mut source = error.source();
        let mut indent = 1;
        while let Some(err) = source {
            output.push_str(&format!(
                "{}{} {}\n",
                "  ".repeat(indent),
                style("caused by:").yellow(),
                err
            ));
            source = err.source();
            indent += 1;
        }

        if let Some(ss_error) = error.downcast_ref::<SupersizeError>() {
            if let Some(suggestion) = ss_error.suggestion() {
                output.push_str(&format!(
                    "\n{} {}\n",
                    style("help:").cyan().bold(),
                    suggestion
                ));
            }

            if let Some(docs) = ss_error.docs_url() {
                output.push_str(&format!("{} {}\n", style("docs:").blue(), docs));
            }
        }

        output
    }

    /// Get exit code from error
    pub fn exit_code(error: &anyhow::Error) -> i32 {
        if let Some(ss_error) = error.downcast_ref::<SupersizeError>() {
            ss_error.exit_code()
        } else {
            1
        }
    }
}
