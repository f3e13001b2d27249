//! Archive command implementation
//!
//! Handles `supersize archive`, which measures an APK and/or native library
//! and writes a `.size` snapshot.

use anyhow::{Context, Result};
use console::style;
use std::env;
use std::path::Path;

use crate::archive::{ArchiveOptions, Archiver};
use crate::config::ConfigLoader;
use crate::error::SupersizeError;
use crate::file_format;
use crate::fmt::{MICROSCOPE, SPARKLES};
use crate::infra::CommandExecutor;
use crate::report::{self, SizeReport};

/// Create a `.size` snapshot
///
/// # Examples
///
/// ```no_run
/// use std::path::{Path, PathBuf};
/// use supersize::archive::ArchiveOptions;
/// use supersize::cmd::archive::cmd_archive;
///
/// let options = ArchiveOptions {
///     apk_path: Some(PathBuf::from("out/Release/apks/Chrome.apk")),
///     output_directory: Some(PathBuf::from("out/Release")),
///     ..Default::default()
/// };
/// cmd_archive(Path::new("chrome.size"), &options, false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn cmd_archive(size_file: &Path, options: &ArchiveOptions, json: bool) -> Result<()> {
    let config = ConfigLoader::load(&env::current_dir()?)?;
    let archiver = Archiver::new(&config);
    cmd_archive_impl(&archiver, size_file, options, config.report.top_n, json)
}

fn check_input(path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(SupersizeError::FileNotFound {
                path: path.to_path_buf(),
                operation: "archive".to_string(),
            }
            .into());
        }
    }
    Ok(())
}

pub(crate) fn cmd_archive_impl<CE: CommandExecutor>(
    archiver: &Archiver<CE>,
    size_file: &Path,
    options: &ArchiveOptions,
    top_n: usize,
    json: bool,
) -> Result<()> {
    if options.apk_path.is_none() && options.elf_path.is_none() && options.symbols_path.is_none()
    {
        return Err(SupersizeError::MissingInput {
            operation: "archive".to_string(),
            usage: "archive <SIZE_FILE> --apk-file <APK> [--output-directory <DIR>]".to_string(),
        }
        .into());
    }
    check_input(options.apk_path.as_deref())?;
    check_input(options.elf_path.as_deref())?;
    check_input(options.symbols_path.as_deref())?;

    if !json {
        println!("{} {} Creating size snapshot", MICROSCOPE, style("supersize").bold());
    }

    let size_info = archiver
        .create_size_info(options)
        .map_err(SupersizeError::from)?;

    file_format::save_size_info(&size_info, size_file).map_err(|source| {
        SupersizeError::InvalidSizeFile {
            path: size_file.to_path_buf(),
            source,
        }
    })?;

    let summary = SizeReport::new(&size_info, top_n);
    if json {
        println!("{}", report::format_json_report(&summary)?);
    } else {
        print!(
            "{}",
            report::format_size_report(&summary).context("Failed to format size report")?
        );
        println!(
            "{} Wrote {}",
            SPARKLES,
            style(size_file.display()).cyan().bold()
        );
    }
    Ok(())
}
