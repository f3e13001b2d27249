//! Diff command implementation
//!
//! Handles `supersize diff`, which compares two `.size` snapshots symbol by
//! symbol.

use anyhow::{Context, Result};
use console::style;
use std::env;
use std::path::Path;

use crate::config::ConfigLoader;
use crate::diff;
use crate::error::SupersizeError;
use crate::file_format;
use crate::fmt::CHART;
use crate::models::SizeInfo;
use crate::report::{self, DiffReport};

/// Compare two snapshots
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use supersize::cmd::diff::cmd_diff;
///
/// cmd_diff(Path::new("before.size"), Path::new("after.size"), None, false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
///
/// # Errors
///
/// Returns an error if either file is missing or is not a valid snapshot.
pub fn cmd_diff(before: &Path, after: &Path, top_n: Option<usize>, json: bool) -> Result<()> {
    let top_n = match top_n {
        Some(n) => n,
        None => ConfigLoader::load(&env::current_dir()?)?.report.top_n,
    };
    cmd_diff_impl(before, after, top_n, json)
}

fn load(path: &Path) -> Result<SizeInfo> {
    if !path.exists() {
        return Err(SupersizeError::FileNotFound {
            path: path.to_path_buf(),
            operation: "diff".to_string(),
        }
        .into());
    }
    file_format::load_size_info(path).map_err(|source| {
        SupersizeError::InvalidSizeFile {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn cmd_diff_impl(before: &Path, after: &Path, top_n: usize, json: bool) -> Result<()> {
    let before_info = load(before)?;
    let after_info = load(after)?;

    let delta = diff::diff(&before_info, &after_info);
    let summary = DiffReport::new(&delta, top_n);

    if json {
        println!("{}", report::format_json_report(&summary)?);
    } else {
        println!(
            "{} {} {} → {}",
            CHART,
            style("supersize diff").bold(),
            style(before.display()).dim(),
            style(after.display()).dim()
        );
        print!(
            "{}",
            report::format_diff_report(&summary).context("Failed to format diff report")?
        );
    }
    Ok(())
}
