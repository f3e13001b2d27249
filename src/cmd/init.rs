//! Init command implementation
//!
//! Handles `supersize init`, which writes a `.supersize.toml` holding the
//! default settings so they can be edited.

use anyhow::Result;
use console::style;
use std::env;
use std::path::Path;

use crate::config::{self, ConfigFile};
use crate::fmt::{CHECKMARK, INFO, SPARKLES, WARNING};

/// Write the default configuration to the current directory
///
/// # Examples
///
/// ```no_run
/// use supersize::cmd::init::cmd_init;
///
/// cmd_init()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn cmd_init() -> Result<()> {
    cmd_init_impl(&env::current_dir()?)
}

fn cmd_init_impl(project_root: &Path) -> Result<()> {
    println!("{} {} Initializing supersize", SPARKLES, style("supersize init").bold());
    println!();

    if config::ConfigLoader::exists(project_root) {
        println!(
            "{} Config file already exists: {}",
            WARNING,
            style(config::CONFIG_FILE_NAME).cyan()
        );
        println!("   Delete it first or edit manually to update.");
        return Ok(());
    }

    let defaults = ConfigFile::default();
    config::ConfigLoader::save(&defaults, project_root)?;

    println!(
        "{} Created {}",
        CHECKMARK,
        style(config::CONFIG_FILE_NAME).cyan().bold()
    );
    println!();
    println!("{}  Settings:", INFO);
    println!(
        "   {} apkanalyzer = {}",
        style("•").dim(),
        style(defaults.apkanalyzer_binary()).green()
    );
    println!(
        "   {} knobs.max-unmatched-paths-to-log = {}",
        style("•").dim(),
        style(defaults.knobs.max_unmatched_paths_to_log).green()
    );
    println!(
        "   {} knobs.text-padding-warning = {}",
        style("•").dim(),
        style(defaults.knobs.text_padding_warning).green()
    );
    println!(
        "   {} knobs.data-padding-warning = {}",
        style("•").dim(),
        style(defaults.knobs.data_padding_warning).green()
    );
    println!(
        "   {} report.top-n = {}",
        style("•").dim(),
        style(defaults.report.top_n).green()
    );
    println!();
    println!("{}  Next Steps:", style("💡").bold());
    println!(
        "   1. Point {} at your Android SDK's apkanalyzer if it is not on PATH",
        style("apkanalyzer").cyan()
    );
    println!(
        "   2. Run {} to check external tools",
        style("supersize tools").cyan()
    );
    println!(
        "   3. Run {} to create a snapshot",
        style("supersize archive out.size --apk-file <APK>").cyan()
    );

    Ok(())
}
