//! Tools command implementation
//!
//! Handles `supersize tools`, which checks that the external programs the
//! other commands shell out to are available.

use anyhow::Result;
use std::env;

use crate::config::ConfigLoader;
use crate::error::SupersizeError;
use crate::tools::{ToolChain, ToolError};

const APKANALYZER_INSTALL: &str = "sdkmanager \"cmdline-tools;latest\" (then add cmdline-tools/latest/bin to PATH or set apkanalyzer in .supersize.toml)";
const APKANALYZER_DOCS: &str = "https://developer.android.com/tools/apkanalyzer";

/// Check external tools and report their versions
pub fn cmd_tools() -> Result<()> {
    let config = ConfigLoader::load(&env::current_dir()?)?;
    let toolchain = ToolChain::new(config.apkanalyzer_binary());
    toolchain.check_all().map_err(into_supersize_error)
}

fn into_supersize_error(error: ToolError) -> anyhow::Error {
    match error {
        ToolError::MissingTool(tool) => SupersizeError::ToolMissing {
            tool,
            install_hint: APKANALYZER_INSTALL.to_string(),
            docs_url: Some(APKANALYZER_DOCS.to_string()),
        }
        .into(),
        other => other.into(),
    }
}
