//! `.supersize.toml` configuration
//!
//! Every key is optional; a missing file means defaults everywhere.

pub mod file;
pub mod loader;

pub use file::{ConfigFile, Knobs, ReportSettings, CONFIG_FILE_NAME, DEFAULT_APKANALYZER};
pub use loader::ConfigLoader;
