//! Common test utilities and helpers
//!
//! Shared fixture builders for the integration tests: ar archives, APKs,
//! dex headers, symbol dumps and ninja build directories.
//!
//! # Usage
//!
//! ```rust,no_run
//! mod common;
//! use common::fixtures;
//!
//! let out = fixtures::create_build_dir().unwrap();
//! ```

pub mod fixtures;

/// Check if running in CI environment
#[allow(dead_code)]
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok() || std::env::var("GITHUB_ACTIONS").is_ok()
}
