//! Command handlers for the supersize CLI
//!
//! Each submodule handles one CLI command (or a pair of closely related ones).

pub mod ar;
pub mod archive;
pub mod completions;
pub mod dex;
pub mod diff;
pub mod init;
pub mod sources;
pub mod tools;

pub use ar::{cmd_ar, cmd_expand_thin};
pub use archive::cmd_archive;
pub use completions::cmd_completions;
pub use dex::{cmd_dex, cmd_method_count};
pub use diff::cmd_diff;
pub use init::cmd_init;
pub use sources::cmd_sources;
pub use tools::cmd_tools;
