//! Completions command implementation
//!
//! Handles `supersize completions`, which prints a shell completion script.

use clap::Command;
use clap_complete::{generate, Shell};
use std::io::Write;

/// Generate shell completion scripts
///
/// # Examples
///
/// ```bash
/// # Bash
/// supersize completions bash > /etc/bash_completion.d/supersize
///
/// # Zsh
/// supersize completions zsh > ~/.zfunc/_supersize
///
/// # Fish
/// supersize completions fish > ~/.config/fish/completions/supersize.fish
/// ```
pub fn cmd_completions(shell: Shell, cmd: &mut Command) {
    write_completions(shell, cmd, &mut std::io::stdout());
}

fn write_completions(shell: Shell, cmd: &mut Command, out: &mut dyn Write) {
    let bin_name = cmd.get_name().to_string();
    generate(shell, cmd, bin_name, out);
}
