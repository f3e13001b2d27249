//! Sources command implementation
//!
//! Handles `supersize sources`, which maps object paths to the source files
//! that produced them using the build's ninja files.

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::fmt::{format_number, INFO, WARNING};
use crate::ninja;

/// Resolve object paths to source paths.
///
/// With no `paths`, lists every `.o` and `.a` output the build knows about.
/// With an `elf_file`, also prints the inputs of its link statement.
pub fn cmd_sources(output_directory: &Path, elf_file: Option<&Path>, paths: &[String]) -> Result<()> {
    let (mut mapper, elf_inputs) = ninja::parse(output_directory, elf_file).with_context(|| {
        format!(
            "Failed to parse ninja files in {}",
            output_directory.display()
        )
    })?;

    println!(
        "{} Parsed {} .ninja files",
        INFO,
        style(mapper.parsed_file_count()).cyan()
    );

    if let Some(elf_file) = elf_file {
        match &elf_inputs {
            Some(inputs) => {
                println!(
                    "\n{} ({} link inputs)",
                    style(elf_file.display()).bold(),
                    format_number(inputs.len() as i64)
                );
                for input in inputs {
                    println!("  {}", input);
                }
            }
            None => println!(
                "\n{} No link statement found for {}",
                WARNING,
                style(elf_file.display()).yellow()
            ),
        }
    }

    if paths.is_empty() {
        if elf_file.is_none() {
            for path in mapper.iter_all_paths() {
                println!("{}", path);
            }
        }
        return Ok(());
    }

    println!();
    for (path, source) in resolve_paths(&mut mapper, paths) {
        match source {
            Some(source) => println!("{} → {}", path, style(source).green()),
            None => println!("{} → {}", path, style("(not found)").red()),
        }
    }
    if mapper.unmatched_paths_count() > 0 {
        println!(
            "\n{} {} paths could not be resolved",
            WARNING,
            mapper.unmatched_paths_count()
        );
    }
    Ok(())
}

fn resolve_paths<'a>(
    mapper: &mut ninja::SourceMapper,
    paths: &'a [String],
) -> Vec<(&'a str, Option<String>)> {
    paths
        .iter()
        .map(|path| (path.as_str(), mapper.find_source_for_path(path)))
        .collect()
}
