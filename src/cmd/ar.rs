//! Archive inspection commands
//!
//! Handles `supersize ar`, which lists the members of a `.a` file, and
//! `supersize expand-thin`, which replaces thin archives in a list of linker
//! inputs with the objects they reference.

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use std::path::Path;

use crate::ar;
use crate::error::SupersizeError;
use crate::fmt::{format_bytes, INFO};

#[derive(Serialize)]
struct MemberRow<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<usize>,
}

/// List the members of an archive
pub fn cmd_ar(archive: &Path, json: bool) -> Result<()> {
    if !archive.exists() {
        return Err(SupersizeError::FileNotFound {
            path: archive.to_path_buf(),
            operation: "ar".to_string(),
        }
        .into());
    }

    let chunks = ar::iter_archive_chunks(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    let thin = chunks.is_thin();
    let members = chunks
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read archive {}", archive.display()))?;

    if json {
        let rows: Vec<MemberRow> = members
            .iter()
            .map(|m| MemberRow {
                name: &m.name,
                size: m.payload.as_ref().map(Vec::len),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{} {} ({} archive, {} members)",
        INFO,
        style(archive.display()).bold(),
        if thin { "thin" } else { "regular" },
        members.len()
    );
    println!("{}", style("─".repeat(70)).dim());
    for member in &members {
        match &member.payload {
            Some(payload) => println!(
                "  {:>10}  {}",
                format_bytes(payload.len() as u64),
                member.name
            ),
            None => println!("  {:>10}  {}", style("(thin)").dim(), member.name),
        }
    }
    Ok(())
}

/// Print linker inputs with thin archives expanded, one path per line
pub fn cmd_expand_thin(output_directory: &Path, paths: &[String]) -> Result<()> {
    for line in expand_thin_lines(output_directory, paths)? {
        println!("{}", line);
    }
    Ok(())
}

fn expand_thin_lines(output_directory: &Path, paths: &[String]) -> Result<Vec<String>> {
    let (expanded, thin_archives) = ar::expand_thin_archives(paths, output_directory)
        .context("Failed to expand thin archives")?;
    log::info!(
        "Expanded {} thin archives: {:?}",
        thin_archives.len(),
        thin_archives
    );
    Ok(expanded)
}
