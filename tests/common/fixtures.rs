//! Test fixture helpers
//!
//! Builds the on-disk inputs supersize reads: archives, zips, dex files,
//! symbol dumps and build directories.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Re-export anyhow for convenience
pub use anyhow;

/// Build an ar archive in memory. Thin archives store names in the `//`
/// table and no member data.
pub fn build_archive(thin: bool, members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(if thin { b"!<thin>\n" } else { b"!<arch>\n" });

    let mut name_table = Vec::new();
    let mut names = Vec::new();
    for (name, _) in members {
        if thin || name.len() > 15 {
            names.push(format!("/{}", name_table.len()));
            name_table.extend_from_slice(name.as_bytes());
            name_table.extend_from_slice(b"/\n");
        } else {
            names.push(format!("{}/", name));
        }
    }

    push_member(&mut out, "/", &[0, 0, 0, 0], true);
    if !name_table.is_empty() {
        push_member(&mut out, "//", &name_table, true);
    }
    for (name, (_, data)) in names.iter().zip(members) {
        push_member(&mut out, name, data, !thin);
    }
    out
}

fn push_member(out: &mut Vec<u8>, name: &str, data: &[u8], embed: bool) {
    out.extend_from_slice(
        format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
            name,
            0,
            0,
            0,
            644,
            data.len()
        )
        .as_bytes(),
    );
    if embed {
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(b'\n');
        }
    }
}

/// A 0x70-byte dex header with the given id counts
pub fn fake_dex(strings: u32, types: u32, protos: u32, fields: u32, methods: u32, classes: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; 0x70];
    bytes[..8].copy_from_slice(b"dex\n035\0");
    for (offset, value) in [
        (32, 0x70),
        (56, strings),
        (64, types),
        (72, protos),
        (80, fields),
        (88, methods),
        (96, classes),
    ] {
        bytes[offset..offset + 4].copy_from_slice(&u32::to_le_bytes(value));
    }
    bytes
}

/// Write a zip with stored (uncompressed) entries
pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) -> anyhow::Result<()> {
    let mut zip = ZipWriter::new(fs::File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}

/// A symbol dump for a tiny native library
pub fn symbols_dump(symbols: &[(&str, &str, i64, u64)]) -> String {
    let mut section_sizes = std::collections::BTreeMap::<&str, i64>::new();
    let entries: Vec<serde_json::Value> = symbols
        .iter()
        .map(|(section, name, size, address)| {
            *section_sizes.entry(section).or_insert(0) += size;
            serde_json::json!({
                "section_name": section,
                "full_name": name,
                "size": size,
                "address": address,
                "object_path": "obj/base/base.o",
            })
        })
        .collect();
    serde_json::json!({ "section_sizes": section_sizes, "symbols": entries }).to_string()
}

/// Write a symbol dump into `dir` and return its path
pub fn write_symbols_dump(dir: &Path, name: &str, symbols: &[(&str, &str, i64, u64)]) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, symbols_dump(symbols))?;
    Ok(path)
}

/// A build directory with a ninja file, a thin archive and its objects
///
/// # Returns
///
/// The TempDir, which must be kept alive
pub fn create_build_dir() -> anyhow::Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let out = temp_dir.path();

    fs::create_dir_all(out.join("obj/base"))?;
    fs::write(
        out.join("build.ninja"),
        "subninja toolchain.ninja\n\
         build obj/base/a.o: cxx ../../base/a.cc\n\
         build obj/base/b.o: cxx ../../base/b.cc\n\
         build obj/base/libbase.a: alink obj/base/a.o obj/base/b.o\n\
         build libmain.so: solink obj/base/libbase.a\n",
    )?;
    fs::write(out.join("toolchain.ninja"), "rule cxx\n  command = clang++\n")?;
    fs::write(
        out.join("obj/base/libbase.a"),
        build_archive(true, &[("a.o", b""), ("b.o", b"")]),
    )?;
    Ok(temp_dir)
}
