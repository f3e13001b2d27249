//! Dex commands
//!
//! Handles `supersize dex`, which attributes an APK's dex bytes to classes
//! and methods through apkanalyzer, and `supersize method-count`, which reads
//! dex headers directly.

use anyhow::{Context, Result};
use console::style;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::apkanalyzer::ApkAnalyzer;
use crate::config::ConfigLoader;
use crate::dex::{self, MethodCountReport};
use crate::error::SupersizeError;
use crate::fmt::{format_bytes, format_number, CHART};
use crate::infra::CommandExecutor;
use crate::models::{Metadata, SizeInfo, SymbolGroup};
use crate::report::{self, SizeReport};

fn require_file(path: &Path, operation: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(SupersizeError::FileNotFound {
            path: path.to_path_buf(),
            operation: operation.to_string(),
        }
        .into())
    }
}

/// Report dex symbols of an APK
pub fn cmd_dex(apk: &Path, output_directory: Option<&Path>, json: bool) -> Result<()> {
    let config = ConfigLoader::load(&env::current_dir()?)?;
    let analyzer = ApkAnalyzer::new(config.apkanalyzer_binary(), config.java_home.clone());
    cmd_dex_impl(&analyzer, apk, output_directory, config.report.top_n, json)
}

fn cmd_dex_impl<CE: CommandExecutor>(
    analyzer: &ApkAnalyzer<CE>,
    apk: &Path,
    output_directory: Option<&Path>,
    top_n: usize,
    json: bool,
) -> Result<()> {
    require_file(apk, "dex")?;

    let symbols = analyzer
        .create_dex_symbols(apk, output_directory)
        .with_context(|| format!("Failed to attribute dex bytes of {}", apk.display()))?;

    let mut section_sizes = BTreeMap::new();
    for symbol in &symbols {
        *section_sizes.entry(symbol.section_name.clone()).or_insert(0) += symbol.size;
    }
    let size_info = SizeInfo::new(
        section_sizes,
        SymbolGroup::new(symbols),
        Metadata {
            apk_file_name: Some(apk.display().to_string()),
            ..Default::default()
        },
    );

    let summary = SizeReport::new(&size_info, top_n);
    if json {
        println!("{}", report::format_json_report(&summary)?);
    } else {
        print!(
            "{}",
            report::format_size_report(&summary).context("Failed to format dex report")?
        );
    }
    Ok(())
}

/// Count methods and other dex ids in a `.dex` file or zip container
pub fn cmd_method_count(file: &Path, json: bool) -> Result<()> {
    require_file(file, "method-count")?;

    let counts = dex::count_methods(file)
        .with_context(|| format!("Failed to read dex files from {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        print_method_count_report(&counts);
    }
    Ok(())
}

fn print_method_count_report(counts: &MethodCountReport) {
    println!("\n{} {}", CHART, style("Dex Method Counts").bold().underlined());
    println!("{}", style("─".repeat(70)).dim());
    println!(
        "   {:<30} {:>10} {:>10} {:>10} {:>8}",
        style("File").bold(),
        style("Methods").bold(),
        style("Fields").bold(),
        style("Strings").bold(),
        style("Classes").bold()
    );
    for file in &counts.files {
        println!(
            "   {:<30} {:>10} {:>10} {:>10} {:>8}",
            file.name,
            format_number(file.header.method_ids.into()),
            format_number(file.header.field_ids.into()),
            format_number(file.header.string_ids.into()),
            format_number(file.header.class_defs.into())
        );
    }
    println!("{}", style("─".repeat(70)).dim());
    println!(
        "   {:<30} {:>10} {:>10} {:>10} {:>8}",
        style("Total").bold(),
        style(format_number(counts.total.method_ids.into())).cyan(),
        format_number(counts.total.field_ids.into()),
        format_number(counts.total.string_ids.into()),
        format_number(counts.total.class_defs.into())
    );
    println!();
    println!(
        "   Id tables: {}   DexCache: {}",
        format_bytes(counts.id_table_size),
        format_bytes(counts.dex_cache_size)
    );
}
