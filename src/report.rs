//! Console and JSON reports for snapshots and diffs

use crate::diff::AGGREGATE_PADDING_NAME;
use crate::fmt::{format_bytes, format_delta_bytes, format_number, percent, styled_delta, truncate_str};
use crate::models::{DeltaSizeInfo, DiffStatus, Metadata, SizeInfo, StatusCounts};
use console::style;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

const NAME_WIDTH: usize = 60;

/// One row of a symbol table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSummary {
    /// Section
    pub section_name: String,
    /// Full name
    pub full_name: String,
    /// Size including padding
    pub size: i64,
    /// Padding part of `size`
    pub padding: i64,
    /// Normalized object path
    #[serde(skip_serializing_if = "String::is_empty")]
    pub object_path: String,
    /// Normalized source path
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_path: String,
}

/// Summary of one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeReport {
    /// Bytes on disk (`.bss` excluded)
    pub file_size: i64,
    /// Number of symbols
    pub symbol_count: usize,
    /// Section sizes
    pub section_sizes: BTreeMap<String, i64>,
    /// Largest symbols first
    pub top_symbols: Vec<SymbolSummary>,
    /// Build facts
    pub metadata: Metadata,
}

impl SizeReport {
    /// Summarize `size_info`, listing the `top_n` largest symbols
    pub fn new(size_info: &SizeInfo, top_n: usize) -> Self {
        let top_symbols = size_info
            .raw_symbols
            .sorted_by_size()
            .iter()
            .take(top_n)
            .map(|s| SymbolSummary {
                section_name: s.section_name.clone(),
                full_name: s.full_name.clone(),
                size: s.size,
                padding: s.padding,
                object_path: s.object_path.clone(),
                source_path: s.source_path.clone(),
            })
            .collect();
        Self {
            file_size: size_info.file_size(),
            symbol_count: size_info.raw_symbols.len(),
            section_sizes: size_info.section_sizes.clone(),
            top_symbols,
            metadata: size_info.metadata.clone(),
        }
    }
}

/// One row of a change table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeSummary {
    /// How the symbol changed
    pub status: DiffStatus,
    /// Section
    pub section_name: String,
    /// Full name
    pub full_name: String,
    /// Size before, if it existed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_size: Option<i64>,
    /// Size after, if it exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_size: Option<i64>,
    /// Size change
    pub delta: i64,
}

/// Summary of a diff
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    /// Change in bytes on disk
    pub file_size_delta: i64,
    /// Sum of all symbol deltas
    pub symbol_size_delta: i64,
    /// Section size changes
    pub section_deltas: BTreeMap<String, i64>,
    /// Symbols per status
    pub counts: StatusCounts,
    /// Padding changes of matched symbols
    pub padding_delta: i64,
    /// Largest changes first
    pub top_changes: Vec<ChangeSummary>,
    /// Build facts of the old snapshot
    pub before_metadata: Metadata,
    /// Build facts of the new snapshot
    pub after_metadata: Metadata,
}

impl DiffReport {
    /// Summarize `delta`, listing the `top_n` largest changes
    pub fn new(delta: &DeltaSizeInfo, top_n: usize) -> Self {
        let padding_delta = delta
            .symbols
            .iter()
            .filter(|d| d.full_name() == AGGREGATE_PADDING_NAME)
            .map(|d| d.size())
            .sum();
        let top_changes = delta
            .symbols
            .changes_by_size()
            .into_iter()
            .take(top_n)
            .map(|d| ChangeSummary {
                status: d.diff_status(),
                section_name: d.section_name().to_string(),
                full_name: d.full_name().to_string(),
                before_size: d.before().map(|s| s.size),
                after_size: d.after().map(|s| s.size),
                delta: d.size(),
            })
            .collect();
        Self {
            file_size_delta: delta.file_size_delta(),
            symbol_size_delta: delta.symbols.total_size(),
            section_deltas: delta.section_sizes.clone(),
            counts: delta.symbols.status_counts(),
            padding_delta,
            top_changes,
            before_metadata: delta.before_metadata.clone(),
            after_metadata: delta.after_metadata.clone(),
        }
    }
}

fn write_metadata(output: &mut String, metadata: &Metadata, indent: &str) -> fmt::Result {
    let fields = [
        ("Git revision", metadata.git_revision.clone()),
        ("APK", metadata.apk_file_name.clone()),
        ("APK size", metadata.apk_size.map(format_bytes)),
        ("ELF", metadata.elf_file_name.clone()),
        ("Symbols", metadata.symbols_file_name.clone()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            writeln!(output, "{}{}: {}", indent, style(label).bold(), value)?;
        }
    }
    if !metadata.gn_args.is_empty() {
        writeln!(
            output,
            "{}{}: {}",
            indent,
            style("GN args").bold(),
            metadata.gn_args.join(" ")
        )?;
    }
    Ok(())
}

/// Format a snapshot summary for the console
pub fn format_size_report(report: &SizeReport) -> Result<String, fmt::Error> {
    let mut output = String::new();

    writeln!(output, "\n{}", style("Binary Size Analysis").bold().underlined())?;
    writeln!(
        output,
        "   Total Size: {} ({} bytes)",
        style(format_bytes(report.file_size.max(0) as u64)).cyan(),
        format_number(report.file_size)
    )?;
    writeln!(
        output,
        "   Symbols: {}",
        style(format_number(report.symbol_count as i64)).cyan()
    )?;
    write_metadata(&mut output, &report.metadata, "   ")?;

    writeln!(output, "\n{}", style("SECTIONS:").bold())?;
    writeln!(output, "{}", style("─".repeat(70)).dim())?;
    for (section, size) in &report.section_sizes {
        writeln!(
            output,
            "   {:<22} {:>14} {:>6.1}%",
            section,
            format_number(*size),
            percent(*size, report.file_size)
        )?;
    }

    if !report.top_symbols.is_empty() {
        writeln!(
            output,
            "\n{}",
            style(format!("TOP {} SYMBOLS:", report.top_symbols.len())).bold()
        )?;
        writeln!(output, "{}", style("─".repeat(70)).dim())?;
        for (i, symbol) in report.top_symbols.iter().enumerate() {
            writeln!(
                output,
                "  {:3}. {:>12}  {:<14} {}",
                i + 1,
                style(format_bytes(symbol.size.max(0) as u64)).cyan().bold(),
                symbol.section_name,
                style(truncate_str(&symbol.full_name, NAME_WIDTH)).dim()
            )?;
        }
    }

    output.push('\n');
    Ok(output)
}

/// Format a diff summary for the console
pub fn format_diff_report(report: &DiffReport) -> Result<String, fmt::Error> {
    let mut output = String::new();

    writeln!(output, "\n{}", style("Binary Size Diff").bold().underlined())?;
    writeln!(
        output,
        "   File size: {} ({} bytes)",
        styled_delta(report.file_size_delta),
        format_number(report.file_size_delta)
    )?;
    writeln!(
        output,
        "   Symbols: {} added, {} removed, {} changed, {} unchanged",
        style(report.counts.added).red(),
        style(report.counts.removed).green(),
        style(report.counts.changed).yellow(),
        style(report.counts.unchanged).dim()
    )?;
    if report.padding_delta != 0 {
        writeln!(
            output,
            "   Padding of matched symbols: {}",
            format_delta_bytes(report.padding_delta)
        )?;
    }
    if report.before_metadata.git_revision.is_some() || report.after_metadata.git_revision.is_some()
    {
        writeln!(output, "   {}", style("Before").bold())?;
        write_metadata(&mut output, &report.before_metadata, "     ")?;
        writeln!(output, "   {}", style("After").bold())?;
        write_metadata(&mut output, &report.after_metadata, "     ")?;
    }

    let changed_sections: Vec<_> = report
        .section_deltas
        .iter()
        .filter(|(_, delta)| **delta != 0)
        .collect();
    if !changed_sections.is_empty() {
        writeln!(output, "\n{}", style("SECTION CHANGES:").bold())?;
        writeln!(output, "{}", style("─".repeat(70)).dim())?;
        for (section, delta) in changed_sections {
            writeln!(output, "   {:<22} {:>14}", section, styled_delta(*delta))?;
        }
    }

    let changes: Vec<_> = report.top_changes.iter().filter(|c| c.delta != 0).collect();
    if !changes.is_empty() {
        writeln!(
            output,
            "\n{}",
            style(format!("TOP {} CHANGES:", changes.len())).bold()
        )?;
        writeln!(output, "{}", style("─".repeat(70)).dim())?;
        for change in changes {
            let marker = match change.status {
                DiffStatus::Added => style("+").red(),
                DiffStatus::Removed => style("-").green(),
                DiffStatus::Changed => style("~").yellow(),
                DiffStatus::Unchanged => style("=").dim(),
            };
            writeln!(
                output,
                "   {} {:>12}  {:<14} {}",
                marker,
                styled_delta(change.delta),
                change.section_name,
                truncate_str(&change.full_name, NAME_WIDTH)
            )?;
        }
    } else {
        writeln!(output, "\n   {}", style("No symbol changes").dim())?;
    }

    output.push('\n');
    Ok(output)
}

/// Serialize any report as pretty JSON
pub fn format_json_report<T: Serialize>(report: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
