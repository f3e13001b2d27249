//! Shared formatting utilities for size display and console output

use console::{style, Emoji, StyledObject};

/// Wrench emoji for tool operations
pub const WRENCH: Emoji = Emoji("🔧 ", "*");

/// Checkmark emoji for success
pub const CHECKMARK: Emoji = Emoji("✅ ", "[OK]");

/// Crossmark emoji for failure
pub const CROSSMARK: Emoji = Emoji("❌ ", "[FAIL]");

/// Sparkles emoji for completion/success
pub const SPARKLES: Emoji = Emoji("✨ ", "*");

/// Info emoji for informational messages
pub const INFO: Emoji = Emoji("ℹ️ ", "i");

/// Chart emoji for metrics/statistics
pub const CHART: Emoji = Emoji("📊 ", "~");

/// Microscope emoji for analysis/inspection
pub const MICROSCOPE: Emoji = Emoji("🔍 ", ">>");

/// Warning emoji for caution/alerts
pub const WARNING: Emoji = Emoji("⚠️ ", "!");

/// Format bytes as human-readable size string
///
/// # Examples
///
/// ```
/// use supersize::fmt::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1_048_576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a size change with an explicit sign
///
/// # Examples
///
/// ```
/// use supersize::fmt::format_delta_bytes;
///
/// assert_eq!(format_delta_bytes(2048), "+2.00 KB");
/// assert_eq!(format_delta_bytes(-12), "-12 B");
/// assert_eq!(format_delta_bytes(0), "0 B");
/// ```
pub fn format_delta_bytes(delta: i64) -> String {
    let magnitude = format_bytes(delta.unsigned_abs());
    match delta.signum() {
        1 => format!("+{}", magnitude),
        -1 => format!("-{}", magnitude),
        _ => magnitude,
    }
}

/// Group digits with commas
///
/// # Examples
///
/// ```
/// use supersize::fmt::format_number;
///
/// assert_eq!(format_number(1234567), "1,234,567");
/// assert_eq!(format_number(-1000), "-1,000");
/// assert_eq!(format_number(999), "999");
/// ```
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Truncate a string with an ellipsis if it exceeds `max_len` characters
///
/// # Examples
///
/// ```
/// use supersize::fmt::truncate_str;
///
/// assert_eq!(truncate_str("short", 10), "short");
/// assert_eq!(truncate_str("very_long_symbol_name", 12), "very_long...");
/// ```
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// A signed delta colored red for growth and green for shrinkage
pub fn styled_delta(delta: i64) -> StyledObject<String> {
    let text = format_delta_bytes(delta);
    match delta.signum() {
        1 => style(text).red(),
        -1 => style(text).green(),
        _ => style(text).dim(),
    }
}

/// Percentage of `part` in `total`, 0 when `total` is 0
pub fn percent(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
