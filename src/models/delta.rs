//! Before/after symbol pairs produced by a diff

use super::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// How a symbol changed between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// Matched and the size did not change
    Unchanged,
    /// Matched with a size change
    Changed,
    /// Only present after
    Added,
    /// Only present before
    Removed,
}

/// A before/after pair. At least one side is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeltaSymbol {
    /// Symbol that only exists in the after snapshot
    Added(Symbol),
    /// Symbol that only exists in the before snapshot
    Removed(Symbol),
    /// Symbol present on both sides
    Matched {
        /// Before side
        before: Symbol,
        /// After side
        after: Symbol,
    },
}

impl DeltaSymbol {
    /// Before side, if any
    pub fn before(&self) -> Option<&Symbol> {
        match self {
            Self::Removed(before) | Self::Matched { before, .. } => Some(before),
            Self::Added(_) => None,
        }
    }

    /// After side, if any
    pub fn after(&self) -> Option<&Symbol> {
        match self {
            Self::Added(after) | Self::Matched { after, .. } => Some(after),
            Self::Removed(_) => None,
        }
    }

    /// The side used for names and paths (after when present)
    pub fn primary(&self) -> &Symbol {
        match self {
            Self::Added(sym) | Self::Removed(sym) => sym,
            Self::Matched { after, .. } => after,
        }
    }

    /// Section name of the primary side
    pub fn section_name(&self) -> &str {
        &self.primary().section_name
    }

    /// Full name of the primary side
    pub fn full_name(&self) -> &str {
        &self.primary().full_name
    }

    /// Change in size excluding padding
    pub fn size_without_padding(&self) -> i64 {
        let after = self.after().map_or(0, Symbol::size_without_padding);
        let before = self.before().map_or(0, Symbol::size_without_padding);
        after - before
    }

    /// Change in padding.
    ///
    /// Padding of matched symbols is unstable across builds, so it only counts
    /// when the before side is padding-only.
    pub fn padding(&self) -> i64 {
        match self {
            Self::Added(after) => after.padding,
            Self::Removed(before) => -before.padding,
            Self::Matched { before, after } => {
                if before.is_padding_only() {
                    after.padding - before.padding
                } else {
                    0
                }
            }
        }
    }

    /// Change in size, padding included
    pub fn size(&self) -> i64 {
        self.size_without_padding() + self.padding()
    }

    /// Padding difference that [`padding`](Self::padding) leaves out
    pub fn unattributed_padding(&self) -> i64 {
        match self {
            Self::Matched { before, after } => after.padding - before.padding - self.padding(),
            _ => 0,
        }
    }

    /// Classification of the change
    pub fn diff_status(&self) -> DiffStatus {
        match self {
            Self::Added(_) => DiffStatus::Added,
            Self::Removed(_) => DiffStatus::Removed,
            Self::Matched { .. } if self.size() != 0 => DiffStatus::Changed,
            Self::Matched { .. } => DiffStatus::Unchanged,
        }
    }
}

/// Per-status counts of a [`DeltaSymbolGroup`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Matched, same size
    pub unchanged: usize,
    /// Matched, different size
    pub changed: usize,
    /// After only
    pub added: usize,
    /// Before only
    pub removed: usize,
}

/// An ordered collection of delta symbols
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaSymbolGroup {
    symbols: Vec<DeltaSymbol>,
}

impl DeltaSymbolGroup {
    /// Wrap a list of delta symbols
    pub fn new(symbols: Vec<DeltaSymbol>) -> Self {
        Self { symbols }
    }

    /// Number of delta symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the group is empty
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, DeltaSymbol> {
        self.symbols.iter()
    }

    /// Borrow as a slice
    pub fn as_slice(&self) -> &[DeltaSymbol] {
        &self.symbols
    }

    /// Net size change
    pub fn total_size(&self) -> i64 {
        self.symbols.iter().map(DeltaSymbol::size).sum()
    }

    /// Count symbols per [`DiffStatus`]
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for sym in &self.symbols {
            match sym.diff_status() {
                DiffStatus::Unchanged => counts.unchanged += 1,
                DiffStatus::Changed => counts.changed += 1,
                DiffStatus::Added => counts.added += 1,
                DiffStatus::Removed => counts.removed += 1,
            }
        }
        counts
    }

    /// Symbols with the given status, in order
    pub fn where_status(&self, status: DiffStatus) -> impl Iterator<Item = &DeltaSymbol> {
        self.symbols
            .iter()
            .filter(move |s| s.diff_status() == status)
    }

    /// Symbols that are not [`DiffStatus::Unchanged`], largest absolute change first
    pub fn changes_by_size(&self) -> Vec<&DeltaSymbol> {
        let mut changes: Vec<&DeltaSymbol> = self
            .symbols
            .iter()
            .filter(|s| s.diff_status() != DiffStatus::Unchanged)
            .collect();
        changes.sort_by(|a, b| b.size().abs().cmp(&a.size().abs()));
        changes
    }
}

impl From<Vec<DeltaSymbol>> for DeltaSymbolGroup {
    fn from(symbols: Vec<DeltaSymbol>) -> Self {
        Self::new(symbols)
    }
}

impl<'a> IntoIterator for &'a DeltaSymbolGroup {
    type Item = &'a DeltaSymbol;
    type IntoIter = std::slice::Iter<'a, DeltaSymbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}
