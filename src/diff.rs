//! Symbol diffing between two snapshots
//!
//! Symbols are paired in three passes of decreasing strictness. Each pass
//! indexes the still-unmatched before-symbols by a [`MatchKey`] and lets the
//! still-unmatched after-symbols claim the first entry with the same key.
//! Whatever is left after the last pass is reported as added or removed.

use crate::models::{
    DeltaSizeInfo, DeltaSymbol, DeltaSymbolGroup, SizeInfo, Symbol, SymbolGroup,
};
use log::debug;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::OnceLock;

/// Name of the synthetic symbol holding padding changes of matched symbols
pub const AGGREGATE_PADDING_NAME: &str = "** aggregate padding of diff'ed symbols";

/// Strictness of a matching pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Same section, object, size and name modulo numeric suffixes
    Exact,
    /// Same section and object, name normalized
    Good,
    /// Same section and normalized name
    Poor,
}

impl MatchTier {
    /// Every tier, strictest first
    pub const ALL: [MatchTier; 3] = [MatchTier::Exact, MatchTier::Good, MatchTier::Poor];

    /// Key of `symbol` for this tier
    pub fn key(self, symbol: &Symbol) -> MatchKey {
        match self {
            MatchTier::Exact => MatchKey::Exact {
                section_name: symbol.section_name.clone(),
                name: strip_number_suffix(&symbol.full_name).to_string(),
                object_path: symbol.object_path.clone(),
                size: symbol.size_without_padding(),
            },
            MatchTier::Good => MatchKey::Good {
                section_name: symbol.section_name.clone(),
                object_path: symbol.object_path.clone(),
                name: normalize_name(&symbol.full_name),
            },
            MatchTier::Poor => MatchKey::Poor {
                section_name: symbol.section_name.clone(),
                name: normalize_name(&symbol.full_name),
            },
        }
    }
}

/// Identity of a symbol under one matching tier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    /// Key for [`MatchTier::Exact`]
    Exact {
        /// Section
        section_name: String,
        /// Name without trailing `.123` suffixes
        name: String,
        /// Object path
        object_path: String,
        /// Size excluding padding
        size: i64,
    },
    /// Key for [`MatchTier::Good`]
    Good {
        /// Section
        section_name: String,
        /// Object path
        object_path: String,
        /// Normalized name
        name: String,
    },
    /// Key for [`MatchTier::Poor`]
    Poor {
        /// Section
        section_name: String,
        /// Normalized name
        name: String,
    },
}

fn number_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.0-9]+$").expect("number suffix regex is valid"))
}

fn star_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+\d+( \(.*\))?$").expect("star name regex is valid"))
}

/// Drop trailing digits and dots (`foo.123` → `foo`, `bar.1.2` → `bar`)
pub fn strip_number_suffix(name: &str) -> &str {
    match number_suffix_regex().find(name) {
        Some(m) if m.start() > 0 => &name[..m.start()],
        _ => name,
    }
}

/// Normalize a name for the looser tiers.
///
/// # Examples
///
/// ```
/// use supersize::diff::normalize_name;
///
/// assert_eq!(normalize_name("foo [clone .part.0]"), "foo");
/// assert_eq!(normalize_name("kTable.123"), "kTable");
/// assert_eq!(normalize_name("** symbol gap 3 (end of section)"), "** symbol gaps");
/// assert_eq!(normalize_name("** lld merge strings"), "** merge strings");
/// ```
pub fn normalize_name(name: &str) -> String {
    if name.starts_with('*') {
        if name.contains("merge strings") {
            return "** merge strings".to_string();
        }
        return star_count_regex().replace(name, "s").into_owned();
    }
    let name = match name.find(" [clone ") {
        Some(idx) => &name[..idx],
        None => name,
    };
    strip_number_suffix(name).to_string()
}

struct Matcher<'a> {
    before: &'a [Symbol],
    after: &'a [Symbol],
    before_matched: Vec<bool>,
    after_matched: Vec<bool>,
    pairs: Vec<(usize, usize)>,
}

impl<'a> Matcher<'a> {
    fn new(before: &'a [Symbol], after: &'a [Symbol]) -> Self {
        Self {
            before,
            after,
            before_matched: vec![false; before.len()],
            after_matched: vec![false; after.len()],
            pairs: Vec::new(),
        }
    }

    fn run_tier(&mut self, tier: MatchTier) -> usize {
        let mut index: HashMap<MatchKey, VecDeque<usize>> = HashMap::new();
        for (i, sym) in self.before.iter().enumerate() {
            if !self.before_matched[i] {
                index.entry(tier.key(sym)).or_default().push_back(i);
            }
        }

        let after_keys: Vec<Option<MatchKey>> = self
            .after
            .par_iter()
            .zip(self.after_matched.par_iter())
            .map(|(sym, matched)| (!matched).then(|| tier.key(sym)))
            .collect();

        let mut matched = 0;
        for (j, key) in after_keys.into_iter().enumerate() {
            let Some(key) = key else { continue };
            let Some(candidates) = index.get_mut(&key) else {
                continue;
            };
            if let Some(i) = candidates.pop_front() {
                self.before_matched[i] = true;
                self.after_matched[j] = true;
                self.pairs.push((i, j));
                matched += 1;
            }
        }
        matched
    }
}

/// Pair the symbols of two groups.
///
/// Output order: matched pairs (in the order they were found), then the
/// aggregate padding symbols, then added symbols, then removed symbols.
pub fn diff_symbol_groups(before: &SymbolGroup, after: &SymbolGroup) -> DeltaSymbolGroup {
    let mut matcher = Matcher::new(before.as_slice(), after.as_slice());
    for tier in MatchTier::ALL {
        let matched = matcher.run_tier(tier);
        debug!("{:?} pass matched {} symbols", tier, matched);
    }

    let mut delta_symbols = Vec::with_capacity(before.len().max(after.len()));
    let mut padding_by_section: BTreeMap<String, i64> = BTreeMap::new();

    for &(i, j) in &matcher.pairs {
        let delta = DeltaSymbol::Matched {
            before: matcher.before[i].clone(),
            after: matcher.after[j].clone(),
        };
        let unattributed = delta.unattributed_padding();
        if unattributed != 0 {
            *padding_by_section
                .entry(delta.section_name().to_string())
                .or_default() += unattributed;
        }
        delta_symbols.push(delta);
    }

    for (section_name, padding) in padding_by_section {
        if padding != 0 {
            let sym = Symbol::new(section_name, AGGREGATE_PADDING_NAME, 0).with_padding(padding);
            delta_symbols.push(DeltaSymbol::Added(sym));
        }
    }

    delta_symbols.extend(
        matcher
            .after
            .iter()
            .zip(&matcher.after_matched)
            .filter(|(_, matched)| !**matched)
            .map(|(sym, _)| DeltaSymbol::Added(sym.clone())),
    );
    delta_symbols.extend(
        matcher
            .before
            .iter()
            .zip(&matcher.before_matched)
            .filter(|(_, matched)| !**matched)
            .map(|(sym, _)| DeltaSymbol::Removed(sym.clone())),
    );

    DeltaSymbolGroup::new(delta_symbols)
}

/// Section size changes; sections present on one side only count as zero on
/// the other
pub fn diff_section_sizes(
    before: &BTreeMap<String, i64>,
    after: &BTreeMap<String, i64>,
) -> BTreeMap<String, i64> {
    let mut deltas: BTreeMap<String, i64> = after.clone();
    for (name, size) in before {
        *deltas.entry(name.clone()).or_insert(0) -= size;
    }
    deltas
}

/// Diff two snapshots
pub fn diff(before: &SizeInfo, after: &SizeInfo) -> DeltaSizeInfo {
    DeltaSizeInfo {
        section_sizes: diff_section_sizes(&before.section_sizes, &after.section_sizes),
        symbols: diff_symbol_groups(&before.raw_symbols, &after.raw_symbols),
        before_metadata: before.metadata.clone(),
        after_metadata: after.metadata.clone(),
    }
}
