//! Completion candidates and their ranking.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Range;

/// Kind of a symbol offered for completion. Declaration order is the
/// tie-break order: locals and parameters first, keywords last.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum SymbolKind {
    Local,
    Parameter,
    Field,
    Property,
    Method,
    Event,
    Type,
    Namespace,
    Keyword,
}

impl SymbolKind {
    /// Tie-break group: local/parameter, member, type, namespace, keyword.
    fn group(self) -> u8 {
        match self {
            Self::Local | Self::Parameter => 0,
            Self::Field | Self::Property | Self::Method | Self::Event => 1,
            Self::Type => 2,
            Self::Namespace => 3,
            Self::Keyword => 4,
        }
    }
}

/// A symbol reported by the compiler frontend for a cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolCandidate {
    pub name: String,
    pub kind: SymbolKind,
}

impl SymbolCandidate {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub display_text: String,
    pub kind: SymbolKind,
    /// Zero-based position in the ranked list.
    pub sort_rank: usize,
    /// Byte range of the input replaced when the item is accepted.
    pub insertion_span: Range<usize>,
}

/// Ranked completion items for one request. Consumed once.
#[derive(Debug)]
pub struct Completions {
    items: std::vec::IntoIter<CompletionItem>,
}

impl Completions {
    pub fn empty() -> Self {
        Self {
            items: Vec::new().into_iter(),
        }
    }
}

impl Iterator for Completions {
    type Item = CompletionItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Completions {}

/// Byte range of the identifier that ends at `cursor`.
pub fn word_span(text: &str, cursor: usize) -> Range<usize> {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    let start = text[..cursor]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(cursor);
    start..cursor
}

/// How well a candidate matches the typed prefix; lower is better.
fn match_tier(name: &str, prefix: &str) -> Option<u8> {
    if prefix.is_empty() || name.starts_with(prefix) {
        return Some(0);
    }
    let name_lower = name.to_lowercase();
    let prefix_lower = prefix.to_lowercase();
    if name_lower.starts_with(&prefix_lower) {
        Some(1)
    } else if name_lower.contains(&prefix_lower) {
        Some(2)
    } else {
        None
    }
}

/// Filters and orders `candidates` for the identifier being typed at `cursor`:
/// prefix matches first, then alphabetical, then by symbol kind.
pub fn rank(text: &str, cursor: usize, candidates: Vec<SymbolCandidate>) -> Completions {
    let span = word_span(text, cursor);
    let prefix = &text[span.clone()];

    let mut scored: Vec<(u8, SymbolCandidate)> = candidates
        .into_iter()
        .filter_map(|c| match_tier(&c.name, prefix).map(|tier| (tier, c)))
        .collect();

    scored.sort_by(|(tier_a, a), (tier_b, b)| {
        tier_a
            .cmp(tier_b)
            .then_with(|| compare_names(&a.name, &b.name))
            .then_with(|| a.kind.group().cmp(&b.kind.group()))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    scored.dedup_by(|(_, a), (_, b)| a.name == b.name && a.kind == b.kind);

    let items: Vec<CompletionItem> = scored
        .into_iter()
        .enumerate()
        .map(|(sort_rank, (_, c))| CompletionItem {
            display_text: c.name,
            kind: c.kind,
            sort_rank,
            insertion_span: span.clone(),
        })
        .collect();

    Completions {
        items: items.into_iter(),
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
