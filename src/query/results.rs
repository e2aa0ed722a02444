//! Typed query results

use serde::Serialize;

use super::intent::Intent;
use crate::storage::{Overview, StoredFile, StoredImport, StoredReference, StoredSymbol};

/// How closely a symbol name matched the search term.
///
/// Variant order is ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Prefix,
    Substring,
    /// Within a small edit distance, transpositions included
    Fuzzy,
}

impl MatchTier {
    /// Tier for `name` against an already-lowercased `term`, or `None` if
    /// the name doesn't contain the term at all
    pub fn of(name: &str, term_lower: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name == term_lower {
            Some(MatchTier::Exact)
        } else if name.starts_with(term_lower) {
            Some(MatchTier::Prefix)
        } else if name.contains(term_lower) {
            Some(MatchTier::Substring)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Prefix => "prefix",
            MatchTier::Substring => "substring",
            MatchTier::Fuzzy => "fuzzy",
        }
    }
}

/// A ranked symbol-search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMatch {
    #[serde(flatten)]
    pub symbol: StoredSymbol,
    pub tier: MatchTier,
}

/// Full record for `describe`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Description {
    #[serde(flatten)]
    pub symbol: StoredSymbol,
    pub tier: MatchTier,
    /// Methods of a class, nested definitions of a function
    pub children: Vec<StoredSymbol>,
    /// Distinct names called from inside the symbol, in source order
    pub calls: Vec<String>,
}

/// One record of a query answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultRecord {
    Symbol(SymbolMatch),
    Description(Description),
    Caller(StoredReference),
    Import(StoredImport),
    Overview(Overview),
    Unused(StoredSymbol),
    File(StoredFile),
}

impl ResultRecord {
    /// File the record points at, if it points at one
    pub fn path(&self) -> Option<&str> {
        match self {
            ResultRecord::Symbol(m) => Some(&m.symbol.path),
            ResultRecord::Description(d) => Some(&d.symbol.path),
            ResultRecord::Caller(r) => Some(&r.path),
            ResultRecord::Import(i) => Some(&i.path),
            ResultRecord::Unused(s) => Some(&s.path),
            ResultRecord::File(f) => Some(&f.path),
            ResultRecord::Overview(_) => None,
        }
    }

    /// 1-based line the record points at
    pub fn line(&self) -> Option<u32> {
        match self {
            ResultRecord::Symbol(m) => Some(m.symbol.span.start_line),
            ResultRecord::Description(d) => Some(d.symbol.span.start_line),
            ResultRecord::Caller(r) => Some(r.line),
            ResultRecord::Import(i) => Some(i.line),
            ResultRecord::Unused(s) => Some(s.span.start_line),
            ResultRecord::File(_) | ResultRecord::Overview(_) => None,
        }
    }
}

/// Answer to one query: the intent it was classified as and its records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub query: String,
    #[serde(flatten)]
    pub intent: Intent,
    pub records: Vec<ResultRecord>,
}

impl QueryResponse {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
