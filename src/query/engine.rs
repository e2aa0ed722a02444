//! Query engine implementation
//!
//! Resolves a classified intent against the store:
//! - Ranked symbol search (exact > prefix > substring > fuzzy)
//! - Describe, callers, dependencies and import lookups
//! - Overview, unused-callable and file listings
//!
//! The engine only reads, so it can run on a read-only connection while an
//! indexing run writes through another one.

use std::collections::HashSet;

use tracing::debug;

use super::intent::{Intent, classify};
use super::results::{Description, MatchTier, QueryResponse, ResultRecord, SymbolMatch};
use crate::Result;
use crate::storage::{SqliteStore, StoredImport, StoredSymbol};
use crate::symbol::SymbolKind;

/// Default cap on the number of records per answer
pub const DEFAULT_LIMIT: usize = 20;

/// Entries per breakdown in the overview
const OVERVIEW_TOP_N: usize = 10;

/// Shortest term the fuzzy tier is tried for
const FUZZY_MIN_CHARS: usize = 4;

/// Callables that are reached by convention rather than by a call site
const ENTRY_POINTS: &[&str] = &["main", "setup", "teardown", "setUp", "tearDown", "new", "init"];

/// Query engine for code intelligence operations
pub struct QueryEngine<'a> {
    store: &'a SqliteStore,
    limit: usize,
}

impl<'a> QueryEngine<'a> {
    /// Create a new query engine
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store, limit: DEFAULT_LIMIT }
    }

    /// Cap the number of records returned. Zero means no cap.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Classify a free-text query without running it
    pub fn classify(&self, text: &str) -> Intent {
        classify(text)
    }

    /// Classify and answer a free-text query
    pub fn run(&self, text: &str) -> Result<QueryResponse> {
        let intent = classify(text);
        debug!("Query {:?} classified as {}", text, intent);
        let records = self.resolve(&intent)?;
        Ok(QueryResponse { query: text.trim().to_string(), intent, records })
    }

    /// Answer an already-classified intent
    pub fn resolve(&self, intent: &Intent) -> Result<Vec<ResultRecord>> {
        let records = match intent {
            Intent::Overview => vec![ResultRecord::Overview(self.store.overview(OVERVIEW_TOP_N)?)],
            Intent::Unused => self.unused()?.into_iter().map(ResultRecord::Unused).collect(),
            Intent::Callers { target } => self
                .store
                .find_references_to(target)?
                .into_iter()
                .map(ResultRecord::Caller)
                .collect(),
            Intent::Describe { target } => {
                self.describe(target)?.into_iter().map(ResultRecord::Description).collect()
            }
            Intent::Dependencies { target } => self
                .dependencies(target)?
                .into_iter()
                .map(ResultRecord::Import)
                .collect(),
            Intent::Files { fragment } => self
                .store
                .find_files(fragment)?
                .into_iter()
                .map(ResultRecord::File)
                .collect(),
            Intent::SymbolSearch { term, kind, parent } => self
                .search(term, *kind, parent.as_deref())?
                .into_iter()
                .map(ResultRecord::Symbol)
                .collect(),
            Intent::ImportSearch { term } => self
                .store
                .find_imports_matching(term)?
                .into_iter()
                .map(ResultRecord::Import)
                .collect(),
        };
        Ok(self.truncate(records))
    }

    fn truncate<T>(&self, mut items: Vec<T>) -> Vec<T> {
        if self.limit > 0 {
            items.truncate(self.limit);
        }
        items
    }

    /// Ranked symbol search.
    ///
    /// Order: match tier, name length, path, start line, kind relevance,
    /// then row id, so equal index states always give equal answers.
    pub fn search(
        &self,
        term: &str,
        kind: Option<SymbolKind>,
        parent: Option<&str>,
    ) -> Result<Vec<SymbolMatch>> {
        let term_lower = term.to_lowercase();
        let mut matches: Vec<SymbolMatch> = self
            .store
            .find_symbols_matching(term, kind, parent)?
            .into_iter()
            .filter_map(|symbol| {
                let tier = MatchTier::of(&symbol.name, &term_lower)?;
                Some(SymbolMatch { symbol, tier })
            })
            .collect();

        if term_lower.chars().count() >= FUZZY_MIN_CHARS {
            for name in self.fuzzy_names(&term_lower)? {
                for symbol in self.store.find_symbols_named(&name)? {
                    if accepts(&symbol, kind, parent) {
                        matches.push(SymbolMatch { symbol, tier: MatchTier::Fuzzy });
                    }
                }
            }
        }

        matches.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then_with(|| a.symbol.name.chars().count().cmp(&b.symbol.name.chars().count()))
                .then_with(|| a.symbol.path.cmp(&b.symbol.path))
                .then_with(|| a.symbol.span.start_line.cmp(&b.symbol.span.start_line))
                .then_with(|| a.symbol.kind.relevance().cmp(&b.symbol.kind.relevance()))
                .then_with(|| a.symbol.id.cmp(&b.symbol.id))
        });
        Ok(matches)
    }

    /// Names within edit distance of the term that don't contain it
    fn fuzzy_names(&self, term_lower: &str) -> Result<Vec<String>> {
        let max_distance = if term_lower.chars().count() <= 5 { 1 } else { 2 };
        let mut seen = HashSet::new();
        let names = self
            .store
            .symbol_names()?
            .into_iter()
            .filter(|name| {
                let lower = name.to_lowercase();
                !lower.contains(term_lower)
                    && strsim::damerau_levenshtein(&lower, term_lower) <= max_distance
                    && seen.insert(lower)
            })
            .collect();
        Ok(names)
    }

    /// Best-tier matches, each with children and outgoing calls
    pub fn describe(&self, target: &str) -> Result<Vec<Description>> {
        let matches = self.search(target, None, None)?;
        let Some(best) = matches.first().map(|m| m.tier) else {
            return Ok(Vec::new());
        };

        let best_matches: Vec<SymbolMatch> =
            matches.into_iter().take_while(|m| m.tier == best).collect();
        let mut descriptions = Vec::new();
        for SymbolMatch { symbol, tier } in self.truncate(best_matches) {
            let children = self.store.find_children(symbol.id)?;
            let mut seen = HashSet::new();
            let calls = self
                .store
                .find_references_from(symbol.id)?
                .into_iter()
                .filter(|r| seen.insert(r.name.clone()))
                .map(|r| r.name)
                .collect();
            descriptions.push(Description { symbol, tier, children, calls });
        }
        Ok(descriptions)
    }

    /// Imports of every file matching a path fragment or dotted module name
    pub fn dependencies(&self, target: &str) -> Result<Vec<StoredImport>> {
        let imports = self.store.find_imports_in_files(target)?;
        if !imports.is_empty() || !target.contains('.') {
            return Ok(imports);
        }
        // `models.flow` names the file `models/flow.py`
        let as_path = target.replace('.', "/");
        self.store.find_imports_in_files(&as_path)
    }

    /// Functions and methods no reference names, minus conventional entry points
    pub fn unused(&self) -> Result<Vec<StoredSymbol>> {
        let symbols = self
            .store
            .unreferenced_callables()?
            .into_iter()
            .filter(|s| !s.name.starts_with("__") && !ENTRY_POINTS.contains(&s.name.as_str()))
            .collect();
        Ok(symbols)
    }
}

/// Kind and parent filters, applied to fuzzy hits the SQL filter never saw
fn accepts(symbol: &StoredSymbol, kind: Option<SymbolKind>, parent: Option<&str>) -> bool {
    if kind.is_some_and(|k| k != symbol.kind) {
        return false;
    }
    match parent {
        Some(parent) => symbol
            .parent_name
            .as_deref()
            .is_some_and(|p| p.to_lowercase().contains(&parent.to_lowercase())),
        None => true,
    }
}
