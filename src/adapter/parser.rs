//! Grammar parser - tree-sitter wrapper
//!
//! A `GrammarParser` owns one tree-sitter `Parser` and switches grammars on
//! demand. Parsers are not shared between threads: each indexer worker
//! builds its own.

use super::framework::{AdapterRegistry, LanguageAdapter};
use crate::{Error, Result};
use tree_sitter::{Node, Parser, Tree};

/// A parsed file: its text and syntax tree
pub struct ParsedSource {
    pub language: String,
    pub text: String,
    pub tree: Tree,
}

impl ParsedSource {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Whether tree-sitter had to recover from syntax errors
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// 1-based line and 0-based column of the first ERROR or MISSING node
    pub fn first_error(&self) -> Option<(u32, u32)> {
        let root = self.tree.root_node();
        if !root.has_error() {
            return None;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let pos = node.start_position();
                return Some((pos.row as u32 + 1, pos.column as u32));
            }
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).filter(|c| c.has_error()).collect();
            stack.extend(children.into_iter().rev());
        }
        // has_error() was true but no node reported itself; point at the root
        Some((1, 0))
    }

    /// Short description of the first syntax error, for run summaries
    pub fn error_summary(&self) -> Option<String> {
        self.first_error()
            .map(|(line, col)| format!("syntax error at line {}, column {}", line, col))
    }
}

/// Per-thread parser over the languages of a registry
pub struct GrammarParser<'r> {
    registry: &'r AdapterRegistry,
    parser: Parser,
    loaded: Option<String>,
}

impl<'r> GrammarParser<'r> {
    pub fn new(registry: &'r AdapterRegistry) -> Self {
        Self {
            registry,
            parser: Parser::new(),
            loaded: None,
        }
    }

    /// The adapter for a language tag
    pub fn adapter(&self, language: &str) -> Result<&'r dyn LanguageAdapter> {
        self.registry.adapter_named(language)
    }

    /// Parse file bytes with the grammar of `language`.
    ///
    /// Syntax errors still produce a tree; check `has_errors()`.
    pub fn parse(&mut self, bytes: &[u8], language: &str) -> Result<ParsedSource> {
        let adapter = self
            .registry
            .adapter_named(language)
            .map_err(|_| Error::Parse(format!("unsupported language: {}", language)))?;

        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Parse(format!("file is not valid UTF-8: {}", e)))?
            .to_string();

        if self.loaded.as_deref() != Some(language) {
            self.parser
                .set_language(&adapter.language())
                .map_err(|e| Error::Parse(format!("failed to load {} grammar: {}", language, e)))?;
            self.loaded = Some(language.to_string());
        }

        let tree = self
            .parser
            .parse(text.as_bytes(), None)
            .ok_or_else(|| Error::Parse(format!("tree-sitter produced no tree for {}", language)))?;

        Ok(ParsedSource {
            language: language.to_string(),
            text,
            tree,
        })
    }
}
