//! Fact types - what the extractor emits and the store persists
//!
//! Every source file is reduced to three kinds of facts:
//! - `Symbol`: a definition site (class, function, method, variable)
//! - `Import`: an import statement entry
//! - `Reference`: a call site, keyed by the textual name it calls

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Symbol kinds shared by every language adapter.
///
/// Structs, enums, traits and Go type declarations all map to `Class`;
/// `Method` is a callable whose enclosing scope is a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Variable,
}

impl SymbolKind {
    /// Get the string representation of the symbol kind
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
        }
    }

    /// Get all symbol kinds
    pub fn all() -> &'static [SymbolKind] {
        &[
            SymbolKind::Class,
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Variable,
        ]
    }

    /// Ordering weight used as the last ranking tiebreaker (lower first)
    pub fn relevance(&self) -> u8 {
        match self {
            SymbolKind::Class => 0,
            SymbolKind::Function => 1,
            SymbolKind::Method => 2,
            SymbolKind::Variable => 3,
        }
    }
}

impl FromStr for SymbolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "class" | "classes" | "struct" | "enum" | "trait" | "interface" | "type" => {
                Ok(SymbolKind::Class)
            }
            "function" | "functions" | "func" | "fn" | "def" => Ok(SymbolKind::Function),
            "method" | "methods" => Ok(SymbolKind::Method),
            "variable" | "variables" | "var" | "const" | "static" => Ok(SymbolKind::Variable),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte and line/column extent of a definition.
///
/// Lines are 1-indexed, columns 0-indexed (tree-sitter points).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start_line: u32,
    pub end_line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl Span {
    pub fn from_node(node: &tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte() as u32,
            end_byte: node.end_byte() as u32,
            start_line: start.row as u32 + 1,
            end_line: end.row as u32 + 1,
            start_col: start.column as u32,
            end_col: end.column as u32,
        }
    }

    /// True if `other` lies entirely inside this span
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }
}

/// A definition extracted from one file.
///
/// `parent` is an index into the owning `FileFacts::symbols`; it is mapped
/// to a row id when the file's facts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub parent: Option<usize>,
    /// Parameter list text, callables only
    pub params: Option<String>,
    /// Docstring or doc comment, quotes and comment markers removed
    pub doc: Option<String>,
    /// First lines of the definition
    pub snippet: String,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            span,
            parent: None,
            params: None,
            doc: None,
            snippet: String::new(),
        }
    }

    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = Some(params.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }
}

/// One imported module or name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Module path as written (`os.path`, `./util.js`, `std::collections`)
    pub module: String,
    /// Imported name for `from m import n` style imports
    pub name: Option<String>,
    pub alias: Option<String>,
    pub line: u32,
}

impl Import {
    pub fn module(module: impl Into<String>, line: u32) -> Self {
        Self {
            module: module.into(),
            name: None,
            alias: None,
            line,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    /// Render the import roughly as it would be written in Python
    pub fn display_text(&self) -> String {
        let mut text = match &self.name {
            Some(name) => format!("from {} import {}", self.module, name),
            None => format!("import {}", self.module),
        };
        if let Some(alias) = &self.alias {
            text.push_str(" as ");
            text.push_str(alias);
        }
        text
    }
}

/// How the call target was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `foo()`
    Call,
    /// `obj.foo()`, `Type::foo()`
    MethodCall,
    /// Anything else: `handlers[k]()`, `getattr(o, n)()`
    Dynamic,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Call => "call",
            ReferenceKind::MethodCall => "method_call",
            ReferenceKind::Dynamic => "dynamic",
        }
    }
}

impl FromStr for ReferenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "call" => Ok(ReferenceKind::Call),
            "method_call" => Ok(ReferenceKind::MethodCall),
            "dynamic" => Ok(ReferenceKind::Dynamic),
            _ => Err(Error::InvalidKind(s.to_string())),
        }
    }
}

/// A call site. Never resolved to a symbol id at extraction time; the query
/// engine matches `name` against symbol names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Simple callee name (`forward` for `self.forward(x)`)
    pub name: String,
    /// Callee expression as written (`self.forward`)
    pub target: String,
    pub kind: ReferenceKind,
    pub line: u32,
    pub column: u32,
    /// Index of the enclosing symbol in `FileFacts::symbols`
    pub caller: Option<usize>,
    /// Trimmed source line of the call
    pub context: String,
}

/// Everything extracted from one file, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileFacts {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
    pub references: Vec<Reference>,
}

impl FileFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.imports.is_empty() && self.references.is_empty()
    }

    pub fn symbol_named(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_kind_roundtrip() {
        for kind in SymbolKind::all() {
            let parsed: SymbolKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_symbol_kind_aliases() {
        assert_eq!(SymbolKind::from_str("struct").unwrap(), SymbolKind::Class);
        assert_eq!(SymbolKind::from_str("def").unwrap(), SymbolKind::Function);
        assert_eq!(SymbolKind::from_str("Methods").unwrap(), SymbolKind::Method);
        assert_eq!(SymbolKind::from_str("const").unwrap(), SymbolKind::Variable);
        assert!(SymbolKind::from_str("widget").is_err());
    }

    #[test]
    fn test_import_display() {
        let plain = Import::module("os.path", 1);
        assert_eq!(plain.display_text(), "import os.path");

        let from = Import::module("typing", 2)
            .with_name("Optional")
            .with_alias(Some("Opt".to_string()));
        assert_eq!(from.display_text(), "from typing import Optional as Opt");
    }

    #[test]
    fn test_span_contains() {
        let outer = Span { start_byte: 0, end_byte: 100, ..Span::default() };
        let inner = Span { start_byte: 10, end_byte: 20, ..Span::default() };
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
