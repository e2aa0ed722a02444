//! Core adapter framework
//!
//! Defines the traits and types that all language adapters must implement.
//! An adapter never walks the tree itself: the extractor asks it what role
//! each node plays and keeps the scope bookkeeping on its own.

use crate::symbol::{Import, ReferenceKind};
use crate::{Error, Result};
use std::path::Path;
use tree_sitter::{Language, Node};

/// What a definition introduces into the scope stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// class, struct, enum, trait, Go type; opens a scope
    Container,
    /// function or method; opens a scope
    Callable,
    /// variable or constant; kept at module/container scope only
    Value,
}

/// A definition site recognized by an adapter
#[derive(Debug, Clone)]
pub struct Definition<'tree> {
    pub kind: DefinitionKind,
    pub name: String,
    pub node: Node<'tree>,
    pub params: Option<String>,
    pub doc: Option<String>,
    /// Receiver or impl target the definition belongs to (Go methods)
    pub owner: Option<String>,
}

impl<'tree> Definition<'tree> {
    pub fn new(kind: DefinitionKind, name: impl Into<String>, node: Node<'tree>) -> Self {
        Self {
            kind,
            name: name.into(),
            node,
            params: None,
            doc: None,
            owner: None,
        }
    }

    pub fn with_params(mut self, params: Option<String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_doc(mut self, doc: Option<String>) -> Self {
        self.doc = doc;
        self
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }
}

/// A call site recognized by an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Simple callee name
    pub name: String,
    /// Callee expression as written
    pub target: String,
    pub kind: ReferenceKind,
}

impl CallSite {
    pub fn new(name: impl Into<String>, target: impl Into<String>, kind: ReferenceKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
        }
    }

    /// A call whose target is not a plain or attribute name
    pub fn dynamic(text: &str) -> Self {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::new(text.clone(), text, ReferenceKind::Dynamic)
    }
}

/// The role a syntax node plays for fact extraction
#[derive(Debug)]
pub enum NodeRole<'tree> {
    Definition(Definition<'tree>),
    /// Anonymous container attaching its callables to a named type (`impl X`)
    Owner(String),
    Import(Vec<Import>),
    /// A call; its children are still visited
    Call(CallSite),
    /// Nothing to record, visit children
    Descend,
    /// Nothing to record, skip the subtree
    Skip,
}

/// Trait for language adapters
///
/// Each language adapter is responsible for:
/// 1. Identifying files it can parse
/// 2. Providing the tree-sitter grammar
/// 3. Mapping grammar node kinds to extraction roles
pub trait LanguageAdapter: Send + Sync {
    /// Get the language name (the tag stored with each file)
    fn language_name(&self) -> &str;

    /// Get file extensions this adapter handles
    fn file_extensions(&self) -> &[&str];

    /// Check if this adapter can handle a file
    fn can_handle(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.file_extensions().contains(&ext)
        } else {
            false
        }
    }

    /// The tree-sitter grammar for this language
    fn language(&self) -> Language;

    /// Classify a node.
    ///
    /// Returns `Error::Extraction` for a definition that has no name in an
    /// error-free region of the tree.
    fn classify<'tree>(&self, node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>>;
}

/// Registry of language adapters
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter
    pub fn register(&mut self, adapter: impl LanguageAdapter + 'static) {
        self.adapters.push(Box::new(adapter));
    }

    /// Find an adapter for a file
    pub fn find_adapter(&self, path: &Path) -> Option<&dyn LanguageAdapter> {
        self.adapters
            .iter()
            .find(|a| a.can_handle(path))
            .map(|a| a.as_ref())
    }

    /// Find an adapter by language tag
    pub fn adapter_named(&self, language: &str) -> Result<&dyn LanguageAdapter> {
        self.adapters
            .iter()
            .find(|a| a.language_name() == language)
            .map(|a| a.as_ref())
            .ok_or_else(|| Error::UnsupportedLanguage(language.to_string()))
    }
}

/// Create a default registry with all built-in adapters
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(super::python::PythonAdapter::new());
    registry.register(super::javascript::JavaScriptAdapter::new());
    registry.register(super::rust::RustAdapter::new());
    registry.register(super::go::GoAdapter::new());
    registry
}

// ========== Node helpers shared by adapters ==========

/// Source text of a node
pub fn node_text<'s>(node: Node, source: &'s [u8]) -> Result<&'s str> {
    node.utf8_text(source)
        .map_err(|e| Error::Extraction(format!("invalid utf-8 in {}: {}", node.kind(), e)))
}

/// Source text of a named field, if present
pub fn field_text(node: Node, field: &str, source: &[u8]) -> Result<Option<String>> {
    match node.child_by_field_name(field) {
        Some(child) => Ok(Some(node_text(child, source)?.to_string())),
        None => Ok(None),
    }
}

/// The `name` field of a definition node.
///
/// `Ok(None)` when the name is absent inside a syntax error (the definition
/// is skipped); an error when the tree around it is clean.
pub fn definition_name(node: Node, source: &[u8]) -> Result<Option<String>> {
    match node.child_by_field_name("name") {
        Some(name) => Ok(Some(node_text(name, source)?.to_string())),
        None if node.has_error() || node.is_missing() => Ok(None),
        None => Err(Error::Extraction(format!(
            "{} at line {} has no name",
            node.kind(),
            node.start_position().row + 1
        ))),
    }
}

/// Strip string delimiters: prefixes like `r`/`b`/`f`, then triple or single quotes
pub fn strip_quotes(raw: &str) -> &str {
    let prefix = raw
        .find(['"', '\'', '`'])
        .filter(|&i| i <= 2 && raw[..i].chars().all(|c| "rRbBuUfF".contains(c)))
        .unwrap_or(0);
    let text = &raw[prefix..];
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if text.len() >= 2 * quote.len() && text.starts_with(quote) && text.ends_with(quote) {
            return &text[quote.len()..text.len() - quote.len()];
        }
    }
    text
}

/// Consecutive comment siblings directly above `node`, top to bottom.
///
/// `keep` receives each comment's text and returns the cleaned line, or
/// `None` to stop collecting.
pub fn preceding_comments(
    node: Node,
    source: &[u8],
    comment_kinds: &[&str],
    keep: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let mut lines = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        if !comment_kinds.contains(&sibling.kind()) || sibling.end_position().row + 1 < expected_row {
            break;
        }
        let Some(line) = sibling.utf8_text(source).ok().and_then(&keep) else {
            break;
        };
        lines.push(line);
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let doc = lines.join("\n").trim().to_string();
    if doc.is_empty() { None } else { Some(doc) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestAdapter;

    impl LanguageAdapter for TestAdapter {
        fn language_name(&self) -> &str { "test" }
        fn file_extensions(&self) -> &[&str] { &["test"] }
        fn language(&self) -> Language { tree_sitter_python::LANGUAGE.into() }
        fn classify<'tree>(&self, _node: Node<'tree>, _source: &[u8]) -> Result<NodeRole<'tree>> {
            Ok(NodeRole::Descend)
        }
    }

    #[test]
    fn test_registry() {
        let mut registry = AdapterRegistry::new();
        registry.register(TestAdapter);

        assert!(registry.find_adapter(Path::new("foo.test")).is_some());
        assert!(registry.find_adapter(Path::new("foo.other")).is_none());
        assert!(registry.adapter_named("test").is_ok());
        assert!(matches!(
            registry.adapter_named("cobol"),
            Err(Error::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_default_registry_extensions() {
        let registry = default_registry();
        let lang = |p: &str| registry.find_adapter(Path::new(p)).map(|a| a.language_name().to_string());

        assert_eq!(lang("a/model.py").as_deref(), Some("python"));
        assert_eq!(lang("web/app.jsx").as_deref(), Some("javascript"));
        assert_eq!(lang("src/lib.rs").as_deref(), Some("rust"));
        assert_eq!(lang("cmd/main.go").as_deref(), Some("go"));
        assert_eq!(lang("README.md"), None);
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"\"\"Doc.\"\"\""), "Doc.");
        assert_eq!(strip_quotes("r'raw'"), "raw");
        assert_eq!(strip_quotes("'./util.js'"), "./util.js");
        assert_eq!(strip_quotes("\"fmt\""), "fmt");
        assert_eq!(strip_quotes("fmt"), "fmt");
    }

    #[test]
    fn test_dynamic_call_collapses_whitespace() {
        let call = CallSite::dynamic("handlers[\n    key\n]");
        assert_eq!(call.name, "handlers[ key ]");
        assert_eq!(call.kind, ReferenceKind::Dynamic);
    }
}
