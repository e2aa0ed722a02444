//! Language Adapter Framework
//!
//! Each language provides a tree-sitter grammar and a `classify` function
//! that maps grammar nodes to extraction roles. The extractor never sees
//! language-specific node kinds.

pub mod framework;
pub mod parser;
pub mod extractor;
pub mod python;
pub mod javascript;
pub mod rust;
pub mod go;

pub use framework::{
    AdapterRegistry, CallSite, Definition, DefinitionKind, LanguageAdapter, NodeRole,
    default_registry,
};
pub use parser::{GrammarParser, ParsedSource};
pub use extractor::{ScopeStack, extract};

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::symbol::FileFacts;

    /// Parse and extract a source string with the default registry
    pub fn extract_str(language: &str, source: &str) -> FileFacts {
        let registry = default_registry();
        let mut parser = GrammarParser::new(&registry);
        let parsed = parser.parse(source.as_bytes(), language).unwrap();
        let adapter = registry.adapter_named(language).unwrap();
        extract(adapter, &parsed).unwrap()
    }
}
