//! Rust language adapter
//!
//! Structs, enums, unions and traits are containers; `impl X` blocks attach
//! their functions to `X` as methods. `use` trees are flattened into one
//! import per leaf path.

use super::framework::{
    CallSite, Definition, DefinitionKind, LanguageAdapter, NodeRole, definition_name, field_text,
    node_text,
};
use crate::Result;
use crate::symbol::{Import, ReferenceKind};
use tree_sitter::{Language, Node};

/// Rust language adapter
pub struct RustAdapter;

impl RustAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `///` lines above an item, skipping attributes in between
    fn doc_comment(node: Node, source: &[u8]) -> Option<String> {
        let mut lines = Vec::new();
        let mut current = node.prev_sibling();

        while let Some(sibling) = current {
            match sibling.kind() {
                "attribute_item" => {}
                "line_comment" => {
                    let text = sibling.utf8_text(source).ok()?;
                    match text.strip_prefix("///") {
                        Some(rest) if !rest.starts_with('/') => lines.push(rest.trim().to_string()),
                        _ => break,
                    }
                }
                _ => break,
            }
            current = sibling.prev_sibling();
        }

        lines.reverse();
        let doc = lines.join("\n").trim().to_string();
        if doc.is_empty() { None } else { Some(doc) }
    }

    fn item<'tree>(node: Node<'tree>, source: &[u8], kind: DefinitionKind) -> Result<NodeRole<'tree>> {
        let Some(name) = definition_name(node, source)? else {
            return Ok(NodeRole::Descend);
        };
        let params = if kind == DefinitionKind::Callable {
            match (
                field_text(node, "parameters", source)?,
                field_text(node, "return_type", source)?,
            ) {
                (Some(params), Some(ret)) => Some(format!("{} -> {}", params, ret)),
                (params, _) => params,
            }
        } else {
            None
        };
        Ok(NodeRole::Definition(
            Definition::new(kind, name, node)
                .with_params(params)
                .with_doc(Self::doc_comment(node, source)),
        ))
    }

    /// `impl<T> Trait for Wrapper<T>` attaches to `Wrapper`
    fn impl_owner<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(mut ty) = node.child_by_field_name("type") else {
            return Ok(NodeRole::Descend);
        };
        loop {
            ty = match ty.kind() {
                "generic_type" => match ty.child_by_field_name("type") {
                    Some(inner) => inner,
                    None => break,
                },
                "scoped_type_identifier" => match ty.child_by_field_name("name") {
                    Some(inner) => inner,
                    None => break,
                },
                "reference_type" => match ty.child_by_field_name("type") {
                    Some(inner) => inner,
                    None => break,
                },
                _ => break,
            };
        }
        Ok(NodeRole::Owner(node_text(ty, source)?.to_string()))
    }

    fn imports<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let line = node.start_position().row as u32 + 1;
        let mut imports = Vec::new();
        if let Some(argument) = node.child_by_field_name("argument") {
            collect_use_tree(argument, "", line, source, &mut imports)?;
        }
        Ok(NodeRole::Import(imports))
    }

    fn call<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(mut function) = node.child_by_field_name("function") else {
            return Ok(NodeRole::Descend);
        };
        // parse::<u32>() calls `parse`
        if function.kind() == "generic_function" {
            if let Some(inner) = function.child_by_field_name("function") {
                function = inner;
            }
        }
        let target = node_text(function, source)?;

        let call = match function.kind() {
            "identifier" => CallSite::new(target, target, ReferenceKind::Call),
            "field_expression" => match field_text(function, "field", source)? {
                Some(field) => CallSite::new(field, target, ReferenceKind::MethodCall),
                None => CallSite::dynamic(target),
            },
            "scoped_identifier" => match field_text(function, "name", source)? {
                Some(name) => CallSite::new(name, target, ReferenceKind::MethodCall),
                None => CallSite::dynamic(target),
            },
            _ => CallSite::dynamic(target),
        };
        Ok(NodeRole::Call(call))
    }

    /// Macro arguments stay an unparsed token tree, so a call there is
    /// only recognized as an identifier followed by a `( ... )` group.
    /// `path::to::f(..)` and `recv.f(..)` keep their prefix as the target.
    fn macro_call<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        if !in_macro_arguments(node) {
            return Ok(NodeRole::Descend);
        }
        let Some(group) = node.next_sibling() else {
            return Ok(NodeRole::Descend);
        };
        if group.kind() != "token_tree" || !node_text(group, source)?.starts_with('(') {
            return Ok(NodeRole::Descend);
        }

        let name = node_text(node, source)?;
        let mut segments = vec![name];
        let mut kind = ReferenceKind::Call;
        let mut start = node;
        while let Some(separator) = start.prev_sibling() {
            let text = node_text(separator, source)?;
            if text == "fn" && start == node {
                // `fn name(..)` generated by the macro is not a call
                return Ok(NodeRole::Descend);
            }
            if text != "::" && text != "." {
                break;
            }
            let Some(segment) = separator.prev_sibling() else {
                break;
            };
            if !matches!(segment.kind(), "identifier" | "self" | "super" | "crate") {
                break;
            }
            segments.push(text);
            segments.push(node_text(segment, source)?);
            kind = ReferenceKind::MethodCall;
            start = segment;
        }
        segments.reverse();

        Ok(NodeRole::Call(CallSite::new(name, segments.concat(), kind)))
    }
}

/// Whether `node` sits in the token trees of a macro invocation
fn in_macro_arguments(node: Node) -> bool {
    let mut inside_tree = false;
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "token_tree" => inside_tree = true,
            "macro_invocation" => return inside_tree,
            _ => return false,
        }
        current = parent.parent();
    }
    false
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}::{}", prefix, segment)
    }
}

/// Split `a::b::C` into module `a::b` and name `C`
fn path_import(path: &str, line: u32) -> Import {
    match path.rsplit_once("::") {
        Some((module, name)) => Import::module(module, line).with_name(name),
        None => Import::module(path, line),
    }
}

fn collect_use_tree(
    node: Node,
    prefix: &str,
    line: u32,
    source: &[u8],
    out: &mut Vec<Import>,
) -> Result<()> {
    match node.kind() {
        "identifier" | "scoped_identifier" | "crate" | "self" | "super" | "metavariable" => {
            let path = join_path(prefix, node_text(node, source)?);
            out.push(path_import(&path, line));
        }
        "use_as_clause" => {
            if let Some(path) = field_text(node, "path", source)? {
                let alias = field_text(node, "alias", source)?;
                out.push(path_import(&join_path(prefix, &path), line).with_alias(alias));
            }
        }
        "use_wildcard" => {
            let text = node_text(node, source)?;
            let base = text.trim_end_matches('*').trim_end_matches("::");
            let module = if base.is_empty() { prefix.to_string() } else { join_path(prefix, base) };
            out.push(Import::module(module, line).with_name("*"));
        }
        "scoped_use_list" => {
            let prefix = match field_text(node, "path", source)? {
                Some(path) => join_path(prefix, &path),
                None => prefix.to_string(),
            };
            if let Some(list) = node.child_by_field_name("list") {
                collect_use_tree(list, &prefix, line, source, out)?;
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_use_tree(child, prefix, line, source, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

impl Default for RustAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for RustAdapter {
    fn language_name(&self) -> &str {
        "rust"
    }

    fn file_extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn language(&self) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn classify<'tree>(&self, node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        match node.kind() {
            "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                Self::item(node, source, DefinitionKind::Container)
            }
            "function_item" | "function_signature_item" => {
                Self::item(node, source, DefinitionKind::Callable)
            }
            "const_item" | "static_item" => Self::item(node, source, DefinitionKind::Value),
            "impl_item" => Self::impl_owner(node, source),
            "use_declaration" => Self::imports(node, source),
            "call_expression" => Self::call(node, source),
            "identifier" => Self::macro_call(node, source),
            "line_comment" | "block_comment" | "attribute_item" => Ok(NodeRole::Skip),
            _ => Ok(NodeRole::Descend),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::test_support::extract_str;
    use crate::symbol::{ReferenceKind, SymbolKind};

    #[test]
    fn test_impl_methods_attach_to_type() {
        let facts = extract_str(
            "rust",
            r#"
/// A parsed config.
#[derive(Debug)]
pub struct Config {
    name: String,
}

impl Config {
    /// Load from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self> {
        text.trim().len();
        todo!()
    }
}

pub fn main() {
    Config::load(Path::new("a")).unwrap();
}
"#,
        );

        let config = facts.symbol_named("Config").unwrap();
        assert_eq!(config.kind, SymbolKind::Class);
        assert_eq!(config.doc.as_deref(), Some("A parsed config."));

        let load = facts.symbol_named("load").unwrap();
        assert_eq!(load.kind, SymbolKind::Method);
        assert_eq!(load.parent, Some(0));
        assert_eq!(load.doc.as_deref(), Some("Load from disk."));
        assert_eq!(load.params.as_deref(), Some("(path: &Path) -> Result<Self>"));

        assert_eq!(facts.symbol_named("parse").unwrap().kind, SymbolKind::Method);
        assert_eq!(facts.symbol_named("main").unwrap().kind, SymbolKind::Function);

        let read = facts.references.iter().find(|r| r.name == "read_to_string").unwrap();
        assert_eq!(read.target, "std::fs::read_to_string");
        assert_eq!(read.kind, ReferenceKind::MethodCall);
        assert_eq!(facts.symbols[read.caller.unwrap()].name, "load");

        let names: Vec<_> = facts.references.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"trim"));
        assert!(names.contains(&"len"));
        assert!(names.contains(&"new"));
    }

    #[test]
    fn test_calls_inside_macro_arguments() {
        let facts = extract_str(
            "rust",
            r#"
fn helper() -> u32 {
    1
}

fn run(cfg: &Config) {
    println!("{}", helper());
    let v = vec![helper()];
    assert_eq!(Config::load(format!("{}", v.len())), self.size());
}
"#,
        );

        let helpers: Vec<_> = facts.references.iter().filter(|r| r.name == "helper").collect();
        assert_eq!(helpers.len(), 2);
        assert_eq!(helpers[0].kind, ReferenceKind::Call);
        assert_eq!(helpers[0].line, 7);
        assert_eq!(facts.symbols[helpers[0].caller.unwrap()].name, "run");

        let load = facts.references.iter().find(|r| r.name == "load").unwrap();
        assert_eq!(load.target, "Config::load");
        assert_eq!(load.kind, ReferenceKind::MethodCall);

        let size = facts.references.iter().find(|r| r.name == "size").unwrap();
        assert_eq!(size.target, "self.size");
        assert!(facts.references.iter().any(|r| r.name == "len"));

        // macro names themselves are not calls
        let names: Vec<_> = facts.references.iter().map(|r| r.name.as_str()).collect();
        assert!(!names.contains(&"println"));
        assert!(!names.contains(&"format"));
    }

    #[test]
    fn test_macro_generated_fn_is_not_a_call() {
        let facts = extract_str("rust", "my_macro! {\n    fn generated(x: u32) {}\n}\n");
        assert!(facts.references.iter().all(|r| r.name != "generated"));
    }

    #[test]
    fn test_trait_methods_and_consts() {
        let facts = extract_str(
            "rust",
            "pub const LIMIT: usize = 10;\npub trait Store {\n    fn get(&self, key: &str) -> Option<String>;\n}\n",
        );

        assert_eq!(facts.symbol_named("LIMIT").unwrap().kind, SymbolKind::Variable);
        let get = facts.symbol_named("get").unwrap();
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.parent, Some(1));
    }

    #[test]
    fn test_use_trees_are_flattened() {
        let facts = extract_str(
            "rust",
            "use std::collections::HashMap;\nuse std::io::{self, Read as R};\nuse crate::prelude::*;\nuse serde;\n",
        );

        let rendered: Vec<_> = facts
            .imports
            .iter()
            .map(|i| (i.module.as_str(), i.name.as_deref(), i.alias.as_deref()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("std::collections", Some("HashMap"), None),
                ("std::io", Some("self"), None),
                ("std::io", Some("Read"), Some("R")),
                ("crate::prelude", Some("*"), None),
                ("serde", None, None),
            ]
        );
    }
}
