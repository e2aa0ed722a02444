//! Go language adapter
//!
//! Type declarations are containers. Methods are declared outside their
//! type, so the receiver type becomes the owner and the extractor attaches
//! the method to the same-file type of that name.

use super::framework::{
    CallSite, Definition, DefinitionKind, LanguageAdapter, NodeRole, definition_name, field_text,
    node_text, preceding_comments, strip_quotes,
};
use crate::Result;
use crate::symbol::{Import, ReferenceKind};
use tree_sitter::{Language, Node};

/// Go language adapter
pub struct GoAdapter;

impl GoAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `//` comment lines above a declaration. Specs inside a
    /// `type (...)`/`var (...)` group fall back to the group's comment.
    fn doc_comment(node: Node, source: &[u8]) -> Option<String> {
        let strip = |text: &str| text.strip_prefix("//").map(|rest| rest.trim().to_string());
        preceding_comments(node, source, &["comment"], strip).or_else(|| {
            let parent = node.parent()?;
            if matches!(parent.kind(), "type_declaration" | "var_declaration" | "const_declaration") {
                preceding_comments(parent, source, &["comment"], strip)
            } else {
                None
            }
        })
    }

    fn signature(node: Node, source: &[u8]) -> Result<Option<String>> {
        let params = field_text(node, "parameters", source)?;
        let result = field_text(node, "result", source)?;
        Ok(match (params, result) {
            (Some(params), Some(result)) => Some(format!("{} {}", params, result)),
            (params, _) => params,
        })
    }

    /// `(s *Server)` -> `Server`, `(l List[T])` -> `List`
    fn receiver_type(node: Node, source: &[u8]) -> Result<Option<String>> {
        let Some(receiver) = node.child_by_field_name("receiver") else {
            return Ok(None);
        };
        let mut cursor = receiver.walk();
        let Some(param) = receiver
            .named_children(&mut cursor)
            .find(|c| c.kind() == "parameter_declaration")
        else {
            return Ok(None);
        };
        let Some(ty) = field_text(param, "type", source)? else {
            return Ok(None);
        };
        let name = ty.trim_start_matches('*');
        let name = name.split('[').next().unwrap_or(name).trim();
        Ok(if name.is_empty() { None } else { Some(name.to_string()) })
    }

    fn function<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(name) = definition_name(node, source)? else {
            return Ok(NodeRole::Descend);
        };
        let owner = if node.kind() == "method_declaration" {
            Self::receiver_type(node, source)?
        } else {
            None
        };
        Ok(NodeRole::Definition(
            Definition::new(DefinitionKind::Callable, name, node)
                .with_params(Self::signature(node, source)?)
                .with_doc(Self::doc_comment(node, source))
                .with_owner(owner),
        ))
    }

    fn spec<'tree>(node: Node<'tree>, source: &[u8], kind: DefinitionKind) -> Result<NodeRole<'tree>> {
        let Some(name) = definition_name(node, source)? else {
            return Ok(NodeRole::Descend);
        };
        Ok(NodeRole::Definition(
            Definition::new(kind, name, node).with_doc(Self::doc_comment(node, source)),
        ))
    }

    /// One name of `var a, b = ..` or `const (x, y = ..)`, spanning its spec
    fn value_name<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(spec) = node.parent().filter(|p| matches!(p.kind(), "var_spec" | "const_spec")) else {
            return Ok(NodeRole::Descend);
        };
        let mut cursor = spec.walk();
        if !spec.children_by_field_name("name", &mut cursor).any(|name| name == node) {
            return Ok(NodeRole::Descend);
        }
        let name = node_text(node, source)?;
        if name == "_" {
            return Ok(NodeRole::Skip);
        }
        Ok(NodeRole::Definition(
            Definition::new(DefinitionKind::Value, name, spec)
                .with_doc(Self::doc_comment(spec, source)),
        ))
    }

    fn import<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(path) = field_text(node, "path", source)? else {
            return Ok(NodeRole::Skip);
        };
        let alias = field_text(node, "name", source)?;
        let line = node.start_position().row as u32 + 1;
        Ok(NodeRole::Import(vec![
            Import::module(strip_quotes(&path), line).with_alias(alias),
        ]))
    }

    fn call<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(function) = node.child_by_field_name("function") else {
            return Ok(NodeRole::Descend);
        };
        let target = node_text(function, source)?;

        let call = match function.kind() {
            "identifier" => CallSite::new(target, target, ReferenceKind::Call),
            "selector_expression" => match field_text(function, "field", source)? {
                Some(field) => CallSite::new(field, target, ReferenceKind::MethodCall),
                None => CallSite::dynamic(target),
            },
            _ => CallSite::dynamic(target),
        };
        Ok(NodeRole::Call(call))
    }
}

impl Default for GoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for GoAdapter {
    fn language_name(&self) -> &str {
        "go"
    }

    fn file_extensions(&self) -> &[&str] {
        &["go"]
    }

    fn language(&self) -> Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn classify<'tree>(&self, node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        match node.kind() {
            "function_declaration" | "method_declaration" => Self::function(node, source),
            "type_spec" | "type_alias" => Self::spec(node, source, DefinitionKind::Container),
            "identifier" => Self::value_name(node, source),
            "import_spec" => Self::import(node, source),
            "call_expression" => Self::call(node, source),
            "package_clause" | "comment" => Ok(NodeRole::Skip),
            _ => Ok(NodeRole::Descend),
        }
    }
}
