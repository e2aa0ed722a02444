//! Python language adapter
//!
//! Classes, functions (methods inside classes), module/class level
//! assignments, `import`/`from` statements and calls.

use super::framework::{
    CallSite, Definition, DefinitionKind, LanguageAdapter, NodeRole, definition_name, field_text,
    node_text, strip_quotes,
};
use crate::Result;
use crate::symbol::{Import, ReferenceKind};
use tree_sitter::{Language, Node};

/// Python language adapter
pub struct PythonAdapter;

impl PythonAdapter {
    /// Create a new Python adapter
    pub fn new() -> Self {
        Self
    }

    /// Docstring: a string literal as the first statement of the body
    fn docstring(node: Node, source: &[u8]) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first_stmt = body.named_child(0)?;
        if first_stmt.kind() != "expression_statement" {
            return None;
        }
        let expr = first_stmt.named_child(0)?;
        if expr.kind() != "string" {
            return None;
        }
        let raw = expr.utf8_text(source).ok()?;
        let doc = strip_quotes(raw).trim();
        if doc.is_empty() { None } else { Some(doc.to_string()) }
    }

    fn function<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(name) = definition_name(node, source)? else {
            return Ok(NodeRole::Descend);
        };
        let params = match (
            field_text(node, "parameters", source)?,
            field_text(node, "return_type", source)?,
        ) {
            (Some(params), Some(ret)) => Some(format!("{} -> {}", params, ret)),
            (params, _) => params,
        };
        Ok(NodeRole::Definition(
            Definition::new(DefinitionKind::Callable, name, node)
                .with_params(params)
                .with_doc(Self::docstring(node, source)),
        ))
    }

    fn class<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(name) = definition_name(node, source)? else {
            return Ok(NodeRole::Descend);
        };
        Ok(NodeRole::Definition(
            Definition::new(DefinitionKind::Container, name, node)
                .with_doc(Self::docstring(node, source)),
        ))
    }

    /// `x = ...` / `x: T = ...` with a plain identifier target
    fn assignment<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        match node.child_by_field_name("left") {
            Some(left) if left.kind() == "identifier" => {
                let name = node_text(left, source)?;
                Ok(NodeRole::Definition(Definition::new(DefinitionKind::Value, name, node)))
            }
            _ => Ok(NodeRole::Descend),
        }
    }

    /// `dotted_name` or `aliased_import` to (name, alias)
    fn imported_name(node: Node, source: &[u8]) -> Result<Option<(String, Option<String>)>> {
        match node.kind() {
            "dotted_name" | "identifier" => Ok(Some((node_text(node, source)?.to_string(), None))),
            "aliased_import" => {
                let name = field_text(node, "name", source)?;
                let alias = field_text(node, "alias", source)?;
                Ok(name.map(|n| (n, alias)))
            }
            _ => Ok(None),
        }
    }

    fn imports<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let line = node.start_position().row as u32 + 1;
        let mut imports = Vec::new();
        let mut cursor = node.walk();

        match node.kind() {
            // import a.b, c as d
            "import_statement" => {
                for child in node.children_by_field_name("name", &mut cursor) {
                    if let Some((module, alias)) = Self::imported_name(child, source)? {
                        imports.push(Import::module(module, line).with_alias(alias));
                    }
                }
            }
            // from m import a, b as c / from m import *
            _ => {
                let module = if node.kind() == "future_import_statement" {
                    "__future__".to_string()
                } else {
                    match field_text(node, "module_name", source)? {
                        Some(module) => module,
                        None => return Ok(NodeRole::Skip),
                    }
                };

                for child in node.children_by_field_name("name", &mut cursor) {
                    if let Some((name, alias)) = Self::imported_name(child, source)? {
                        imports.push(
                            Import::module(module.clone(), line)
                                .with_name(name)
                                .with_alias(alias),
                        );
                    }
                }

                let mut cursor = node.walk();
                if node.named_children(&mut cursor).any(|c| c.kind() == "wildcard_import") {
                    imports.push(Import::module(module, line).with_name("*"));
                }
            }
        }

        Ok(NodeRole::Import(imports))
    }

    fn call<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let Some(function) = node.child_by_field_name("function") else {
            return Ok(NodeRole::Descend);
        };
        let target = node_text(function, source)?;

        let call = match function.kind() {
            "identifier" => CallSite::new(target, target, ReferenceKind::Call),
            "attribute" => match field_text(function, "attribute", source)? {
                Some(attr) => CallSite::new(attr, target, ReferenceKind::MethodCall),
                None => CallSite::dynamic(target),
            },
            _ => CallSite::dynamic(target),
        };
        Ok(NodeRole::Call(call))
    }
}

impl Default for PythonAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for PythonAdapter {
    fn language_name(&self) -> &str {
        "python"
    }

    fn file_extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn language(&self) -> Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn classify<'tree>(&self, node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        match node.kind() {
            "function_definition" => Self::function(node, source),
            "class_definition" => Self::class(node, source),
            "assignment" => Self::assignment(node, source),
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                Self::imports(node, source)
            }
            "call" => Self::call(node, source),
            "comment" => Ok(NodeRole::Skip),
            _ => Ok(NodeRole::Descend),
        }
    }
}
