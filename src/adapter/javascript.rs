//! JavaScript language adapter
//!
//! Handles ES modules and CommonJS: class/function declarations, methods,
//! `const f = () => {}` style functions, top-level bindings, `import`
//! statements, `require()` calls and call/`new` expressions.

use super::framework::{
    CallSite, Definition, DefinitionKind, LanguageAdapter, NodeRole, definition_name, field_text,
    node_text, strip_quotes,
};
use crate::Result;
use crate::symbol::{Import, ReferenceKind};
use tree_sitter::{Language, Node};

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// JavaScript language adapter
pub struct JavaScriptAdapter;

impl JavaScriptAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `/** ... */` block directly above the declaration (or its `export`)
    fn jsdoc(node: Node, source: &[u8]) -> Option<String> {
        let mut anchor = node;
        if node.kind() == "variable_declarator" {
            anchor = node.parent()?;
        }
        if let Some(parent) = anchor.parent() {
            if parent.kind() == "export_statement" {
                anchor = parent;
            }
        }

        let comment = anchor.prev_named_sibling()?;
        if comment.kind() != "comment" || comment.end_position().row + 1 < anchor.start_position().row {
            return None;
        }
        let text = comment.utf8_text(source).ok()?;
        let body = text.strip_prefix("/**")?.strip_suffix("*/")?;
        let doc = body
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if doc.is_empty() { None } else { Some(doc) }
    }

    fn declaration<'tree>(
        node: Node<'tree>,
        source: &[u8],
        kind: DefinitionKind,
    ) -> Result<NodeRole<'tree>> {
        let Some(name) = definition_name(node, source)? else {
            return Ok(NodeRole::Descend);
        };
        let params = if kind == DefinitionKind::Callable {
            field_text(node, "parameters", source)?
        } else {
            None
        };
        Ok(NodeRole::Definition(
            Definition::new(kind, name, node)
                .with_params(params)
                .with_doc(Self::jsdoc(node, source)),
        ))
    }

    /// `const name = value`; a function value makes it a callable
    fn declarator<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let name = match node.child_by_field_name("name") {
            Some(name) if name.kind() == "identifier" => node_text(name, source)?.to_string(),
            // destructuring patterns bind no single name
            Some(_) => return Ok(NodeRole::Descend),
            None => match definition_name(node, source)? {
                Some(name) => name,
                None => return Ok(NodeRole::Descend),
            },
        };

        let function_value = node
            .child_by_field_name("value")
            .filter(|value| FUNCTION_VALUES.contains(&value.kind()));

        let def = match function_value {
            Some(value) => {
                let params = match field_text(value, "parameters", source)? {
                    Some(params) => Some(params),
                    None => field_text(value, "parameter", source)?,
                };
                Definition::new(DefinitionKind::Callable, name, node).with_params(params)
            }
            None => Definition::new(DefinitionKind::Value, name, node),
        };
        Ok(NodeRole::Definition(def.with_doc(Self::jsdoc(node, source))))
    }

    /// Class field: `count = 0;`
    fn field<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        match field_text(node, "property", source)? {
            Some(name) => Ok(NodeRole::Definition(Definition::new(DefinitionKind::Value, name, node))),
            None => Ok(NodeRole::Descend),
        }
    }

    fn imports<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let line = node.start_position().row as u32 + 1;
        let Some(module) = field_text(node, "source", source)? else {
            return Ok(NodeRole::Skip);
        };
        let module = strip_quotes(&module).to_string();

        let mut imports = Vec::new();
        let mut cursor = node.walk();
        let clause = node.named_children(&mut cursor).find(|c| c.kind() == "import_clause");

        let Some(clause) = clause else {
            // side-effect import: import './polyfill.js'
            imports.push(Import::module(module, line));
            return Ok(NodeRole::Import(imports));
        };

        let mut cursor = clause.walk();
        for part in clause.named_children(&mut cursor) {
            match part.kind() {
                // import React from 'react'
                "identifier" => imports.push(
                    Import::module(module.clone(), line)
                        .with_name("default")
                        .with_alias(Some(node_text(part, source)?.to_string())),
                ),
                // import * as path from 'path'
                "namespace_import" => {
                    let mut inner = part.walk();
                    let alias = part
                        .named_children(&mut inner)
                        .find(|c| c.kind() == "identifier")
                        .map(|c| node_text(c, source).map(str::to_string))
                        .transpose()?;
                    imports.push(Import::module(module.clone(), line).with_name("*").with_alias(alias));
                }
                // import { a, b as c } from './m.js'
                "named_imports" => {
                    let mut inner = part.walk();
                    for spec in part.named_children(&mut inner) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        if let Some(name) = field_text(spec, "name", source)? {
                            let alias = field_text(spec, "alias", source)?;
                            imports.push(
                                Import::module(module.clone(), line).with_name(name).with_alias(alias),
                            );
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(NodeRole::Import(imports))
    }

    /// `require('x')` with a single string literal argument
    fn require_import(node: Node, source: &[u8]) -> Result<Option<Import>> {
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return Ok(None);
        };
        if arguments.named_child_count() != 1 {
            return Ok(None);
        }
        match arguments.named_child(0) {
            Some(arg) if arg.kind() == "string" => {
                let module = strip_quotes(node_text(arg, source)?).to_string();
                Ok(Some(Import::module(module, node.start_position().row as u32 + 1)))
            }
            _ => Ok(None),
        }
    }

    fn call<'tree>(node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        let field = if node.kind() == "new_expression" { "constructor" } else { "function" };
        let Some(function) = node.child_by_field_name(field) else {
            return Ok(NodeRole::Descend);
        };
        let target = node_text(function, source)?;

        let call = match function.kind() {
            "identifier" if target == "require" => {
                if let Some(import) = Self::require_import(node, source)? {
                    return Ok(NodeRole::Import(vec![import]));
                }
                CallSite::new(target, target, ReferenceKind::Call)
            }
            "identifier" => CallSite::new(target, target, ReferenceKind::Call),
            "member_expression" => match field_text(function, "property", source)? {
                Some(property) => CallSite::new(property, target, ReferenceKind::MethodCall),
                None => CallSite::dynamic(target),
            },
            _ => CallSite::dynamic(target),
        };
        Ok(NodeRole::Call(call))
    }
}

impl Default for JavaScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for JavaScriptAdapter {
    fn language_name(&self) -> &str {
        "javascript"
    }

    fn file_extensions(&self) -> &[&str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn language(&self) -> Language {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn classify<'tree>(&self, node: Node<'tree>, source: &[u8]) -> Result<NodeRole<'tree>> {
        match node.kind() {
            "class_declaration" => Self::declaration(node, source, DefinitionKind::Container),
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                Self::declaration(node, source, DefinitionKind::Callable)
            }
            "variable_declarator" => Self::declarator(node, source),
            "field_definition" => Self::field(node, source),
            "import_statement" => Self::imports(node, source),
            "call_expression" | "new_expression" => Self::call(node, source),
            "comment" => Ok(NodeRole::Skip),
            _ => Ok(NodeRole::Descend),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::test_support::extract_str;
    use crate::symbol::{ReferenceKind, SymbolKind};

    #[test]
    fn test_classes_functions_and_methods() {
        let facts = extract_str(
            "javascript",
            r#"
/**
 * Renders the page.
 */
export class Page {
  count = 0;

  render(props) {
    return this.layout(props);
  }
}

function helper(a, b) {
  const local = 1;
  return a + b;
}

const handler = async (event) => helper(event, 1);
const VERSION = "1.0";
"#,
        );

        let page = facts.symbol_named("Page").unwrap();
        assert_eq!(page.kind, SymbolKind::Class);
        assert_eq!(page.doc.as_deref(), Some("Renders the page."));

        let count = facts.symbol_named("count").unwrap();
        assert_eq!(count.kind, SymbolKind::Variable);

        let render = facts.symbol_named("render").unwrap();
        assert_eq!(render.kind, SymbolKind::Method);
        assert_eq!(render.params.as_deref(), Some("(props)"));

        assert_eq!(facts.symbol_named("helper").unwrap().kind, SymbolKind::Function);
        assert!(facts.symbol_named("local").is_none());

        let handler = facts.symbol_named("handler").unwrap();
        assert_eq!(handler.kind, SymbolKind::Function);
        assert_eq!(handler.params.as_deref(), Some("(event)"));

        assert_eq!(facts.symbol_named("VERSION").unwrap().kind, SymbolKind::Variable);

        let layout = &facts.references[0];
        assert_eq!(layout.name, "layout");
        assert_eq!(layout.target, "this.layout");
        assert_eq!(layout.kind, ReferenceKind::MethodCall);

        let helper_call = facts.references.iter().find(|r| r.name == "helper").unwrap();
        let caller = helper_call.caller.unwrap();
        assert_eq!(facts.symbols[caller].name, "handler");
    }

    #[test]
    fn test_imports_and_require() {
        let facts = extract_str(
            "javascript",
            r#"import React from 'react';
import * as path from "path";
import { readFile, writeFile as write } from './fs.js';
import './polyfill.js';
const lodash = require('lodash');
"#,
        );

        let rendered: Vec<_> = facts
            .imports
            .iter()
            .map(|i| (i.module.as_str(), i.name.as_deref(), i.alias.as_deref()))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("react", Some("default"), Some("React")),
                ("path", Some("*"), Some("path")),
                ("./fs.js", Some("readFile"), None),
                ("./fs.js", Some("writeFile"), Some("write")),
                ("./polyfill.js", None, None),
                ("lodash", None, None),
            ]
        );
        assert!(facts.references.is_empty());
    }

    #[test]
    fn test_new_and_dynamic_calls() {
        let facts = extract_str(
            "javascript",
            "function boot() {\n  const app = new App();\n  handlers[name]();\n}\n",
        );

        let calls: Vec<_> = facts.references.iter().map(|r| (r.name.as_str(), r.kind)).collect();
        assert_eq!(
            calls,
            vec![("App", ReferenceKind::Call), ("handlers[name]", ReferenceKind::Dynamic)]
        );
    }
}
