//! Fact extraction
//!
//! Walks a parsed tree depth-first with an explicit work stack and keeps an
//! explicit scope stack, so deep trees cannot overflow the call stack and no
//! state outlives a single call. Each node is classified by the language
//! adapter; the extractor decides symbol kinds, parents and callers.

use std::collections::HashSet;

use tracing::trace;
use tree_sitter::Node;

use super::framework::{DefinitionKind, LanguageAdapter, NodeRole};
use super::parser::ParsedSource;
use crate::Result;
use crate::symbol::{FileFacts, Reference, Span, Symbol, SymbolKind};

/// Lines kept in a symbol snippet
pub const SNIPPET_LINES: usize = 5;
/// Docstrings longer than this are cut
pub const MAX_DOC_CHARS: usize = 500;
/// Call-site context lines longer than this are cut
pub const MAX_CONTEXT_CHARS: usize = 120;

/// Kind of lexical scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Container,
    Callable,
}

/// One entry on the scope stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Index of the symbol that opened the scope; `None` for the module and `impl` blocks
    pub symbol: Option<usize>,
    /// Type an anonymous container attaches its callables to
    pub owner: Option<String>,
}

/// Stack of open scopes. The module scope is always at the bottom.
#[derive(Debug)]
pub struct ScopeStack {
    root: Scope,
    nested: Vec<Scope>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            root: Scope {
                kind: ScopeKind::Module,
                symbol: None,
                owner: None,
            },
            nested: Vec::new(),
        }
    }

    pub fn push(&mut self, scope: Scope) {
        self.nested.push(scope);
    }

    /// Close the innermost scope. The module scope is never popped.
    pub fn pop(&mut self) -> Option<Scope> {
        self.nested.pop()
    }

    pub fn current(&self) -> &Scope {
        self.nested.last().unwrap_or(&self.root)
    }

    /// Innermost scope that was opened by a symbol
    pub fn enclosing_symbol(&self) -> Option<usize> {
        self.nested.iter().rev().find_map(|s| s.symbol)
    }

    pub fn depth(&self) -> usize {
        self.nested.len()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

enum Step<'tree> {
    Visit(Node<'tree>),
    Leave,
}

/// Extract symbols, imports and references from a parsed file.
///
/// Pure function of the tree: the same source always yields the same facts
/// in the same order.
pub fn extract(adapter: &dyn LanguageAdapter, parsed: &ParsedSource) -> Result<FileFacts> {
    let source = parsed.text.as_bytes();
    let lines: Vec<&str> = parsed.text.lines().collect();

    let mut facts = FileFacts::new();
    let mut scopes = ScopeStack::new();
    let mut pending_owners: Vec<(usize, String)> = Vec::new();
    let mut seen: HashSet<(String, u32)> = HashSet::new();
    let mut stack = vec![Step::Visit(parsed.root())];

    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Leave => {
                scopes.pop();
                continue;
            }
            Step::Visit(node) => node,
        };

        match adapter.classify(node, source)? {
            NodeRole::Definition(def) => {
                let scope_kind = scopes.current().kind;
                let scope_owner = scopes.current().owner.clone();

                // Locals are not recorded, but their initializers may hold calls
                if def.kind == DefinitionKind::Value && scope_kind == ScopeKind::Callable {
                    push_children(&mut stack, node);
                    continue;
                }

                let kind = match def.kind {
                    DefinitionKind::Container => SymbolKind::Class,
                    DefinitionKind::Value => SymbolKind::Variable,
                    DefinitionKind::Callable
                        if scope_kind == ScopeKind::Container || def.owner.is_some() =>
                    {
                        SymbolKind::Method
                    }
                    DefinitionKind::Callable => SymbolKind::Function,
                };

                let span = Span::from_node(&def.node);
                let index = if seen.insert((def.name.clone(), span.start_byte)) {
                    let mut symbol = Symbol::new(def.name, kind, span)
                        .with_snippet(snippet(&lines, span.start_line));
                    symbol.parent = scopes.enclosing_symbol();
                    symbol.params = def.params;
                    symbol.doc = def.doc.map(|d| truncate_chars(&d, MAX_DOC_CHARS));
                    trace!(name = %symbol.name, kind = %kind, line = span.start_line, "definition");
                    facts.symbols.push(symbol);

                    let index = facts.symbols.len() - 1;
                    if let Some(owner) = def.owner.or(scope_owner) {
                        if kind == SymbolKind::Method {
                            pending_owners.push((index, owner));
                        }
                    }
                    Some(index)
                } else {
                    None
                };

                if def.kind != DefinitionKind::Value {
                    let kind = if def.kind == DefinitionKind::Container {
                        ScopeKind::Container
                    } else {
                        ScopeKind::Callable
                    };
                    scopes.push(Scope { kind, symbol: index, owner: None });
                    stack.push(Step::Leave);
                }
                push_children(&mut stack, node);
            }
            NodeRole::Owner(owner) => {
                scopes.push(Scope {
                    kind: ScopeKind::Container,
                    symbol: None,
                    owner: Some(owner),
                });
                stack.push(Step::Leave);
                push_children(&mut stack, node);
            }
            NodeRole::Import(imports) => facts.imports.extend(imports),
            NodeRole::Call(call) => {
                let pos = node.start_position();
                facts.references.push(Reference {
                    name: call.name,
                    target: call.target,
                    kind: call.kind,
                    line: pos.row as u32 + 1,
                    column: pos.column as u32,
                    caller: scopes.enclosing_symbol(),
                    context: context_line(&lines, pos.row),
                });
                push_children(&mut stack, node);
            }
            NodeRole::Descend => push_children(&mut stack, node),
            NodeRole::Skip => {}
        }
    }

    resolve_owners(&mut facts, pending_owners);
    Ok(facts)
}

/// Queue named children so they are visited in source order
fn push_children<'tree>(stack: &mut Vec<Step<'tree>>, node: Node<'tree>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
    stack.extend(children.into_iter().rev().map(Step::Visit));
}

/// Attach methods declared outside their type's body (`impl X`, Go receivers)
/// to the same-file container named after the owner.
fn resolve_owners(facts: &mut FileFacts, pending: Vec<(usize, String)>) {
    for (index, owner) in pending {
        let container = facts
            .symbols
            .iter()
            .position(|s| s.kind == SymbolKind::Class && s.name == owner);
        if let (Some(container), Some(symbol)) = (container, facts.symbols.get_mut(index)) {
            if symbol.parent.is_none() {
                symbol.parent = Some(container);
            }
        }
    }
}

fn snippet(lines: &[&str], start_line: u32) -> String {
    let start = (start_line as usize).saturating_sub(1);
    lines
        .iter()
        .skip(start)
        .take(SNIPPET_LINES)
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

fn context_line(lines: &[&str], row: usize) -> String {
    lines
        .get(row)
        .map(|line| truncate_chars(line.trim(), MAX_CONTEXT_CHARS))
        .unwrap_or_default()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
