//! Query classification
//!
//! Free text is matched against an ordered rule table; the first rule whose
//! pattern matches and whose builder accepts the captures decides the intent.
//! Anything left over is a plain symbol search.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::symbol::SymbolKind;

/// What a query asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Overview,
    Unused,
    Callers {
        target: String,
    },
    Describe {
        target: String,
    },
    Dependencies {
        target: String,
    },
    Files {
        fragment: String,
    },
    SymbolSearch {
        term: String,
        kind: Option<SymbolKind>,
        parent: Option<String>,
    },
    ImportSearch {
        term: String,
    },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Overview => "overview",
            Intent::Unused => "unused",
            Intent::Callers { .. } => "callers",
            Intent::Describe { .. } => "describe",
            Intent::Dependencies { .. } => "dependencies",
            Intent::Files { .. } => "files",
            Intent::SymbolSearch { .. } => "symbol_search",
            Intent::ImportSearch { .. } => "import_search",
        }
    }

    fn search(term: String) -> Self {
        Intent::SymbolSearch { term, kind: None, parent: None }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Overview | Intent::Unused => write!(f, "{}", self.name()),
            Intent::Callers { target }
            | Intent::Describe { target }
            | Intent::Dependencies { target } => write!(f, "{} {}", self.name(), target),
            Intent::Files { fragment } => write!(f, "files {}", fragment),
            Intent::ImportSearch { term } => write!(f, "import {}", term),
            Intent::SymbolSearch { term, kind, parent } => {
                match kind {
                    Some(kind) => write!(f, "{} {}", kind, term)?,
                    None => write!(f, "symbol {}", term)?,
                }
                if let Some(parent) = parent {
                    write!(f, " in {}", parent)?;
                }
                Ok(())
            }
        }
    }
}

type Builder = fn(&Captures) -> Option<Intent>;

struct Rule {
    pattern: Regex,
    build: Builder,
}

/// (pattern, builder) in priority order. Patterns are matched against the
/// trimmed query, case-insensitively.
const RULE_TABLE: &[(&str, Builder)] = &[
    // overview
    (r"^(?:overview|architecture|summary|codebase|stats?)$", |_| Some(Intent::Overview)),
    (
        r"^(?:show|give)(?: me)?(?: an?| the)? (?:overview|architecture|summary)\b",
        |_| Some(Intent::Overview),
    ),
    // unused
    (
        r"^(?:find |show |list )?(?:me )?(?:all )?(?:unused|dead)\b(?: code)?(?: functions?| methods?)?$",
        |_| Some(Intent::Unused),
    ),
    // callers
    (r"^(?:where|when) do (?:i|we|you) (?:call|use|invoke)\s+(.+)$", callers),
    (r"^(?:who|what) calls?\s+(.+)$", callers),
    (
        r"^(?:find |show )?(?:all )?(?:usages?|references?|calls?|callers?) (?:of|to|for)\s+(.+)$",
        callers,
    ),
    (r"^(?:callers?|usages?|calls)\s+(.+)$", callers),
    // describe
    (
        r"^(?:describe|explain|what does|what is|tell me about|show me)\s+(.+?)(?:\s+do)?$",
        |caps| target(caps, 1).map(|target| Intent::Describe { target }),
    ),
    // dependencies
    (
        r"^(?:what )?(?:imports?|deps|dependencies) (?:does|of|for|in)\s+(.+?)(?:\s+(?:use|import|need))?$",
        dependencies,
    ),
    (r"^(?:deps?|dependencies)\s+(.+)$", dependencies),
    // files
    (r"^(?:show |list |find )?(?:all )?files?\s+(?:in|under|from|matching)\s+(.+)$", files),
    (r"^files?\s+(.+)$", files),
    // kind-filtered symbol search
    (
        r"^(?:find |search |show |list )?(?:all )?(class(?:es)?|struct|enum|trait|interface|functions?|func|fn|def|methods?|variables?|var|const)\s+(.+)$",
        kind_search,
    ),
    // import search
    (
        r"^(?:find |search |show |list )?(?:all )?imports?\s+(?:of\s+)?(.+)$",
        |caps| target(caps, 1).map(|term| Intent::ImportSearch { term }),
    ),
];

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        RULE_TABLE
            .iter()
            .filter_map(|(pattern, build)| match Regex::new(&format!("(?i){}", pattern)) {
                Ok(pattern) => Some(Rule { pattern, build: *build }),
                Err(e) => {
                    error!("Invalid query rule {}: {}", pattern, e);
                    None
                }
            })
            .collect()
    })
}

/// Classify a free-text query. Never fails: unmatched text is a symbol search.
pub fn classify(text: &str) -> Intent {
    let text = text.trim().trim_end_matches(['?', '!']).trim_end();
    if clean_target(text).is_empty() {
        return Intent::Overview;
    }

    for rule in rules() {
        if let Some(caps) = rule.pattern.captures(text) {
            if let Some(intent) = (rule.build)(&caps) {
                return intent;
            }
        }
    }

    Intent::search(clean_target(text))
}

/// Strip quoting and trailing punctuation from a captured target
fn clean_target(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '?' | '"' | '\'' | '`' | '.' | ',' | '!'))
        .trim()
        .to_string()
}

fn target(caps: &Captures, group: usize) -> Option<String> {
    let cleaned = clean_target(caps.get(group)?.as_str());
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

fn callers(caps: &Captures) -> Option<Intent> {
    // `forward()` and `forward` ask the same thing
    let target = target(caps, 1)?;
    let target = target.strip_suffix("()").unwrap_or(&target).to_string();
    Some(Intent::Callers { target })
}

fn dependencies(caps: &Captures) -> Option<Intent> {
    target(caps, 1).map(|target| Intent::Dependencies { target })
}

fn files(caps: &Captures) -> Option<Intent> {
    target(caps, 1).map(|fragment| Intent::Files { fragment })
}

fn kind_search(caps: &Captures) -> Option<Intent> {
    let kind: SymbolKind = caps.get(1)?.as_str().parse().ok()?;
    let rest = target(caps, 2)?;

    let (term, parent) = match rest.split_once(" in ") {
        Some((term, parent)) if kind == SymbolKind::Method => {
            (clean_target(term), Some(clean_target(parent)).filter(|p| !p.is_empty()))
        }
        _ => (rest, None),
    };
    if term.is_empty() {
        return None;
    }
    Some(Intent::SymbolSearch { term, kind: Some(kind), parent })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callers(target: &str) -> Intent {
        Intent::Callers { target: target.to_string() }
    }

    fn describe(target: &str) -> Intent {
        Intent::Describe { target: target.to_string() }
    }

    fn deps(target: &str) -> Intent {
        Intent::Dependencies { target: target.to_string() }
    }

    #[test]
    fn test_every_rule_compiles() {
        assert_eq!(rules().len(), RULE_TABLE.len());
    }

    #[test]
    fn test_overview() {
        for text in ["overview", "Architecture", "stats", "show me an overview", "give me the summary", "", "  ?  "] {
            assert_eq!(classify(text), Intent::Overview, "{:?}", text);
        }
    }

    #[test]
    fn test_unused() {
        for text in [
            "unused",
            "dead code",
            "find unused functions",
            "show dead methods",
            "show me dead code",
            "list me unused",
        ] {
            assert_eq!(classify(text), Intent::Unused, "{:?}", text);
        }
        // only the whole word triggers it
        assert_eq!(classify("dead_letter"), Intent::search("dead_letter".to_string()));
    }

    #[test]
    fn test_callers() {
        assert_eq!(classify("who calls forward"), callers("forward"));
        assert_eq!(classify("What calls forward()?"), callers("forward"));
        assert_eq!(classify("where do I call parse_args"), callers("parse_args"));
        assert_eq!(classify("usages of Flow"), callers("Flow"));
        assert_eq!(classify("find all references to self.forward"), callers("self.forward"));
        assert_eq!(classify("callers of run"), callers("run"));
        assert_eq!(classify("calls run"), callers("run"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(classify("describe Flow"), describe("Flow"));
        assert_eq!(classify("explain `sample`"), describe("sample"));
        assert_eq!(classify("what does forward do?"), describe("forward"));
        assert_eq!(classify("what is Flow"), describe("Flow"));
        assert_eq!(classify("tell me about Config"), describe("Config"));
    }

    #[test]
    fn test_dependencies() {
        assert_eq!(classify("deps models/flow.py"), deps("models/flow.py"));
        assert_eq!(classify("dependencies of models.flow"), deps("models.flow"));
        assert_eq!(classify("what imports does train.py use"), deps("train.py"));
        assert_eq!(classify("imports of train"), deps("train"));
    }

    #[test]
    fn test_files() {
        assert_eq!(classify("files in src/models"), Intent::Files { fragment: "src/models".to_string() });
        assert_eq!(classify("list all files under tests"), Intent::Files { fragment: "tests".to_string() });
        assert_eq!(classify("file flow.py"), Intent::Files { fragment: "flow.py".to_string() });
    }

    #[test]
    fn test_kind_search() {
        assert_eq!(
            classify("class Flow"),
            Intent::SymbolSearch { term: "Flow".to_string(), kind: Some(SymbolKind::Class), parent: None }
        );
        assert_eq!(
            classify("def sample"),
            Intent::SymbolSearch { term: "sample".to_string(), kind: Some(SymbolKind::Function), parent: None }
        );
        assert_eq!(
            classify("find all functions train"),
            Intent::SymbolSearch { term: "train".to_string(), kind: Some(SymbolKind::Function), parent: None }
        );
        assert_eq!(
            classify("method forward in Flow"),
            Intent::SymbolSearch {
                term: "forward".to_string(),
                kind: Some(SymbolKind::Method),
                parent: Some("Flow".to_string()),
            }
        );
        assert_eq!(
            classify("variable MAX_RETRIES"),
            Intent::SymbolSearch { term: "MAX_RETRIES".to_string(), kind: Some(SymbolKind::Variable), parent: None }
        );
    }

    #[test]
    fn test_import_search() {
        assert_eq!(classify("import torch"), Intent::ImportSearch { term: "torch".to_string() });
        assert_eq!(classify("find imports numpy"), Intent::ImportSearch { term: "numpy".to_string() });
    }

    #[test]
    fn test_fallback_and_priority() {
        assert_eq!(classify("forward"), Intent::search("forward".to_string()));
        assert_eq!(classify("  Flow?  "), Intent::search("Flow".to_string()));
        // callers outrank describe and the bare-name fallback
        assert_eq!(classify("who calls describe"), callers("describe"));
        // overview outranks describe's "show me"
        assert_eq!(classify("show me the architecture"), Intent::Overview);
        // a keyword with nothing after it is just a name
        assert_eq!(classify("describe"), Intent::search("describe".to_string()));
    }

    #[test]
    fn test_display() {
        assert_eq!(classify("method forward in Flow").to_string(), "method forward in Flow");
        assert_eq!(classify("who calls x").to_string(), "callers x");
        assert_eq!(classify("x").to_string(), "symbol x");
    }
}
