//! # symdex - source tree symbol index
//!
//! Turns a source tree into a queryable index of code facts and answers
//! natural-language-style lookups against it.
//!
//! symdex provides:
//! - Tree-sitter parsing with pluggable language adapters (Python, JavaScript, Rust, Go)
//! - Scope-aware extraction of symbols, imports and call references
//! - SQLite-backed storage with per-file transactional replacement and staleness tracking
//! - An incremental, parallel indexing pipeline
//! - A query engine that classifies free text into intents and returns typed records

pub mod symbol;
pub mod storage;
pub mod adapter;
pub mod indexer;
pub mod query;
pub mod guard;
pub mod ignore;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use symbol::{FileFacts, Import, Reference, ReferenceKind, Span, Symbol, SymbolKind};
pub use storage::SqliteStore;
pub use indexer::{FileError, FileErrorKind, Indexer, IndexOptions, RunSummary};
pub use query::{QueryEngine, QueryResponse};
pub use guard::{AllowAll, AllowedRoots, PathGuard};

/// Result type alias for symdex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for symdex operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid kind: {0}")]
    InvalidKind(String),
}

/// Message sent from parallel indexer workers to the coordinator
#[derive(Debug)]
pub enum IndexMessage {
    Processed {
        record: storage::FileRecord,
        facts: FileFacts,
        status: FileStatus,
        /// Syntax error location when the facts come from a partial tree
        partial: Option<String>,
    },
    /// Content hash matched the stored one; only mtime/size moved
    Touched {
        relative_path: String,
        mtime: i64,
        size: i64,
    },
    Failed(indexer::FileError),
}

/// Status of a file during indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    New,
    Modified,
}
