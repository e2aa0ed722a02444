//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - files(path, language, mtime, size, hash)
//! - symbols(file_id, name, kind, span, parent_id, params, doc, snippet)
//! - imports(file_id, module, name, alias, line)
//! - refs(file_id, name, target, kind, line, col, caller_id, context)

pub mod schema;
pub mod sqlite;

pub use sqlite::{
    CallerInfo, DbStats, FactCounts, FileRecord, FileState, Overview, SqliteStore, StoredFile,
    StoredImport, StoredReference, StoredSymbol,
};
