//! SQLite storage implementation

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use rusqlite::types::ToSql;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use crate::symbol::{FileFacts, ReferenceKind, Span, SymbolKind};
use super::schema;

/// Columns selected for every symbol row, in `row_to_symbol` order
const SYMBOL_SELECT: &str = r#"
SELECT s.id, f.path, s.name, s.kind, s.start_byte, s.end_byte, s.line_start, s.line_end,
       s.col_start, s.col_end, s.parent_id, p.name, s.params, s.doc, s.snippet
FROM symbols s
JOIN files f ON s.file_id = f.id
LEFT JOIN symbols p ON s.parent_id = p.id
"#;

/// Columns selected for every reference row, in `row_to_reference` order
const REFERENCE_SELECT: &str = r#"
SELECT r.id, f.path, r.name, r.target, r.kind, r.line, r.col, r.context,
       c.id, c.name, c.kind, c.line_start
FROM refs r
JOIN files f ON r.file_id = f.id
LEFT JOIN symbols c ON r.caller_id = c.id
"#;

/// Columns selected for every import row, in `row_to_import` order
const IMPORT_SELECT: &str = r#"
SELECT f.path, i.module, i.name, i.alias, i.line
FROM imports i
JOIN files f ON i.file_id = f.id
"#;

/// SQLite-backed storage for extracted facts
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::PRAGMAS)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an existing database for queries only.
    ///
    /// WAL mode lets this connection read while another process writes.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA busy_timeout = 5000; PRAGMA query_only = ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== File Operations ==========

    /// Insert or update a file row, returning its id
    pub fn upsert_file(&self, file: &FileRecord) -> Result<i64> {
        upsert_file_row(&self.conn, file)
    }

    /// Record a new mtime/size for a file whose content hash is unchanged
    pub fn touch_file(&self, path: &str, mtime: i64, size: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE files SET mtime = ?1, size = ?2 WHERE path = ?3",
            params![mtime, size, path],
        )?;
        Ok(())
    }

    /// Stored staleness markers for every indexed file, keyed by path
    pub fn file_states(&self) -> Result<HashMap<String, FileState>> {
        let mut stmt = self.conn.prepare("SELECT path, mtime, size, hash FROM files")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                FileState {
                    mtime: row.get(1)?,
                    size: row.get(2)?,
                    hash: row.get(3)?,
                },
            ))
        })?;

        let mut states = HashMap::new();
        for row in rows {
            let (path, state) = row?;
            states.insert(path, state);
        }
        Ok(states)
    }

    /// All indexed file paths, sorted
    pub fn file_paths(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM files ORDER BY path")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(paths)
    }

    /// Delete a file and every fact it owns
    pub fn remove_file(&mut self, path: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let file_id: Option<i64> = tx
            .query_row("SELECT id FROM files WHERE path = ?1", [path], |row| row.get(0))
            .optional()?;
        let Some(file_id) = file_id else {
            return Ok(false);
        };
        delete_facts(&tx, file_id)?;
        tx.execute("DELETE FROM files WHERE id = ?1", [file_id])?;
        tx.commit()?;
        Ok(true)
    }

    // ========== Fact Replacement ==========

    /// Replace everything known about one file in a single transaction.
    ///
    /// The file row is upserted, its previous symbols/imports/refs deleted and
    /// the new facts inserted. If any statement fails the transaction rolls
    /// back on drop and the previous fact set stays as it was.
    pub fn replace_facts(&mut self, file: &FileRecord, facts: &FileFacts) -> Result<FactCounts> {
        let tx = self.conn.transaction()?;
        let file_id = upsert_file_row(&tx, file)?;
        delete_facts(&tx, file_id)?;

        let mut symbol_ids = Vec::with_capacity(facts.symbols.len());
        {
            let mut insert_symbol = tx.prepare_cached(
                r#"
                INSERT INTO symbols (file_id, name, kind, start_byte, end_byte, line_start, line_end,
                                     col_start, col_end, params, doc, snippet)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )?;
            for symbol in &facts.symbols {
                insert_symbol.execute(params![
                    file_id,
                    symbol.name,
                    symbol.kind.as_str(),
                    symbol.span.start_byte,
                    symbol.span.end_byte,
                    symbol.span.start_line,
                    symbol.span.end_line,
                    symbol.span.start_col,
                    symbol.span.end_col,
                    symbol.params,
                    symbol.doc,
                    symbol.snippet,
                ])?;
                symbol_ids.push(tx.last_insert_rowid());
            }

            // Parents may be resolved after their children (Rust impls, Go receivers),
            // so links are written once every row id is known.
            let mut link_parent =
                tx.prepare_cached("UPDATE symbols SET parent_id = ?1 WHERE id = ?2")?;
            for (symbol, id) in facts.symbols.iter().zip(&symbol_ids) {
                if let Some(parent_id) = symbol.parent.and_then(|p| symbol_ids.get(p)) {
                    link_parent.execute(params![parent_id, id])?;
                }
            }

            let mut insert_import = tx.prepare_cached(
                "INSERT INTO imports (file_id, module, name, alias, line) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for import in &facts.imports {
                insert_import.execute(params![
                    file_id,
                    import.module,
                    import.name,
                    import.alias,
                    import.line,
                ])?;
            }

            let mut insert_ref = tx.prepare_cached(
                r#"
                INSERT INTO refs (file_id, name, target, kind, line, col, caller_id, context)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for reference in &facts.references {
                let caller_id = reference.caller.and_then(|c| symbol_ids.get(c)).copied();
                insert_ref.execute(params![
                    file_id,
                    reference.name,
                    reference.target,
                    reference.kind.as_str(),
                    reference.line,
                    reference.column,
                    caller_id,
                    reference.context,
                ])?;
            }
        }

        tx.commit()?;

        Ok(FactCounts {
            symbols: facts.symbols.len(),
            imports: facts.imports.len(),
            references: facts.references.len(),
        })
    }

    // ========== Symbol Queries ==========

    /// Symbols whose name contains `term` (case-insensitive)
    pub fn find_symbols_matching(
        &self,
        term: &str,
        kind: Option<SymbolKind>,
        parent: Option<&str>,
    ) -> Result<Vec<StoredSymbol>> {
        let mut sql = format!("{SYMBOL_SELECT} WHERE s.name LIKE ? ESCAPE '\\'");
        let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(like_pattern(term))];

        if let Some(kind) = kind {
            sql.push_str(" AND s.kind = ?");
            params.push(Box::new(kind.as_str()));
        }
        if let Some(parent) = parent {
            sql.push_str(" AND p.name LIKE ? ESCAPE '\\'");
            params.push(Box::new(like_pattern(parent)));
        }
        sql.push_str(" ORDER BY f.path, s.start_byte");

        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map(param_refs.as_slice(), |row| self.row_to_symbol(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Symbols with exactly this name (case-insensitive)
    pub fn find_symbols_named(&self, name: &str) -> Result<Vec<StoredSymbol>> {
        let sql = format!(
            "{SYMBOL_SELECT} WHERE s.name = ?1 COLLATE NOCASE ORDER BY f.path, s.start_byte"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map([name], |row| self.row_to_symbol(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Find symbols by kind
    pub fn find_symbols_by_kind(&self, kind: SymbolKind) -> Result<Vec<StoredSymbol>> {
        let sql = format!("{SYMBOL_SELECT} WHERE s.kind = ?1 ORDER BY f.path, s.start_byte");
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map([kind.as_str()], |row| self.row_to_symbol(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Find all symbols in a file
    pub fn find_symbols_in_file(&self, path: &str) -> Result<Vec<StoredSymbol>> {
        let sql = format!("{SYMBOL_SELECT} WHERE f.path = ?1 ORDER BY s.start_byte");
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map([path], |row| self.row_to_symbol(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Symbols whose enclosing symbol is `parent_id` (methods of a class, nested functions)
    pub fn find_children(&self, parent_id: i64) -> Result<Vec<StoredSymbol>> {
        let sql = format!("{SYMBOL_SELECT} WHERE s.parent_id = ?1 ORDER BY s.start_byte");
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map([parent_id], |row| self.row_to_symbol(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Functions and methods whose name no reference anywhere mentions
    pub fn unreferenced_callables(&self) -> Result<Vec<StoredSymbol>> {
        let sql = format!(
            r#"{SYMBOL_SELECT}
            WHERE s.kind IN ('function', 'method')
              AND NOT EXISTS (SELECT 1 FROM refs r WHERE r.name = s.name COLLATE NOCASE)
            ORDER BY f.path, s.start_byte"#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let symbols = stmt
            .query_map([], |row| self.row_to_symbol(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(symbols)
    }

    /// Distinct symbol names, for fuzzy matching
    pub fn symbol_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT name FROM symbols ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Count all symbols
    pub fn count_symbols(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM symbols")
    }

    /// Helper to convert a row to a StoredSymbol
    fn row_to_symbol(&self, row: &rusqlite::Row) -> rusqlite::Result<StoredSymbol> {
        let kind_str: String = row.get(3)?;
        let kind: SymbolKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StoredSymbol {
            id: row.get(0)?,
            path: row.get(1)?,
            name: row.get(2)?,
            kind,
            span: Span {
                start_byte: row.get(4)?,
                end_byte: row.get(5)?,
                start_line: row.get(6)?,
                end_line: row.get(7)?,
                start_col: row.get(8)?,
                end_col: row.get(9)?,
            },
            parent_id: row.get(10)?,
            parent_name: row.get(11)?,
            params: row.get(12)?,
            doc: row.get(13)?,
            snippet: row.get(14)?,
        })
    }

    // ========== Reference Queries ==========

    /// References whose simple name or full target equals `name` (case-insensitive)
    pub fn find_references_to(&self, name: &str) -> Result<Vec<StoredReference>> {
        let sql = format!(
            r#"{REFERENCE_SELECT}
            WHERE r.name = ?1 COLLATE NOCASE OR r.target = ?1 COLLATE NOCASE
            ORDER BY f.path, r.line, r.col, r.id"#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let refs = stmt
            .query_map([name], |row| self.row_to_reference(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    /// References made from inside a given symbol
    pub fn find_references_from(&self, caller_id: i64) -> Result<Vec<StoredReference>> {
        let sql = format!("{REFERENCE_SELECT} WHERE r.caller_id = ?1 ORDER BY r.line, r.col, r.id");
        let mut stmt = self.conn.prepare(&sql)?;
        let refs = stmt
            .query_map([caller_id], |row| self.row_to_reference(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(refs)
    }

    /// Helper to convert a row to a StoredReference
    fn row_to_reference(&self, row: &rusqlite::Row) -> rusqlite::Result<StoredReference> {
        let kind_str: String = row.get(4)?;
        let kind: ReferenceKind = kind_str.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let caller_id: Option<i64> = row.get(8)?;
        let caller = match caller_id {
            Some(id) => {
                let caller_kind: String = row.get(10)?;
                let caller_kind: SymbolKind = caller_kind.parse().map_err(|e: Error| {
                    rusqlite::Error::FromSqlConversionFailure(
                        10,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Some(CallerInfo {
                    id,
                    name: row.get(9)?,
                    kind: caller_kind,
                    line: row.get(11)?,
                })
            }
            None => None,
        };

        Ok(StoredReference {
            id: row.get(0)?,
            path: row.get(1)?,
            name: row.get(2)?,
            target: row.get(3)?,
            kind,
            line: row.get(5)?,
            column: row.get(6)?,
            context: row.get(7)?,
            caller,
        })
    }

    // ========== Import Queries ==========

    /// Imports whose module, name or alias contains `term`
    pub fn find_imports_matching(&self, term: &str) -> Result<Vec<StoredImport>> {
        let sql = format!(
            r#"{IMPORT_SELECT}
            WHERE i.module LIKE ?1 ESCAPE '\' OR i.name LIKE ?1 ESCAPE '\' OR i.alias LIKE ?1 ESCAPE '\'
            ORDER BY f.path, i.line, i.id"#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let imports = stmt
            .query_map([like_pattern(term)], row_to_import)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(imports)
    }

    /// Imports owned by every file whose path contains `fragment`
    pub fn find_imports_in_files(&self, fragment: &str) -> Result<Vec<StoredImport>> {
        let sql = format!(
            "{IMPORT_SELECT} WHERE f.path LIKE ?1 ESCAPE '\\' ORDER BY f.path, i.line, i.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let imports = stmt
            .query_map([like_pattern(fragment)], row_to_import)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(imports)
    }

    // ========== File Queries ==========

    /// Files whose path contains `fragment`, with their symbol counts
    pub fn find_files(&self, fragment: &str) -> Result<Vec<StoredFile>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT f.path, f.language, (SELECT COUNT(*) FROM symbols s WHERE s.file_id = f.id)
            FROM files f
            WHERE f.path LIKE ?1 ESCAPE '\'
            ORDER BY f.path
            "#,
        )?;
        let files = stmt
            .query_map([like_pattern(fragment)], |row| {
                Ok(StoredFile {
                    path: row.get(0)?,
                    language: row.get(1)?,
                    symbols: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(files)
    }

    // ========== Aggregates ==========

    /// Codebase summary: totals plus the top `top_n` entries of each breakdown
    pub fn overview(&self, top_n: usize) -> Result<Overview> {
        let stats = self.stats()?;

        let by_kind = self.grouped_counts(
            "SELECT kind, COUNT(*) AS cnt FROM symbols GROUP BY kind ORDER BY cnt DESC, kind",
        )?;
        let by_language = self.grouped_counts(
            "SELECT language, COUNT(*) AS cnt FROM files GROUP BY language ORDER BY cnt DESC, language",
        )?;

        let mut dir_counts: HashMap<String, usize> = HashMap::new();
        for path in self.file_paths()? {
            let top = match path.split_once('/') {
                Some((dir, _)) => dir.to_string(),
                None => ".".to_string(),
            };
            *dir_counts.entry(top).or_default() += 1;
        }
        let mut top_directories: Vec<(String, usize)> = dir_counts.into_iter().collect();
        top_directories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_directories.truncate(top_n);

        let mut top_imports = self.grouped_counts(
            "SELECT module, COUNT(*) AS cnt FROM imports GROUP BY module ORDER BY cnt DESC, module",
        )?;
        top_imports.truncate(top_n);

        let mut largest_files = self.grouped_counts(
            r#"
            SELECT f.path, COUNT(s.id) AS cnt
            FROM files f JOIN symbols s ON s.file_id = f.id
            GROUP BY f.id ORDER BY cnt DESC, f.path
            "#,
        )?;
        largest_files.truncate(top_n);

        Ok(Overview {
            files: stats.files,
            symbols: stats.symbols,
            imports: stats.imports,
            references: stats.references,
            by_kind,
            by_language,
            top_directories,
            top_imports,
            largest_files,
        })
    }

    fn grouped_counts(&self, sql: &str) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        Ok(DbStats {
            files: self.count("SELECT COUNT(*) FROM files")?,
            symbols: self.count_symbols()?,
            imports: self.count("SELECT COUNT(*) FROM imports")?,
            references: self.count("SELECT COUNT(*) FROM refs")?,
        })
    }

    /// Hash of every stored row, in id order.
    ///
    /// Two stores with the same digest hold identical contents.
    pub fn content_digest(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for table in ["files", "symbols", "imports", "refs"] {
            hasher.update(table.as_bytes());
            let mut stmt = self.conn.prepare(&format!("SELECT * FROM {table} ORDER BY id"))?;
            let columns = stmt.column_count();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                for i in 0..columns {
                    hasher.update(format!("{:?}|", row.get_ref(i)?).as_bytes());
                }
                hasher.update(b"\n");
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Upsert a file row on any connection or transaction
fn upsert_file_row(conn: &Connection, file: &FileRecord) -> Result<i64> {
    let id = conn.query_row(
        r#"
        INSERT INTO files (path, language, mtime, size, hash, indexed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(path) DO UPDATE SET
            language = excluded.language,
            mtime = excluded.mtime,
            size = excluded.size,
            hash = excluded.hash,
            indexed_at = excluded.indexed_at
        RETURNING id
        "#,
        params![file.path, file.language, file.mtime, file.size, file.hash, unix_now()],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn delete_facts(tx: &Transaction, file_id: i64) -> Result<()> {
    tx.execute("DELETE FROM refs WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM imports WHERE file_id = ?1", [file_id])?;
    tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
    Ok(())
}

fn row_to_import(row: &rusqlite::Row) -> rusqlite::Result<StoredImport> {
    Ok(StoredImport {
        path: row.get(0)?,
        module: row.get(1)?,
        name: row.get(2)?,
        alias: row.get(3)?,
        line: row.get(4)?,
    })
}

/// `%term%` with LIKE wildcards in `term` escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// File row as written by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the indexed root, `/`-separated
    pub path: String,
    pub language: String,
    /// Modification time in nanoseconds since the epoch
    pub mtime: i64,
    pub size: i64,
    /// blake3 hex digest of the content
    pub hash: Option<String>,
}

/// Stored staleness markers for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    pub mtime: i64,
    pub size: i64,
    pub hash: Option<String>,
}

/// Number of facts written by one `replace_facts` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactCounts {
    pub symbols: usize,
    pub imports: usize,
    pub references: usize,
}

/// Symbol row joined with its file and enclosing symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSymbol {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub span: Span,
    pub parent_id: Option<i64>,
    pub parent_name: Option<String>,
    pub params: Option<String>,
    pub doc: Option<String>,
    pub snippet: String,
}

/// The symbol a call site sits in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    pub id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub line: u32,
}

/// Reference row joined with its file and caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReference {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub target: String,
    pub kind: ReferenceKind,
    pub line: u32,
    pub column: u32,
    pub context: String,
    pub caller: Option<CallerInfo>,
}

/// Import row joined with its file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImport {
    pub path: String,
    pub module: String,
    pub name: Option<String>,
    pub alias: Option<String>,
    pub line: u32,
}

/// Indexed file with its symbol count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: String,
    pub language: String,
    pub symbols: usize,
}

/// Aggregate view of the whole index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub files: usize,
    pub symbols: usize,
    pub imports: usize,
    pub references: usize,
    pub by_kind: Vec<(String, usize)>,
    pub by_language: Vec<(String, usize)>,
    pub top_directories: Vec<(String, usize)>,
    pub top_imports: Vec<(String, usize)>,
    pub largest_files: Vec<(String, usize)>,
}

/// Database statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStats {
    pub files: usize,
    pub symbols: usize,
    pub imports: usize,
    pub references: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Files: {}", self.files)?;
        writeln!(f, "  Symbols: {}", self.symbols)?;
        writeln!(f, "  Imports: {}", self.imports)?;
        writeln!(f, "  References: {}", self.references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Import, Reference, Symbol};

    fn record(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: "python".to_string(),
            mtime: 1,
            size: 10,
            hash: Some("abc".to_string()),
        }
    }

    fn span(start_byte: u32, line: u32) -> Span {
        Span {
            start_byte,
            end_byte: start_byte + 20,
            start_line: line,
            end_line: line + 2,
            start_col: 0,
            end_col: 0,
        }
    }

    fn reference(name: &str, line: u32, caller: Option<usize>) -> Reference {
        Reference {
            name: name.to_string(),
            target: name.to_string(),
            kind: ReferenceKind::Call,
            line,
            column: 4,
            caller,
            context: format!("{name}()"),
        }
    }

    /// class Flow with method forward, and a module-level call to helper
    fn flow_facts() -> FileFacts {
        let mut method = Symbol::new("forward", SymbolKind::Method, span(20, 2)).with_params("(self, x)");
        method.parent = Some(0);
        FileFacts {
            symbols: vec![
                Symbol::new("Flow", SymbolKind::Class, span(0, 1)).with_doc("A flow."),
                method,
            ],
            imports: vec![Import::module("torch", 1)],
            references: vec![reference("helper", 5, Some(1))],
        }
    }

    #[test]
    fn test_replace_facts_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let counts = store.replace_facts(&record("model.py"), &flow_facts()).unwrap();
        assert_eq!(counts, FactCounts { symbols: 2, imports: 1, references: 1 });

        let symbols = store.find_symbols_in_file("model.py").unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[1].name, "forward");
        assert_eq!(symbols[1].parent_name.as_deref(), Some("Flow"));
        assert_eq!(symbols[1].params.as_deref(), Some("(self, x)"));

        let children = store.find_children(symbols[0].id).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "forward");

        let refs = store.find_references_to("HELPER").unwrap();
        assert_eq!(refs.len(), 1);
        let caller = refs[0].caller.as_ref().unwrap();
        assert_eq!(caller.name, "forward");
        assert_eq!(caller.kind, SymbolKind::Method);
    }

    #[test]
    fn test_replace_facts_is_wholesale() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_facts(&record("model.py"), &flow_facts()).unwrap();

        let replacement = FileFacts {
            symbols: vec![Symbol::new("Other", SymbolKind::Class, span(0, 1))],
            imports: vec![],
            references: vec![],
        };
        store.replace_facts(&record("model.py"), &replacement).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats, DbStats { files: 1, symbols: 1, imports: 0, references: 0 });
        assert!(store.find_symbols_named("forward").unwrap().is_empty());
    }

    #[test]
    fn test_failed_replace_keeps_previous_facts() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_facts(&record("model.py"), &flow_facts()).unwrap();
        let before = store.content_digest().unwrap();

        // Abort the write half way through: symbols are already replaced when
        // the reference insert fails.
        store
            .conn
            .execute_batch(
                r#"
                CREATE TEMP TRIGGER crash_on_ref BEFORE INSERT ON refs
                WHEN NEW.name = 'boom'
                BEGIN SELECT RAISE(ABORT, 'simulated crash'); END;
                "#,
            )
            .unwrap();

        let mut broken = FileFacts {
            symbols: vec![Symbol::new("Replacement", SymbolKind::Function, span(0, 1))],
            imports: vec![Import::module("numpy", 1)],
            references: vec![reference("boom", 3, Some(0))],
        };
        let err = store.replace_facts(&record("model.py"), &broken).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        assert_eq!(store.content_digest().unwrap(), before);
        assert_eq!(store.find_symbols_named("Flow").unwrap().len(), 1);
        assert!(store.find_symbols_named("Replacement").unwrap().is_empty());

        // The same write succeeds once the fault is gone.
        broken.references[0].name = "fine".to_string();
        store.replace_facts(&record("model.py"), &broken).unwrap();
        assert_eq!(store.find_symbols_named("Replacement").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_file_cascades() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_facts(&record("a.py"), &flow_facts()).unwrap();
        store.replace_facts(&record("b.py"), &flow_facts()).unwrap();

        assert!(store.remove_file("a.py").unwrap());
        assert!(!store.remove_file("a.py").unwrap());

        let stats = store.stats().unwrap();
        assert_eq!(stats, DbStats { files: 1, symbols: 2, imports: 1, references: 1 });
        assert_eq!(store.file_paths().unwrap(), vec!["b.py".to_string()]);
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let facts = FileFacts {
            symbols: vec![
                Symbol::new("load_data", SymbolKind::Function, span(0, 1)),
                Symbol::new("loadXdata", SymbolKind::Function, span(40, 4)),
            ],
            ..FileFacts::default()
        };
        store.replace_facts(&record("io.py"), &facts).unwrap();

        let hits = store.find_symbols_matching("d_d", None, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "load_data");
    }

    #[test]
    fn test_unreferenced_callables() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let facts = FileFacts {
            symbols: vec![
                Symbol::new("used", SymbolKind::Function, span(0, 1)),
                Symbol::new("unused", SymbolKind::Function, span(40, 4)),
                Symbol::new("CONFIG", SymbolKind::Variable, span(80, 8)),
            ],
            imports: vec![],
            references: vec![reference("Used", 9, None)],
        };
        store.replace_facts(&record("m.py"), &facts).unwrap();

        let unused: Vec<_> = store
            .unreferenced_callables()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(unused, vec!["unused".to_string()]);
    }

    #[test]
    fn test_overview_empty_and_populated() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let empty = store.overview(10).unwrap();
        assert_eq!(empty, Overview::default());

        store.replace_facts(&record("pkg/model.py"), &flow_facts()).unwrap();
        store.replace_facts(&record("pkg/train.py"), &flow_facts()).unwrap();
        store.replace_facts(&record("setup.py"), &FileFacts::default()).unwrap();

        let overview = store.overview(10).unwrap();
        assert_eq!(overview.files, 3);
        assert_eq!(overview.top_directories[0], ("pkg".to_string(), 2));
        assert_eq!(overview.top_directories[1], (".".to_string(), 1));
        assert_eq!(overview.top_imports, vec![("torch".to_string(), 2)]);
        assert_eq!(overview.largest_files.len(), 2);
    }

    #[test]
    fn test_touch_file_updates_staleness_only() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_facts(&record("a.py"), &flow_facts()).unwrap();
        store.touch_file("a.py", 99, 10).unwrap();

        let states = store.file_states().unwrap();
        assert_eq!(states["a.py"].mtime, 99);
        assert_eq!(store.count_symbols().unwrap(), 2);
    }
}
