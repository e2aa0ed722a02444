//! Incremental indexing pipeline
//!
//! 1. Discover files (ignore rules, config excludes, path guard)
//! 2. Skip files whose mtime and size match the stored values
//! 3. Parse and extract the rest on a pool of worker threads
//! 4. Write each file's facts in its own transaction on the calling thread
//! 5. Remove files that disappeared from disk

pub mod pipeline;
pub mod walker;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapter::{AdapterRegistry, default_registry};
use crate::guard::{AllowAll, PathGuard};
use crate::storage::SqliteStore;
use crate::ui::{ProgressMessage, ProgressPhase};
use crate::{Error, FileStatus, IndexMessage, Result};
use pipeline::{Job, WorkerSettings};

/// Knobs for one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Worker threads; 0 uses the available parallelism
    pub workers: usize,
    /// Store best-effort facts of files with syntax errors
    pub keep_partial: bool,
    /// Re-extract every file regardless of staleness markers
    pub force: bool,
    /// Extra gitignore-style exclude patterns
    pub excludes: Vec<String>,
}

impl IndexOptions {
    fn worker_count(&self, jobs: usize) -> usize {
        let wanted = if self.workers == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.workers
        };
        wanted.min(jobs).max(1)
    }
}

/// Stage a per-file failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileErrorKind {
    Parse,
    Extraction,
    Store,
    Io,
}

impl FileErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileErrorKind::Parse => "parse",
            FileErrorKind::Extraction => "extraction",
            FileErrorKind::Store => "store",
            FileErrorKind::Io => "io",
        }
    }

    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Parse(_) | Error::UnsupportedLanguage(_) => FileErrorKind::Parse,
            Error::Extraction(_) | Error::InvalidKind(_) => FileErrorKind::Extraction,
            Error::Storage(_) => FileErrorKind::Store,
            Error::Io(_) | Error::Config(_) => FileErrorKind::Io,
        }
    }
}

impl std::fmt::Display for FileErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file that could not be (fully) indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: String,
    pub kind: FileErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: impl Into<String>, kind: FileErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.kind, self.message)
    }
}

/// Statistics from an indexing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Supported files found under the root
    pub files_scanned: usize,
    /// Files whose facts were (re)written
    pub files_indexed: usize,
    /// Files skipped by mtime/size or content hash
    pub files_unchanged: usize,
    /// Files dropped from the index because they are gone from disk
    pub files_removed: usize,
    /// Paths refused by the path guard
    pub files_rejected: usize,
    pub symbols: usize,
    pub imports: usize,
    pub references: usize,
    pub elapsed: Duration,
    pub errors: Vec<FileError>,
}

impl RunSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} scanned, {} indexed, {} unchanged, {} removed, {} rejected, {} errors \
             ({} symbols, {} imports, {} references) in {:.2?}",
            self.files_scanned,
            self.files_indexed,
            self.files_unchanged,
            self.files_removed,
            self.files_rejected,
            self.errors.len(),
            self.symbols,
            self.imports,
            self.references,
            self.elapsed
        )
    }
}

/// Indexes a source tree into a store
pub struct Indexer<'s> {
    store: &'s mut SqliteStore,
    registry: AdapterRegistry,
    options: IndexOptions,
    guard: Arc<dyn PathGuard>,
    progress: Option<Sender<ProgressMessage>>,
}

impl<'s> Indexer<'s> {
    pub fn new(store: &'s mut SqliteStore) -> Self {
        Self {
            store,
            registry: default_registry(),
            options: IndexOptions::default(),
            guard: Arc::new(AllowAll),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_guard(mut self, guard: impl PathGuard + 'static) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    /// Share a guard that is already boxed, as built from config
    pub fn with_shared_guard(mut self, guard: Arc<dyn PathGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Report per-file progress over a channel (see `ui::ProgressManager`)
    pub fn with_progress(mut self, progress: Sender<ProgressMessage>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, message: ProgressMessage) {
        report(self.progress.as_ref(), message);
    }

    /// Bring the store in line with the tree under `root`.
    ///
    /// Only a missing root or an unreadable store fails the run; per-file
    /// problems are collected in `RunSummary::errors`.
    pub fn run(&mut self, root: &Path) -> Result<RunSummary> {
        let start = Instant::now();
        let root = root.canonicalize()?;
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("{} is not a directory", root.display()),
            )));
        }

        let mut summary = RunSummary::default();
        info!("Indexing {}", root.display());

        if !self.guard.is_path_allowed(&root) {
            warn!("Guard rejected index root {}", root.display());
            summary.files_rejected = 1;
            summary.elapsed = start.elapsed();
            return Ok(summary);
        }

        let discovery =
            walker::discover(&root, &self.registry, &self.options.excludes, Arc::clone(&self.guard));
        summary.files_scanned = discovery.files.len();
        summary.files_rejected = discovery.rejected;
        summary.errors.extend(discovery.errors.iter().cloned());

        // Staleness: identical mtime and size means untouched
        let states = self.store.file_states()?;
        let mut jobs = Vec::new();
        for file in &discovery.files {
            match states.get(&file.relative) {
                Some(state)
                    if !self.options.force && state.mtime == file.mtime && state.size == file.size =>
                {
                    debug!("{} unchanged", file.relative);
                    summary.files_unchanged += 1;
                }
                Some(state) => jobs.push(Job {
                    file: file.clone(),
                    status: FileStatus::Modified,
                    previous_hash: state.hash.clone(),
                }),
                None => jobs.push(Job {
                    file: file.clone(),
                    status: FileStatus::New,
                    previous_hash: None,
                }),
            }
        }

        self.process_jobs(jobs, &mut summary);

        // Files that vanished from disk
        let on_disk: HashSet<&str> = discovery.files.iter().map(|f| f.relative.as_str()).collect();
        let mut vanished: Vec<&String> = states
            .keys()
            .filter(|path| !on_disk.contains(path.as_str()) && !discovery.is_unseen(path))
            .collect();
        vanished.sort();
        if !vanished.is_empty() {
            self.report(ProgressMessage::Started { phase: ProgressPhase::Cleanup, total: vanished.len() });
        }
        for &path in &vanished {
            match self.store.remove_file(path) {
                Ok(_) => {
                    debug!("{} removed", path);
                    self.report(ProgressMessage::FileDeleted(path.clone()));
                    summary.files_removed += 1;
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", path, e);
                    summary.errors.push(FileError::new(path.as_str(), FileErrorKind::Store, e.to_string()));
                }
            }
        }
        if !vanished.is_empty() {
            self.report(ProgressMessage::Finished { phase: ProgressPhase::Cleanup });
        }

        summary.elapsed = start.elapsed();
        info!("Indexing finished: {}", summary);
        Ok(summary)
    }

    /// Fan jobs out to workers and apply their results in arrival order
    fn process_jobs(&mut self, jobs: Vec<Job>, summary: &mut RunSummary) {
        if jobs.is_empty() {
            return;
        }

        let total = jobs.len();
        let workers = self.options.worker_count(total);
        let settings = WorkerSettings {
            keep_partial: self.options.keep_partial,
            force: self.options.force,
        };
        debug!("Processing {} files on {} workers", total, workers);
        self.report(ProgressMessage::Started { phase: ProgressPhase::Parsing, total });

        let (job_tx, job_rx) = channel::bounded::<Job>(workers * 4);
        let (result_tx, result_rx) = channel::unbounded::<IndexMessage>();
        let registry = &self.registry;
        let store = &mut *self.store;
        let progress = self.progress.as_ref();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                scope.spawn(move || pipeline::worker(registry, settings, jobs, results));
            }
            drop(job_rx);
            drop(result_tx);

            scope.spawn(move || {
                for job in jobs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            for (current, message) in result_rx.iter().enumerate() {
                let file = apply(store, progress, message, summary);
                report(
                    progress,
                    ProgressMessage::Progress {
                        phase: ProgressPhase::Parsing,
                        current: current + 1,
                        file,
                    },
                );
            }
        });

        self.report(ProgressMessage::Finished { phase: ProgressPhase::Parsing });
    }
}

fn report(progress: Option<&Sender<ProgressMessage>>, message: ProgressMessage) {
    if let Some(progress) = progress {
        progress.send(message).ok();
    }
}

/// Write one worker result; returns the path it concerned
fn apply(
    store: &mut SqliteStore,
    progress: Option<&Sender<ProgressMessage>>,
    message: IndexMessage,
    summary: &mut RunSummary,
) -> Option<String> {
    match message {
        IndexMessage::Processed { record, facts, status, partial } => {
            let path = record.path.clone();
            match store.replace_facts(&record, &facts) {
                Ok(counts) => {
                    summary.files_indexed += 1;
                    summary.symbols += counts.symbols;
                    summary.imports += counts.imports;
                    summary.references += counts.references;
                    let event = match status {
                        FileStatus::New => ProgressMessage::FileNew(path.clone()),
                        _ => ProgressMessage::FileModified(path.clone()),
                    };
                    report(progress, event);
                    if let Some(error) = partial {
                        warn!("{} stored with syntax errors: {}", path, error);
                        summary.errors.push(FileError::new(
                            path.as_str(),
                            FileErrorKind::Parse,
                            format!("{} (partial facts kept)", error),
                        ));
                    }
                }
                Err(e) => {
                    warn!("Failed to store {}: {}", path, e);
                    summary.errors.push(FileError::new(path.as_str(), FileErrorKind::Store, e.to_string()));
                }
            }
            Some(path)
        }
        IndexMessage::Touched { relative_path, mtime, size } => {
            match store.touch_file(&relative_path, mtime, size) {
                Ok(()) => summary.files_unchanged += 1,
                Err(e) => summary.errors.push(FileError::new(
                    relative_path.as_str(),
                    FileErrorKind::Store,
                    e.to_string(),
                )),
            }
            Some(relative_path)
        }
        IndexMessage::Failed(error) => {
            warn!("Skipping {}", error);
            let path = error.path.clone();
            summary.errors.push(error);
            Some(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_incremental_runs() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "a.py", "def a():\n    b()\n");
        create_file(dir.path(), "b.py", "def b():\n    pass\n");
        let mut store = SqliteStore::open_in_memory().unwrap();

        let first = Indexer::new(&mut store).run(dir.path()).unwrap();
        assert_eq!(first.files_scanned, 2);
        assert_eq!(first.files_indexed, 2);
        assert_eq!(first.symbols, 2);
        assert_eq!(first.references, 1);

        let second = Indexer::new(&mut store).run(dir.path()).unwrap();
        assert_eq!(second.files_indexed, 0);
        assert_eq!(second.files_unchanged, 2);

        // new content with a different size
        create_file(dir.path(), "b.py", "def b():\n    return 1\n\ndef c():\n    pass\n");
        let third = Indexer::new(&mut store).run(dir.path()).unwrap();
        assert_eq!(third.files_indexed, 1);
        assert_eq!(third.symbols, 2);
        assert_eq!(store.stats().unwrap().symbols, 3);
    }

    #[test]
    fn test_vanished_files_are_removed() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "a.py", "def a():\n    pass\n");
        create_file(dir.path(), "b.py", "def b():\n    pass\n");
        let mut store = SqliteStore::open_in_memory().unwrap();
        Indexer::new(&mut store).run(dir.path()).unwrap();

        fs::remove_file(dir.path().join("b.py")).unwrap();
        let summary = Indexer::new(&mut store).run(dir.path()).unwrap();
        assert_eq!(summary.files_removed, 1);
        assert_eq!(store.file_paths().unwrap(), vec!["a.py".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_keeps_its_facts() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "pkg/a.py", "def keep_me():\n    pass\n");
        create_file(dir.path(), "top.py", "def top():\n    pass\n");
        let mut store = SqliteStore::open_in_memory().unwrap();
        Indexer::new(&mut store).run(dir.path()).unwrap();

        let pkg = dir.path().join("pkg");
        fs::set_permissions(&pkg, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&pkg).is_ok() {
            // running as root: permissions are not enforced
            fs::set_permissions(&pkg, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let summary = Indexer::new(&mut store).run(dir.path());
        fs::set_permissions(&pkg, fs::Permissions::from_mode(0o755)).unwrap();
        let summary = summary.unwrap();

        assert_eq!(summary.files_removed, 0);
        assert!(summary.errors.iter().any(|e| e.path == "pkg"));
        assert!(summary.errors.iter().all(|e| e.kind == FileErrorKind::Io));
        assert_eq!(store.find_symbols_named("keep_me").unwrap().len(), 1);
        assert_eq!(store.file_paths().unwrap(), vec!["pkg/a.py".to_string(), "top.py".to_string()]);
    }

    #[test]
    fn test_broken_file_keeps_previous_facts() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "m.py", "def good():\n    pass\n");
        let mut store = SqliteStore::open_in_memory().unwrap();
        Indexer::new(&mut store).run(dir.path()).unwrap();

        create_file(dir.path(), "m.py", "def good(:\n    pass\n\ndef other():\n    pass\n");
        let summary = Indexer::new(&mut store).run(dir.path()).unwrap();
        assert_eq!(summary.files_indexed, 0);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].kind, FileErrorKind::Parse);
        assert_eq!(summary.errors[0].path, "m.py");
        assert_eq!(store.find_symbols_named("good").unwrap().len(), 1);
        assert!(store.find_symbols_named("other").unwrap().is_empty());

        let options = IndexOptions { keep_partial: true, ..IndexOptions::default() };
        let summary = Indexer::new(&mut store).with_options(options).run(dir.path()).unwrap();
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(store.find_symbols_named("other").unwrap().len(), 1);
    }

    #[test]
    fn test_guard_rejects_root_without_touching_store() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "a.py", "x = 1\n");
        let mut store = SqliteStore::open_in_memory().unwrap();
        Indexer::new(&mut store).run(dir.path()).unwrap();

        let summary = Indexer::new(&mut store)
            .with_guard(|_: &Path| false)
            .run(dir.path())
            .unwrap();
        assert_eq!(summary.files_rejected, 1);
        assert_eq!(summary.files_removed, 0);
        assert_eq!(store.stats().unwrap().files, 1);
    }

    #[test]
    fn test_progress_messages() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "a.py", "x = 1\n");
        let mut store = SqliteStore::open_in_memory().unwrap();
        let (tx, rx) = channel::unbounded();

        Indexer::new(&mut store).with_progress(tx).run(dir.path()).unwrap();
        let messages: Vec<_> = rx.try_iter().collect();

        assert!(matches!(messages[0], ProgressMessage::Started { total: 1, .. }));
        assert!(messages.iter().any(|m| matches!(m, ProgressMessage::FileNew(p) if p == "a.py")));
        assert!(matches!(messages.last(), Some(ProgressMessage::Finished { .. })));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        let result = Indexer::new(&mut store).run(&dir.path().join("nope"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
