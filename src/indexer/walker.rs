//! File discovery
//!
//! Walks the root with `ignore::WalkBuilder`, pruning ignored paths and
//! asking the path guard about every directory and file before it is
//! visited.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use ignore::WalkBuilder;
use tracing::{debug, warn};

use super::{FileError, FileErrorKind};
use crate::adapter::AdapterRegistry;
use crate::guard::PathGuard;
use crate::ignore::IgnoreFilter;

/// A source file found under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub absolute: PathBuf,
    /// Root-relative, `/`-separated
    pub relative: String,
    pub language: String,
    /// Nanoseconds since the epoch
    pub mtime: i64,
    pub size: i64,
}

/// Outcome of a discovery walk
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<DiscoveredFile>,
    /// Paths the guard refused
    pub rejected: usize,
    pub errors: Vec<FileError>,
    /// Root-relative paths that could not be read; `""` is the root itself
    pub unreadable: Vec<String>,
}

impl Discovery {
    /// Whether `relative` lies in a part of the tree the walk could not see.
    /// Such files are neither found nor gone.
    pub fn is_unseen(&self, relative: &str) -> bool {
        self.unreadable.iter().any(|failed| {
            failed.is_empty()
                || relative == failed
                || relative.strip_prefix(failed.as_str()).is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Collect indexable files under `root`, sorted by relative path
pub fn discover(
    root: &Path,
    registry: &AdapterRegistry,
    excludes: &[String],
    guard: Arc<dyn PathGuard>,
) -> Discovery {
    let filter = Arc::new(IgnoreFilter::new(root, excludes));
    let rejected = Arc::new(AtomicUsize::new(0));

    let walker = {
        let rejected = Arc::clone(&rejected);
        WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if filter.is_ignored(entry.path(), is_dir) {
                    return false;
                }
                if !guard.is_path_allowed(entry.path()) {
                    debug!("Guard rejected {}", entry.path().display());
                    rejected.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                true
            })
            .build()
    };

    let mut discovery = Discovery::default();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // An error without a path leaves the whole walk in doubt
                let relative = match error_path(&e) {
                    Some(path) if path != root => relative_path(root, path),
                    _ => None,
                };
                let reported = relative.clone().unwrap_or_else(|| root.display().to_string());
                warn!("Walk error at {}: {}", reported, e);
                discovery.errors.push(FileError::new(reported, FileErrorKind::Io, e.to_string()));
                discovery.unreadable.push(relative.unwrap_or_default());
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let Some(adapter) = registry.find_adapter(path) else {
            continue;
        };
        let Some(relative) = relative_path(root, path) else {
            continue;
        };

        match entry.metadata() {
            Ok(metadata) => {
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos() as i64)
                    .unwrap_or(0);
                discovery.files.push(DiscoveredFile {
                    absolute: path.to_path_buf(),
                    relative,
                    language: adapter.language_name().to_string(),
                    mtime,
                    size: metadata.len() as i64,
                });
            }
            Err(e) => {
                warn!("Cannot stat {}: {}", relative, e);
                discovery.errors.push(FileError::new(relative.as_str(), FileErrorKind::Io, e.to_string()));
                discovery.unreadable.push(relative);
            }
        }
    }

    discovery.rejected = rejected.load(Ordering::Relaxed);
    discovery.files.sort_by(|a, b| a.relative.cmp(&b.relative));
    discovery
}

/// The path an `ignore` walk error is about, if it names one
fn error_path(error: &ignore::Error) -> Option<&Path> {
    match error {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        _ => None,
    }
}

/// `root`-relative path with `/` separators
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("/")) }
}
