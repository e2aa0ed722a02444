//! Path safety guard
//!
//! The indexer asks a `PathGuard` before descending into a directory or
//! reading a file. Rejected paths are skipped, never an error.

use std::path::{Component, Path, PathBuf};

/// Decides whether a path may be indexed
pub trait PathGuard: Send + Sync {
    fn is_path_allowed(&self, path: &Path) -> bool;
}

/// Guard that allows every path
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PathGuard for AllowAll {
    fn is_path_allowed(&self, _path: &Path) -> bool {
        true
    }
}

impl<F> PathGuard for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_path_allowed(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Allows paths that resolve under one of a set of root directories
#[derive(Debug, Clone)]
pub struct AllowedRoots {
    roots: Vec<PathBuf>,
}

impl AllowedRoots {
    /// Build from configured paths; `~` expands to the home directory
    pub fn new<S: AsRef<str>>(paths: &[S]) -> Self {
        let roots = paths.iter().map(|p| resolve(&expand_home(p.as_ref()))).collect();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl PathGuard for AllowedRoots {
    fn is_path_allowed(&self, path: &Path) -> bool {
        let target = resolve(path);
        let allowed = self.roots.iter().any(|root| target.starts_with(root));
        if !allowed {
            tracing::debug!("Path {} is not under any allowed directory", target.display());
        }
        allowed
    }
}

fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

/// Canonical form of a path. For paths that do not exist yet the deepest
/// existing ancestor is canonicalized and the rest appended.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = normalized.as_path();
    loop {
        if let Ok(mut canonical) = existing.canonicalize() {
            canonical.extend(missing.iter().rev());
            return canonical;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return normalized.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_allowed_roots() {
        let dir = TempDir::new().unwrap();
        let allowed = dir.path().join("work");
        let other = dir.path().join("private");
        std::fs::create_dir_all(allowed.join("pkg")).unwrap();
        std::fs::create_dir_all(&other).unwrap();

        let guard = AllowedRoots::new(&[allowed.to_string_lossy()]);
        assert!(guard.is_path_allowed(&allowed));
        assert!(guard.is_path_allowed(&allowed.join("pkg")));
        assert!(guard.is_path_allowed(&allowed.join("pkg/new_file.py")));
        assert!(!guard.is_path_allowed(&other));
        // `..` cannot climb out of the root
        assert!(!guard.is_path_allowed(&allowed.join("../private")));
    }

    #[test]
    fn test_sibling_prefix_is_not_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::create_dir_all(dir.path().join("app-secrets")).unwrap();

        let guard = AllowedRoots::new(&[dir.path().join("app").to_string_lossy()]);
        assert!(!guard.is_path_allowed(&dir.path().join("app-secrets")));
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_home("~/Dev"), PathBuf::from(home).join("Dev"));
        }
        assert_eq!(expand_home("/opt/src"), PathBuf::from("/opt/src"));
    }

    #[test]
    fn test_closure_guard() {
        let guard = |p: &Path| !p.ends_with("secret.py");
        assert!(guard.is_path_allowed(Path::new("a.py")));
        assert!(!PathGuard::is_path_allowed(&guard, Path::new("x/secret.py")));
    }
}
