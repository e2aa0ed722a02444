//! Discovery filter: `.gitignore`/`.ignore` rules, built-in noise excludes
//! and the `exclude` patterns from `symdex.toml`.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Directories and files never worth indexing
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // Noise directories
    ".git/", "node_modules/", "venv/", ".venv/", "__pycache__/", "site-packages/",
    "dist/", "build/", ".eggs/", "*.egg-info/", ".tox/", ".mypy_cache/", ".pytest_cache/",
    "target/", "vendor/", "coverage/", ".symdex/", ".vscode/", ".idea/",

    // Database files
    "*.db", "*.sqlite", "*.sqlite3", "*.db-wal", "*.db-shm",

    // Generated and minified sources
    "*.min.js", "*.pyc", "*.pyo",
];

pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        // 1. Load from .gitignore and .ignore
        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        // 2. Add defaults
        for pattern in DEFAULT_EXCLUDES {
            builder.add_line(None, pattern).ok();
        }

        // 3. Add user config excludes
        for pattern in extra_excludes {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid exclude pattern {:?}: {}", pattern, e);
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_and_extra_excludes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let filter = IgnoreFilter::new(root, &["generated/".to_string()]);

        assert!(filter.is_ignored(&root.join("node_modules"), true));
        assert!(filter.is_ignored(&root.join(".symdex"), true));
        assert!(filter.is_ignored(&root.join("generated"), true));
        assert!(filter.is_ignored(&root.join("index.db"), false));
        assert!(!filter.is_ignored(&root.join("src"), true));
        assert!(!filter.is_ignored(&root.join("model.py"), false));
    }

    #[test]
    fn test_gitignore_is_honored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "scratch/\n*.tmp.py\n").unwrap();
        let filter = IgnoreFilter::new(dir.path(), &[]);

        assert!(filter.is_ignored(&dir.path().join("scratch"), true));
        assert!(filter.is_ignored(&dir.path().join("a.tmp.py"), false));
        assert!(!filter.is_ignored(&dir.path().join("a.py"), false));
    }
}
