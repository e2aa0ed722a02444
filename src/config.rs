//! `symdex.toml` project configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::guard::{AllowAll, AllowedRoots, PathGuard};
use crate::indexer::IndexOptions;
use crate::query::DEFAULT_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SymdexConfig {
    pub database: Option<String>,
    pub root: Option<String>,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IndexConfig {
    /// Worker threads; unset or 0 means one per core
    pub workers: Option<usize>,
    #[serde(default)]
    pub keep_partial: bool,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Roots indexing may read from; empty allows everything
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    pub limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { limit: DEFAULT_LIMIT }
    }
}

impl SymdexConfig {
    /// Indexer options from the `[index]` table
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            workers: self.index.workers.unwrap_or(0),
            keep_partial: self.index.keep_partial,
            force: false,
            excludes: self.index.exclude.clone(),
        }
    }

    /// Path guard from `allowed_paths`
    pub fn path_guard(&self) -> Arc<dyn PathGuard> {
        if self.index.allowed_paths.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(AllowedRoots::new(&self.index.allowed_paths))
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("symdex.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".symdex").join("symdex.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<SymdexConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SymdexConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &SymdexConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".symdex/";

    let mut content = if gitignore_path.exists() {
        std::fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };
    if content.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symdex.toml");
        std::fs::write(
            &path,
            r#"
database = ".symdex/symdex.db"
root = "src"

[index]
workers = 4
keep_partial = true
exclude = ["generated/"]
allowed_paths = ["/tmp"]

[query]
limit = 5
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.root.as_deref(), Some("src"));
        assert_eq!(config.query.limit, 5);

        let options = config.index_options();
        assert_eq!(options.workers, 4);
        assert!(options.keep_partial);
        assert_eq!(options.excludes, vec!["generated/".to_string()]);
    }

    #[test]
    fn test_missing_tables_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symdex.toml");
        std::fs::write(&path, "database = \"x.db\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.query.limit, DEFAULT_LIMIT);
        assert_eq!(config.index, IndexConfig::default());
        assert!(config.path_guard().is_path_allowed(Path::new("/anywhere")));
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).unwrap().is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[index]\nworkers = \"many\"\n").unwrap();
        assert!(load_config(Some(&bad)).is_err());
    }

    #[test]
    fn test_write_config_respects_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symdex.toml");
        let config = SymdexConfig {
            database: Some(".symdex/symdex.db".to_string()),
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().unwrap(), config);
    }

    #[test]
    fn test_ensure_gitignore_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target\n.symdex/\n");
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = TempDir::new().unwrap();
        let db = default_database_path_in(dir.path());
        ensure_db_dir(&db).unwrap();
        assert!(dir.path().join(".symdex").is_dir());
    }
}
