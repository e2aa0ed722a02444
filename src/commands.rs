use crate::{OutputMode, emit_success};
use anyhow::Context;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use symdex::config::{
    self, IndexConfig, QueryConfig, SymdexConfig, default_config_path, default_database_path_in,
};
use symdex::output::is_quiet;
use symdex::query::{QueryResponse, ResultRecord};
use symdex::storage::{Overview, StoredImport};
use symdex::ui::{
    Icons, ProgressManager, counts_table, dim, emphasis, header, location, muted, section,
    stats_table, status, success, summary_row, theme, warn,
};
use symdex::{Indexer, RunSummary, SqliteStore};

/// Flags of `symdex index`
pub struct IndexArgs {
    pub path: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub workers: Option<usize>,
    pub keep_partial: bool,
    pub force: bool,
}

fn load(config_path: Option<&Path>) -> anyhow::Result<SymdexConfig> {
    Ok(config::load_config(config_path)?.unwrap_or_default())
}

/// `--database`, then the config, then `./.symdex/symdex.db`
fn database_path(flag: Option<PathBuf>, config: &SymdexConfig) -> PathBuf {
    flag.or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| default_database_path_in(Path::new(".")))
}

fn open_existing(path: &Path) -> anyhow::Result<SqliteStore> {
    if !path.exists() {
        anyhow::bail!("no index at {} (run `symdex index` first)", path.display());
    }
    SqliteStore::open_read_only(path)
        .with_context(|| format!("failed to open index {}", path.display()))
}

pub fn run_init(
    output_mode: OutputMode,
    config_path: Option<&Path>,
    root: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    let config_path = config_path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let database = default_database_path_in(Path::new("."));

    let config = SymdexConfig {
        database: Some(database.to_string_lossy().into_owned()),
        root: Some(root.unwrap_or_else(|| PathBuf::from(".")).to_string_lossy().into_owned()),
        index: IndexConfig::default(),
        query: QueryConfig::default(),
    };
    config::write_config(&config_path, &config, force)?;
    config::ensure_db_dir(&database)?;
    config::ensure_gitignore(&base)?;
    SqliteStore::open(&database)?;

    if output_mode.is_human() {
        success(&format!("Wrote {}", config_path.display()));
        status(Icons::DATABASE, "Database", &database.display().to_string());
    } else {
        emit_success(
            output_mode,
            "init",
            serde_json::json!({
                "config": config_path,
                "database": database,
            }),
        )?;
    }
    Ok(())
}

pub fn run_index(
    output_mode: OutputMode,
    verbose: bool,
    config_path: Option<&Path>,
    args: IndexArgs,
) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let root = args
        .path
        .or_else(|| config.root.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut options = config.index_options();
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    options.keep_partial |= args.keep_partial;
    options.force = args.force;

    let database = database_path(args.database, &config);
    config::ensure_db_dir(&database)?;
    let mut store = SqliteStore::open(&database)
        .with_context(|| format!("failed to open index {}", database.display()))?;

    let show_progress = output_mode.is_human() && !is_quiet();
    if show_progress {
        header(&format!("Indexing {}", root.display()));
        status(Icons::DATABASE, "Database", &database.display().to_string());
    }

    let (progress, summary) = {
        let mut indexer = Indexer::new(&mut store)
            .with_options(options)
            .with_shared_guard(config.path_guard());
        let progress = if show_progress {
            let (manager, tx) = ProgressManager::new(verbose);
            indexer = indexer.with_progress(tx);
            Some(manager)
        } else {
            None
        };
        let summary = indexer
            .run(&root)
            .with_context(|| format!("failed to index {}", root.display()))?;
        (progress, summary)
    };

    match output_mode {
        OutputMode::Json => emit_success(output_mode, "index", serde_json::to_value(&summary)?)?,
        OutputMode::Human => {
            match progress {
                Some(progress) => progress.finish_with_summary(&summary),
                None => println!("{}", summary),
            }
            print_run_details(&summary);
        }
    }
    Ok(())
}

fn print_run_details(summary: &RunSummary) {
    summary_row("scanned", &summary.files_scanned.to_string());
    summary_row("unchanged", &summary.files_unchanged.to_string());
    if summary.files_removed > 0 {
        summary_row("removed", &summary.files_removed.to_string());
    }
    if summary.files_rejected > 0 {
        summary_row("rejected by path guard", &summary.files_rejected.to_string());
    }
    if summary.has_errors() {
        warn(&format!("{} file(s) could not be indexed:", summary.errors.len()));
        for error in &summary.errors {
            eprintln!("  {} [{}] {}", error.path, error.kind, dim(&error.message));
        }
    }
}

pub fn run_query(
    output_mode: OutputMode,
    config_path: Option<&Path>,
    text: &str,
    database: Option<PathBuf>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let store = open_existing(&database_path(database, &config))?;
    let engine =
        symdex::QueryEngine::new(&store).with_limit(limit.unwrap_or(config.query.limit));
    let response = engine.run(text)?;

    match output_mode {
        OutputMode::Json => emit_success(output_mode, "query", serde_json::to_value(&response)?),
        OutputMode::Human => {
            print_response(&response);
            Ok(())
        }
    }
}

pub fn run_stats(
    output_mode: OutputMode,
    config_path: Option<&Path>,
    database: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let path = database_path(database, &config);
    let store = open_existing(&path)?;
    let stats = store.stats()?;

    if output_mode.is_human() {
        println!("{} symdex statistics ({})", Icons::STATS, path.display());
        println!(
            "{}",
            stats_table(&[
                ("Files", stats.files.to_string()),
                ("Symbols", stats.symbols.to_string()),
                ("Imports", stats.imports.to_string()),
                ("References", stats.references.to_string()),
            ])
        );
    } else {
        emit_success(output_mode, "stats", serde_json::to_value(stats)?)?;
    }
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!(
        "{} {} {}",
        Icons::SEARCH,
        response.intent.to_string().style(theme().header.clone()),
        muted(&format!("({} results)", response.len()))
    );
    if response.is_empty() {
        println!("  {}", muted("no matches"));
        return;
    }

    for record in &response.records {
        let at = location(record.path().unwrap_or_default(), record.line());
        match record {
            ResultRecord::Symbol(m) => {
                let symbol = &m.symbol;
                let owner = match &symbol.parent_name {
                    Some(parent) => format!("{}.", parent),
                    None => String::new(),
                };
                println!(
                    "  {:<8} {}{}{}  {}  {}",
                    symbol.kind.as_str(),
                    muted(&owner),
                    emphasis(&symbol.name),
                    symbol.params.as_deref().unwrap_or_default(),
                    at,
                    muted(m.tier.as_str())
                );
            }
            ResultRecord::Description(d) => {
                let symbol = &d.symbol;
                section(&format!(" {} {} ", symbol.kind, symbol.name));
                summary_row("at", &at);
                if let Some(params) = &symbol.params {
                    summary_row("signature", params);
                }
                if let Some(parent) = &symbol.parent_name {
                    summary_row("inside", parent);
                }
                if let Some(doc) = &symbol.doc {
                    summary_row("doc", doc.lines().next().unwrap_or_default());
                }
                if !d.children.is_empty() {
                    let names: Vec<&str> = d.children.iter().map(|c| c.name.as_str()).collect();
                    summary_row("members", &names.join(", "));
                }
                if !d.calls.is_empty() {
                    summary_row("calls", &d.calls.join(", "));
                }
                for line in symbol.snippet.lines() {
                    println!("    {}", dim(line));
                }
            }
            ResultRecord::Caller(r) => {
                let caller = match &r.caller {
                    Some(c) => format!("{} {}", c.kind, c.name),
                    None => "<module>".to_string(),
                };
                println!("  {}  {}  {}", at, emphasis(&caller), muted(&r.context));
            }
            ResultRecord::Import(i) => println!("  {}  {}", at, import_text(i)),
            ResultRecord::Unused(s) => {
                println!("  {:<8} {}  {}", s.kind.as_str(), emphasis(&s.name), at)
            }
            ResultRecord::File(f) => {
                println!("  {}  {}  {}", f.path, muted(&f.language), dim(&format!("{} symbols", f.symbols)))
            }
            ResultRecord::Overview(o) => print_overview(o),
        }
    }
}

fn import_text(import: &StoredImport) -> String {
    let mut text = match &import.name {
        Some(name) => format!("{} {} {}", import.module, Icons::RIGHT, name),
        None => import.module.clone(),
    };
    if let Some(alias) = &import.alias {
        text.push_str(&format!(" as {}", alias));
    }
    text
}

fn print_overview(overview: &Overview) {
    println!(
        "{}",
        stats_table(&[
            ("Files", overview.files.to_string()),
            ("Symbols", overview.symbols.to_string()),
            ("Imports", overview.imports.to_string()),
            ("References", overview.references.to_string()),
        ])
    );
    let breakdowns = [
        ("Symbols by kind", &overview.by_kind),
        ("Files by language", &overview.by_language),
        ("Top directories", &overview.top_directories),
        ("Most imported", &overview.top_imports),
        ("Largest files", &overview.largest_files),
    ];
    for (title, rows) in breakdowns {
        if !rows.is_empty() {
            section(title);
            println!("{}", counts_table(rows));
        }
    }
}
