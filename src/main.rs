//! symdex CLI - index a source tree and ask it questions in plain words

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "symdex")]
#[command(version)]
#[command(about = "Source tree symbol index with plain-language queries")]
#[command(long_about = r#"
symdex parses a source tree with tree-sitter, stores its symbols, imports and
call sites in SQLite, and answers queries such as:
  • describe Flow
  • who calls forward
  • deps models/flow.py
  • unused

Example usage:
  symdex init
  symdex index ./src
  symdex query who calls forward
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./symdex.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a symdex.toml and create the database
    Init {
        /// Root to index (defaults to the current directory)
        path: Option<PathBuf>,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Index (or re-index) a directory
    Index {
        /// Directory to index (defaults to `root` from the config, then `.`)
        path: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Worker threads (0 = one per core)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Keep best-effort facts from files with syntax errors
        #[arg(long)]
        keep_partial: bool,

        /// Re-extract every file, ignoring staleness markers
        #[arg(short, long)]
        force: bool,
    },

    /// Ask the index a question
    Query {
        /// Free-text query, e.g. `who calls forward`
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Maximum number of results (0 = no limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show statistics about the index
    Stats {
        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print a `{"ok": true, ...}` envelope in JSON mode
pub fn emit_success(
    output_mode: OutputMode,
    command: &str,
    data: serde_json::Value,
) -> anyhow::Result<()> {
    if output_mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn emit_error(output_mode: OutputMode, command: &str, error: &anyhow::Error) {
    match output_mode {
        OutputMode::Human => symdex::ui::error(&format!("{:#}", error)),
        OutputMode::Json => {
            let envelope = serde_json::json!({
                "ok": false,
                "command": command,
                "error": format!("{:#}", error),
            });
            println!("{}", envelope);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the defaults
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let config_path = cli.config.clone();

    let (name, result) = match cli.command {
        Commands::Init { path, force } => {
            ("init", commands::run_init(output_mode, config_path.as_deref(), path, force))
        }
        Commands::Index { path, database, workers, keep_partial, force } => (
            "index",
            commands::run_index(
                output_mode,
                cli.verbose,
                config_path.as_deref(),
                commands::IndexArgs { path, database, workers, keep_partial, force },
            ),
        ),
        Commands::Query { text, database, limit } => (
            "query",
            commands::run_query(output_mode, config_path.as_deref(), &text.join(" "), database, limit),
        ),
        Commands::Stats { database } => {
            ("stats", commands::run_stats(output_mode, config_path.as_deref(), database))
        }
    };

    if let Err(error) = result {
        emit_error(output_mode, name, &error);
        std::process::exit(1);
    }
}
