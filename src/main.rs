//! # Story Book CLI (`sbook`)
//!
//! Loads the site's collections from JSON exports and inspects the result.
//!
//! ## Usage
//!
//! ```bash
//! sbook --config ./config/sbook.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sbook init` | Create the SQLite database and schema |
//! | `sbook sources` | Show each import kind and the files it would load |
//! | `sbook import <kind>` | Import `articles`, `categories`, `gallery`, or `all` |
//! | `sbook get <collection> <key>` | Print a stored document |
//! | `sbook stats` | Per-collection document counts |

use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use story_book::progress::ProgressMode;
use story_book::{config, get, import, migrate, sources, stats};

/// Story Book — bulk loader for the blog's article, category and gallery
/// collections.
#[derive(Parser)]
#[command(
    name = "sbook",
    about = "Story Book — import JSON exports into the blog's document store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sbook.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// List import kinds, their target collections, and matching files.
    Sources,

    /// Import JSON files into a collection.
    ///
    /// Every record is upserted by its business key, so re-running an
    /// import replaces documents instead of duplicating them. Files that
    /// fail to parse and records without a key are reported and skipped.
    Import {
        /// `articles`, `categories`, `gallery`, or `all`.
        kind: String,

        /// Parse and validate without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Print the import report(s) as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Progress on stderr: `off`, `human`, or `json`. Defaults to
        /// `human` when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print a stored document as JSON.
    ///
    /// The key is read as JSON when it parses (`12`, `"12"`) and as a
    /// plain string otherwise.
    Get {
        /// Collection name (e.g. `blog`, `category`, `gallery`).
        collection: String,

        /// Business key, or the value to match when `--field` is given.
        key: String,

        /// Look the document up by this top-level field instead of its key.
        #[arg(long)]
        field: Option<String>,
    },

    /// Show per-collection document counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Import {
            kind,
            dry_run,
            json,
            progress,
        } => {
            let mode = match progress.as_deref() {
                None => ProgressMode::default_for_tty(),
                Some(s) => ProgressMode::parse(s).ok_or_else(|| {
                    anyhow::anyhow!("Unknown progress mode: '{}'. Use off, human, or json.", s)
                })?,
            };
            import::run_import(&cfg, &kind, dry_run, json, mode).await?;
        }
        Commands::Get {
            collection,
            key,
            field,
        } => {
            get::run_get(&cfg, &collection, get::Lookup::from_cli(field, &key)).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
