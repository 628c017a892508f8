//! # Cellar Search CLI (`cellar`)
//!
//! ## Usage
//!
//! ```bash
//! cellar --config ./config/cellar.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cellar init` | Create the SQLite key-value store |
//! | `cellar search "<query>"` | Hybrid search over the vector index |
//! | `cellar suggest "<query>"` | Autocomplete suggestions |
//! | `cellar record "<term>"` | Record a committed search |
//! | `cellar history` | Show (or `--clear`) search history |
//! | `cellar trending` | Show trending terms |
//! | `cellar index <file.json>` | Embed and upsert documents |
//! | `cellar delete <id>...` | Delete documents from the index |
//! | `cellar serve` | Start the HTTP API |
//! | `cellar completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use cellar_search::search::SearchOptions;
use cellar_search::{commands, config, db, server};
use cellar_search_core::category::Category;

/// Cellar Search: hybrid semantic + lexical search with history-aware
/// suggestions.
#[derive(Parser)]
#[command(
    name = "cellar",
    about = "Cellar Search: hybrid retrieval and suggestions for wine, sake and tasting content",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cellar.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite database and key-value table. Idempotent.
    Init,

    /// Search the index.
    Search {
        query: String,

        /// Keep only these result types (course, wine, article, faq, game).
        #[arg(long = "type")]
        types: Vec<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,

        /// Vector store namespace (defaults to `[vector_store].namespace`).
        #[arg(long)]
        namespace: Option<String>,

        /// Collect matched query terms for each result.
        #[arg(long)]
        highlight: bool,

        /// Do not record the query in history and trending.
        #[arg(long)]
        no_record: bool,
    },

    /// Show autocomplete suggestions for a partial query.
    Suggest {
        /// Partial query. Empty shows trending terms.
        #[arg(default_value = "")]
        query: String,

        /// The query typed before this one.
        #[arg(long)]
        previous: Option<String>,

        /// Restrict dictionary suggestions to a category.
        #[arg(long)]
        category: Option<Category>,
    },

    /// Record a committed search.
    Record { term: String },

    /// Show search history.
    History {
        /// Clear history and context instead (trending is kept).
        #[arg(long)]
        clear: bool,
    },

    /// Show trending search terms.
    Trending,

    /// Embed and upsert documents from a JSON array file.
    Index {
        file: PathBuf,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Delete documents from the index.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long)]
        namespace: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "cellar", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            db::init(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Search {
            query,
            types,
            limit,
            namespace,
            highlight,
            no_record,
        } => {
            let opts = SearchOptions {
                limit,
                types: commands::parse_types(&types)?,
                namespace,
                filter: None,
                highlight,
                record: !no_record,
            };
            commands::run_search(&cfg, &query, opts).await?;
        }
        Commands::Suggest {
            query,
            previous,
            category,
        } => {
            commands::run_suggest(&cfg, &query, previous, category).await?;
        }
        Commands::Record { term } => {
            commands::run_record(&cfg, &term).await?;
        }
        Commands::History { clear } => {
            commands::run_history(&cfg, clear).await?;
        }
        Commands::Trending => {
            commands::run_trending(&cfg).await?;
        }
        Commands::Index { file, namespace } => {
            commands::run_index(&cfg, &file, namespace.as_deref()).await?;
        }
        Commands::Delete { ids, namespace } => {
            commands::run_delete(&cfg, &ids, namespace.as_deref()).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        // Printed above, before config load.
        Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_flags_parse() {
        let cli = Cli::try_parse_from([
            "cellar", "search", "pinot", "--type", "wine", "--type", "course", "--limit", "3",
            "--no-record",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                query,
                types,
                limit,
                no_record,
                ..
            } => {
                assert_eq!(query, "pinot");
                assert_eq!(types, vec!["wine", "course"]);
                assert_eq!(limit, Some(3));
                assert!(no_record);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_suggest_category_parses() {
        let cli = Cli::try_parse_from(["cellar", "suggest", "ju", "--category", "sake"]).unwrap();
        match cli.command {
            Commands::Suggest { category, .. } => assert_eq!(category, Some(Category::Sake)),
            _ => panic!("expected suggest"),
        }
    }
}
