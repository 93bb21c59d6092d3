//! # codelens CLI
//!
//! Analyze a codebase with a language model and write a structured
//! `final_summary.json`, or serve the same pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! codelens --config ./config/codelens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codelens init` | Create the SQLite database and run schema migrations |
//! | `codelens analyze <input>` | Analyze a directory or GitHub URL |
//! | `codelens tree <input>` | Print the folder tree of a directory or GitHub URL |
//! | `codelens dump` | Print the stored files, chunks, and analyses |
//! | `codelens clear` | Empty the store and the response cache |
//! | `codelens serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! codelens init
//! codelens analyze ./my-service
//! codelens analyze https://github.com/acme/widgets/tree/main/src --no-cache
//! codelens serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use codelens::analyzer::create_analyzer;
use codelens::config::{self, Config};
use codelens::pipeline::{self, AnalysisContext};
use codelens::{db, github, loader, logging, migrate, server, store};

/// codelens: structured, model-assisted codebase summaries.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/codelens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "codelens",
    about = "codelens: structured, model-assisted codebase summaries",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/codelens.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write logs to a daily-rotated `codelens.log` in this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent. Running it multiple times is safe.
    Init,

    /// Analyze a local directory or GitHub URL.
    ///
    /// Writes `final_summary.json` at the root of the analyzed directory and
    /// caches the result under the exact input string.
    Analyze {
        /// Directory path or `https://github.com/<owner>/<repo>[/tree/<branch>[/<subpath>]]`.
        input: String,

        /// Ignore any cached result and analyze again.
        #[arg(long)]
        no_cache: bool,
    },

    /// Print the folder tree of a directory or GitHub URL as JSON.
    Tree { input: String },

    /// Print every stored file, chunk, and analysis result as JSON.
    Dump,

    /// Empty the stored collections and the response cache.
    Clear,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&cli.log_level, cli.log_dir.as_deref())?;

    // Tree only needs clone settings; fall back to defaults without a config file
    if let Commands::Tree { input } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
        let path = github::resolve_input(input, &cfg.clone).await?;
        let tree = loader::folder_tree(&path)?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Analyze { input, no_cache } => {
            let analyzer = create_analyzer(&cfg.llm)?;
            let ctx = AnalysisContext::open(cfg).await?;
            let outcome =
                pipeline::analyze_input(&ctx, &input, analyzer.as_ref(), !no_cache).await?;

            println!("analyze {}", input);
            println!("  status: {}", outcome.status.as_str());
            println!(
                "  files analyzed: {}",
                outcome.json_data.project_overview.total_files_analyzed
            );
            println!("  summary: {}", outcome.json_path);
            println!(
                "  description: {}",
                outcome.json_data.project_overview.description
            );
        }
        Commands::Dump => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let dump = store::dump_collections(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        Commands::Clear => {
            let ctx = AnalysisContext::open(cfg).await?;
            pipeline::clear_all(&ctx).await?;
            println!("cleared");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Tree { .. } => {}
    }

    Ok(())
}
