//! # Archivum CLI (`arv`)
//!
//! The `arv` binary is the primary interface for Archivum. It provides
//! commands for database initialization, archive imports, direct media
//! storage, job inspection, link traversal, and archive statistics.
//!
//! ## Usage
//!
//! ```bash
//! arv --config ./config/arv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `arv init` | Create the SQLite database and run schema migrations |
//! | `arv import <source>` | Run a staged import of an export file or directory |
//! | `arv store <file>` | Add one file to the content-addressed media store |
//! | `arv jobs` | List recent import jobs |
//! | `arv job <id>` | Show one job's phases, counters, and error log |
//! | `arv links <uri>` | Show all typed links touching a content URI |
//! | `arv stats` | Archive overview (units, media, links, coverage) |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! arv init --config ./config/arv.toml
//!
//! # Import a ChatGPT export zip
//! arv import ~/exports/chatgpt-2026-08.zip
//!
//! # Preview what a Facebook import would do
//! arv import ~/exports/facebook --dry-run
//!
//! # Force the source type and skip media
//! arv import ~/notes --source-type markdown --skip-media
//!
//! # Machine-readable progress and result
//! arv import ~/exports/chatgpt.zip --progress json --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use archivum::models::ImportOptions;
use archivum::progress::ProgressMode;
use archivum::{config, import, jobs, links, migrate, stats, store};

/// Archivum CLI — a local-first import engine for personal data archives.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/arv.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "arv",
    about = "Archivum — a local-first import engine for personal data archives",
    version,
    long_about = "Archivum ingests heterogeneous platform exports (ChatGPT, Facebook, Markdown \
    trees) into one normalized corpus: content units in SQLite, deduplicated media in a \
    content-addressed store, and typed links between units, driven by resumable staged \
    import jobs."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/arv.toml`. Database, archive-root, media, and
    /// embedding settings are read from this file.
    #[arg(long, global = true, default_value = "./config/arv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (content_units, media_files, media_references, content_links,
    /// import_jobs, unit_vectors). Idempotent.
    Init,

    /// Import an export file or directory.
    ///
    /// Detects the source type, extracts archives into a per-job
    /// workspace, parses into normalized units, stores media into the
    /// content-addressed store, records links, and optionally embeds.
    /// Item-level failures are logged on the job and skipped; the run
    /// only fails outright for unreadable or unrecognized sources.
    Import {
        /// Path to the export: a zip, a JSON file, a Markdown/text file,
        /// or a directory.
        source: PathBuf,

        /// Override source-type detection (`chatgpt`, `facebook`, `markdown`).
        #[arg(long)]
        source_type: Option<String>,

        /// Human-readable name recorded on the job. Defaults to the
        /// source file name.
        #[arg(long)]
        source_name: Option<String>,

        /// Skip media resolution and storage entirely.
        #[arg(long)]
        skip_media: bool,

        /// Skip the embedding phase even when a provider is configured.
        #[arg(long)]
        skip_embeddings: bool,

        /// Parse and count without writing units, media, or links.
        #[arg(long)]
        dry_run: bool,

        /// Assign random unit ids instead of source-derived stable ids.
        #[arg(long)]
        no_preserve_ids: bool,

        /// Progress reporting on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal, `off` otherwise.
        #[arg(long)]
        progress: Option<String>,

        /// Print the final result as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Add a single file to the content-addressed media store.
    ///
    /// Prints the content hash and sharded path. Re-storing identical
    /// bytes reports `duplicate` and writes nothing.
    Store {
        /// Path to the file to store.
        file: PathBuf,
    },

    /// List recent import jobs, newest first.
    Jobs {
        /// Maximum number of jobs to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Show one import job in full: status, phase, counters, error log.
    Job {
        /// Job id (UUID).
        id: String,
    },

    /// Show all typed links touching a content URI.
    Links {
        /// Content URI, e.g. `content://chatgpt/conversation/<id>`.
        uri: String,
    },

    /// Print archive statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            source,
            source_type,
            source_name,
            skip_media,
            skip_embeddings,
            dry_run,
            no_preserve_ids,
            progress,
            json,
        } => {
            let mode = match progress.as_deref() {
                Some("off") => ProgressMode::Off,
                Some("human") => ProgressMode::Human,
                Some("json") => ProgressMode::Json,
                Some(other) => anyhow::bail!("unknown progress mode: {}", other),
                None => ProgressMode::default_for_tty(),
            };
            let options = ImportOptions {
                source_type,
                source_name,
                skip_media,
                skip_embeddings,
                dry_run,
                preserve_ids: !no_preserve_ids,
            };
            let reporter = mode.reporter();
            import::run_import_cmd(&cfg, &source, &options, reporter.as_ref(), json).await?;
        }
        Commands::Store { file } => {
            store::run_store(&cfg, &file).await?;
        }
        Commands::Jobs { limit } => {
            jobs::run_jobs(&cfg, limit).await?;
        }
        Commands::Job { id } => {
            jobs::run_job_show(&cfg, &id).await?;
        }
        Commands::Links { uri } => {
            links::run_links(&cfg, &uri).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
