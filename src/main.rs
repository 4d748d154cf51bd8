//! # Bagel CLI (`bagel`)
//!
//! ## Usage
//!
//! ```bash
//! bagel --config ./config/bagel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bagel init` | Create the bookmark database, log directory and landing root |
//! | `bagel tables` | Print the normalized table configuration |
//! | `bagel run [--table NAME]...` | Extract and land all (or the named) tables |
//! | `bagel timebox get <table>` | Show a table's bookmark |
//! | `bagel timebox set <table> <ts>` | Overwrite a table's bookmark |
//!
//! `bagel run` exits non-zero when any table failed; every table is still
//! attempted first.

use bagel::{backends, config, logging, migrate, tables, timebox_cmd};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bagel: incremental extract-and-land runs for one source system.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Credentials are read from the environment (and a `.env` file).
#[derive(Parser)]
#[command(
    name = "bagel",
    about = "Incremental extract-and-land engine",
    version,
    long_about = "Bagel pulls each configured table of a source system since its last bookmark, \
    lands the payloads as timestamped artifacts in object storage, and advances the bookmark \
    window by window."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bagel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the bookmark database schema and working directories.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Print the normalized table configuration.
    Tables,

    /// Extract and land tables.
    ///
    /// Without `--table`, every configured table runs. A failing table does
    /// not stop the others; the command fails at the end if any did.
    Run {
        /// Restrict the run to these tables (repeatable).
        #[arg(long = "table")]
        tables: Vec<String>,
    },

    /// Inspect or overwrite bookmarks.
    Timebox {
        #[command(subcommand)]
        action: TimeboxAction,
    },
}

#[derive(Subcommand)]
enum TimeboxAction {
    /// Show a table's persisted bookmark.
    Get {
        /// Table name (normalized before lookup).
        table: String,
    },
    /// Overwrite a table's bookmark.
    Set {
        /// Table name (normalized before lookup).
        table: String,
        /// New bookmark, `%Y-%m-%dT%H:%M:%S.%fZ` or RFC 3339.
        timestamp: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_tracing(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            if cfg.timebox.backend == "sqlite" {
                migrate::run_migrations(&cfg).await?;
            }
            std::fs::create_dir_all(&cfg.logging.dir)?;
            if cfg.storage.backend == "local" {
                if let Some(root) = &cfg.storage.root {
                    std::fs::create_dir_all(root)?;
                }
            }
            println!("Bagel initialized successfully.");
        }
        Commands::Tables => {
            tables::list_tables(&cfg)?;
        }
        Commands::Run { tables } => {
            let connector = backends::connector(&cfg)?;
            let bagel = backends::build_bagel(&cfg, connector)?;
            let summary = if tables.is_empty() {
                bagel.run().await?
            } else {
                bagel.run_tables(&tables).await?
            };

            println!("{:<28} {:>7} {:>6}  BOOKMARK", "TABLE", "WINDOWS", "FILES");
            for report in &summary.tables {
                println!(
                    "{:<28} {:>7} {:>6}  {}",
                    report.table,
                    report.windows,
                    report.files.len(),
                    report.bookmark
                );
            }
            println!(
                "{} files landed for source '{}'.",
                summary.files_written(),
                summary.source
            );
        }
        Commands::Timebox { action } => match action {
            TimeboxAction::Get { table } => {
                timebox_cmd::run_get(&cfg, &table).await?;
            }
            TimeboxAction::Set { table, timestamp } => {
                timebox_cmd::run_set(&cfg, &table, &timestamp).await?;
            }
        },
    }

    Ok(())
}
