use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use snapshot_core::PipelineConfig;
use snapshot_pipeline::{dump, run, run_concurrent, Collection};
use snapshot_store::SqliteStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Indicator enrichment and market snapshot builder")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Enrich bars with indicators, then build snapshots.
    Run {
        /// SQLite database file.
        db: PathBuf,
        /// JSON configuration; defaults apply to missing keys.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Process symbols one at a time on the main thread.
        #[arg(long)]
        sequential: bool,
    },
    /// Print stored documents as JSON lines.
    Dump {
        /// SQLite database file.
        db: PathBuf,
        #[arg(value_enum)]
        collection: Collection,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run {
            db,
            config,
            sequential,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::from_json_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            let store = SqliteStore::open(&db)
                .with_context(|| format!("opening {}", db.display()))?;
            let now = Utc::now();

            let summary = if sequential {
                run(&store, &config, now)?
            } else {
                run_concurrent(Arc::new(store), Arc::new(config), now).await?
            };
            for (symbol, error) in &summary.failed {
                eprintln!("{symbol}: {error}");
            }
            if !summary.is_clean() {
                anyhow::bail!("{} symbol(s) failed", summary.failed.len());
            }
        }
        Cmd::Dump {
            db,
            collection,
            symbol,
            limit,
        } => {
            let store = SqliteStore::open(&db)
                .with_context(|| format!("opening {}", db.display()))?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            dump(&store, collection, symbol.as_deref(), limit, &mut out)?;
            out.flush()?;
        }
    }

    Ok(())
}
