//! tagcache - command line access to a tagcache database.
//!
//! Useful for inspecting entries and for periodic maintenance (`purge`) from cron
//! or a systemd timer.

mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tagcache_core::{CacheError, CacheOptions, SqliteCache};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use commands::Command;

#[derive(Parser, Debug)]
#[command(name = "tagcache")]
#[command(about = "Inspect and maintain a tagcache database")]
struct Args {
    /// Database file (defaults to the user cache directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON file with cache options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

/// Exit status for a rejected request (bad options or arguments).
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(&args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

fn run(args: &Args) -> Result<String> {
    let options = match &args.config {
        Some(path) => CacheOptions::from_json_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => CacheOptions::default(),
    };

    let db_path = match &args.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    info!("Cache database: {}", db_path.display());

    let cache = SqliteCache::open(&db_path, options)
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    commands::execute(&cache, &args.command)
}

/// Caller mistakes exit with [`EXIT_USAGE`]; storage and codec faults with 1.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CacheError>() {
        Some(cache_err) if cache_err.is_caller_error() => EXIT_USAGE,
        _ => 1,
    }
}

fn default_db_path() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("No cache directory for this platform; pass --db")?;
    Ok(base.join("tagcache").join("cache.sqlite"))
}
