//! soledb - a single-table persistent database with an interactive prompt.

use anyhow::{Context, Result};
use clap::Parser;
use soledb::database::Database;
use soledb::repl;
use soledb::storage::pager::DEFAULT_MAX_PAGES;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the database file (created if missing)
    file: PathBuf,

    /// Maximum number of pages the file may grow to
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let db = Database::open(&args.file, args.max_pages)
        .with_context(|| format!("failed to open database at {}", args.file.display()))?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    repl::run(db, stdin.lock(), stdout.lock())
}
