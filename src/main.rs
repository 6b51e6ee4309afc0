//! heapdb - inspect a heap storage data directory

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heapdb::{Database, DbConfig, ReplacementPolicy};
use std::path::PathBuf;

/// Inspect the tables and storage of a heapdb data directory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration file)
    #[arg(short = 'D', long)]
    data_dir: Option<PathBuf>,

    /// Buffer replacement policy (LRU or MRU)
    #[arg(short, long)]
    policy: Option<ReplacementPolicy>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables with their columns, pages and record counts
    Tables,
    /// Show the configuration and storage statistics
    Stats,
    /// Append the rows of a CSV file to a table
    Append {
        /// Target table
        table: String,
        /// CSV file, one record per line
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match &args.config {
        Some(path) => DbConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => DbConfig::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.db_path = data_dir;
    }
    if let Some(policy) = args.policy {
        config.policy = policy;
    }

    let mut db = Database::open(config).context("Failed to open database")?;
    match args.command {
        Command::Tables => print_tables(&mut db)?,
        Command::Stats => print_stats(&mut db)?,
        Command::Append { table, file } => {
            let count = db
                .append_csv(&table, &file)
                .with_context(|| format!("Failed to append {} into {}", file.display(), table))?;
            println!("{} records appended into {}", count, table);
        }
    }
    db.shutdown().context("Failed to shut down database")?;
    Ok(())
}

fn print_tables(db: &mut Database) -> Result<()> {
    let names = db.table_names();
    if names.is_empty() {
        println!("No tables");
        return Ok(());
    }

    for name in names {
        let relation = db.table(&name)?.clone();
        let columns: Vec<String> = relation
            .columns()
            .iter()
            .map(|c| format!("{}:{}", c.name, c.data_type))
            .collect();
        let pages = relation.data_pages(db.buffer_manager_mut())?.len();
        let records = relation.record_count(db.buffer_manager_mut())?;
        println!(
            "{} ({}) header={} pages={} records={}",
            name,
            columns.join(", "),
            relation.header_page_id(),
            pages,
            records
        );
    }
    Ok(())
}

fn print_stats(db: &mut Database) -> Result<()> {
    let config = db.config().clone();
    println!("Data directory: {}", config.db_path.display());
    println!("Page size: {} bytes", config.page_size);
    println!("Max data files: {}", config.max_file_count);
    println!("Buffer frames: {}", db.buffer_manager().capacity());
    println!("Replacement policy: {}", db.buffer_manager().policy());

    let disk = db.buffer_manager_mut().disk_mut();
    println!("Pages in Data0.bin: {}", disk.page_count(0)?);
    println!("Recycled pages: {}", disk.free_pages().len());
    println!("Tables: {}", db.table_names().len());
    Ok(())
}
