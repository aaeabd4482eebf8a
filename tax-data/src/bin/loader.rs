use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tax_data::{RebateLoader, TaxPeriodLoader, inventory};
use tax_db_sqlite::SqliteRepository;
use tracing_subscriber::EnvFilter;

/// Load tax periods, brackets and rebates into the database, or list what
/// is already there.
#[derive(Parser, Debug)]
#[command(name = "tax-data-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// SQLite database URL (e.g., sqlite:tax.db?mode=rwc to create if missing)
    #[arg(short, long, default_value = "sqlite:tax.db?mode=rwc")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load tax periods and their brackets.
    ///
    /// Columns: period, financial_year, effective_date, end_date,
    /// min_income, max_income (empty or 9999999999 for no limit), base_tax,
    /// rate_percent
    Brackets {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Load tax periods from cells copied out of the published table.
    ///
    /// Columns: period, financial_year, effective_date, end_date,
    /// taxable_income (e.g. "1 – 237 100", "1 817 001 and above"),
    /// rates_of_tax (e.g. "42 678 + 26% of taxable income above 237 100")
    Published {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Load rebates.
    ///
    /// Columns: age_group, financial_year, rebate_amount
    Rebates {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print every period with its brackets, then every rebate.
    Inspect,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("warn")))
        .init();

    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    match args.command {
        Command::Brackets { file } => load_brackets(&repo, &file, false).await,
        Command::Published { file } => load_brackets(&repo, &file, true).await,
        Command::Rebates { file } => load_rebates(&repo, &file).await,
        Command::Inspect => inspect(&repo).await,
    }
}

async fn load_brackets(
    repo: &SqliteRepository,
    path: &Path,
    published: bool,
) -> Result<()> {
    println!("Loading tax brackets from: {}", path.display());

    let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let records = if published {
        TaxPeriodLoader::parse_published(file)
    } else {
        TaxPeriodLoader::parse(file)
    }
    .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;

    println!("Parsed {} records from CSV", records.len());

    let inserted = TaxPeriodLoader::load(repo, &records)
        .await
        .context("Failed to load tax brackets into database")?;

    println!("Successfully loaded {} tax brackets into the database.", inserted);
    Ok(())
}

async fn load_rebates(
    repo: &SqliteRepository,
    path: &Path,
) -> Result<()> {
    println!("Loading rebates from: {}", path.display());

    let file = File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
    let records = RebateLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", path.display()))?;

    let loaded = RebateLoader::load(repo, &records)
        .await
        .context("Failed to load rebates into database")?;

    println!("Successfully loaded {} rebates into the database.", loaded);
    Ok(())
}

async fn inspect(repo: &SqliteRepository) -> Result<()> {
    let listing = inventory(repo)
        .await
        .context("Failed to read the database")?;
    print!("{listing}");
    Ok(())
}
