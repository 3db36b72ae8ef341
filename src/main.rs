mod dedup;
mod error;
mod fetch;
mod parser;
mod pipeline;
mod reconcile;
mod record;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use error::StoreError;
use fetch::HttpFetcher;
use pipeline::Pipeline;
use settings::{Overrides, Settings};
use store::sqlite::SqliteStore;
use store::{Store, StoreStats};

#[derive(Parser)]
#[command(name = "reward_scraper", about = "Collect new reward links into a store")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: ./reward_scraper.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Page to scrape
    #[arg(long, global = true)]
    source_url: Option<String>,
    /// Store identifier (SQLite file path)
    #[arg(long, global = true)]
    store: Option<String>,
    /// Store region name
    #[arg(long, global = true)]
    region: Option<String>,
    /// Keep only the N most recent links (default: append forever)
    #[arg(long, global = true)]
    window: Option<usize>,
    /// Fetch timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the page once and store the new links
    Run {
        /// Do everything except writing to the store
        #[arg(long)]
        dry_run: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create the store region if it does not exist
    Init,
    /// List stored links
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show store statistics
    Stats,
}

impl From<GlobalArgs> for Overrides {
    fn from(args: GlobalArgs) -> Self {
        Overrides {
            config_file: args.config,
            source_url: args.source_url,
            store: args.store,
            region: args.region,
            window: args.window,
            timeout_secs: args.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.global.into()).context("Invalid configuration")?;

    let result = match cli.command {
        Commands::Run { dry_run, json } => run(&settings, dry_run, json).await,
        Commands::Init => {
            let store = open_store(&settings)?;
            store.initialize()?;
            println!("Region '{}' ready in {}", store.region(), settings.store);
            Ok(())
        }
        Commands::List { limit, json } => {
            let store = open_store(&settings)?;
            let rows = store.read_existing()?;
            let shown = &rows[..rows.len().min(limit)];
            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
                return Ok(());
            }
            if shown.is_empty() {
                println!("No links stored.");
                return Ok(());
            }

            println!("{:>3} | {:<10} | {:<28} | {}", "#", "Date", "Title", "URL");
            println!("{}", "-".repeat(90));
            for (i, r) in shown.iter().enumerate() {
                println!("{:>3} | {:<10} | {:<28} | {}", i + 1, r.date, truncate(&r.title, 28), r.url);
            }
            println!("\n{} of {} links", shown.len(), rows.len());
            Ok(())
        }
        Commands::Stats => {
            let store = open_store(&settings)?;
            let s = match store.stats() {
                Err(StoreError::Uninitialized { .. }) => StoreStats::default(),
                other => other?,
            };
            println!("Region:    {}", store.region());
            println!("Rows:      {}", s.rows);
            println!("Distinct:  {}", s.distinct_urls);
            println!("Oldest:    {}", s.oldest.as_deref().unwrap_or("-"));
            println!("Newest:    {}", s.newest.as_deref().unwrap_or("-"));
            match settings.window {
                Some(n) => println!("Policy:    rolling window of {}", n),
                None => println!("Policy:    append"),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("Done in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let fetcher = HttpFetcher::new(settings)?;
    let mut pipeline = Pipeline::new(settings, fetcher, store)?.dry_run(dry_run);

    let run_date = chrono::Utc::now().date_naive();
    let summary = pipeline.run(run_date).await?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

fn open_store(settings: &Settings) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&settings.store, &settings.region)
        .with_context(|| format!("Failed to open store {}", settings.store))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
