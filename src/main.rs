use anyhow::{Context, Result};
use clap::Parser;
use listing_commute::cache::{DiskCache, MemoryCache, PageCache};
use listing_commute::commute::{BatchLimits, CommuteResolver, DistanceMatrixClient};
use listing_commute::config::{load_api_key, Config};
use listing_commute::scrapers::{CachingFetcher, HttpFetcher};
use listing_commute::{table, Pipeline, PipelineOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listing-commute")]
#[command(about = "Enrich rental listing URLs with listing details and commute times")]
struct Cli {
    /// CSV file with a `url` column
    #[arg(long)]
    input: PathBuf,

    /// Write the enriched CSV here (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Cache downloaded listing pages in this directory
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Commute destination address (repeatable)
    #[arg(
        long = "destination",
        visible_alias = "commute-addresses",
        alias = "commute_addresses",
        num_args = 1..
    )]
    destinations: Vec<String>,

    /// TOML config file (headers, routing limits, ...)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to sleep after each network fetch (avoid blocking)
    #[arg(long)]
    sleep: Option<u64>,

    /// Listing pages fetched in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Travel mode: driving, transit, walking, bicycling
    #[arg(long)]
    mode: Option<String>,

    /// Depart tomorrow at this hour (0-23, local time)
    #[arg(long)]
    departure_hour: Option<u32>,

    /// File holding the routing API key
    #[arg(long)]
    api_key_file: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<(Config, PathBuf, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if self.cache.is_some() {
            config.cache_dir = self.cache;
        }
        if !self.destinations.is_empty() {
            config.destinations = self.destinations;
        }
        if let Some(sleep) = self.sleep {
            config.fetch_delay_secs = sleep;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(mode) = self.mode {
            config.routing.mode = mode;
        }
        if self.departure_hour.is_some() {
            config.routing.departure_hour = self.departure_hour;
        }
        if let Some(path) = self.api_key_file {
            config.credential_path = path;
        }

        Ok((config, self.input, self.output))
    }
}

const DEFAULT_LOG_FILTER: &str = "listing_commute=info";

/// `RUST_LOG` when set and valid, otherwise info for this crate
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so CSV on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let (config, input, output) = Cli::parse().into_config()?;

    // Everything that can be checked up front is, before any network activity
    config.validate()?;
    let api_key = load_api_key(&config.credential_path)?;
    let destinations = config.destinations();

    let file = std::fs::File::open(&input)
        .with_context(|| format!("Failed to open input {}", input.display()))?;
    let input_table = table::read_requests(file, &config.url_column)?;
    info!(
        "Read {} listings from {}",
        input_table.requests.len(),
        input.display()
    );

    let cache: Arc<dyn PageCache> = match &config.cache_dir {
        Some(dir) => Arc::new(
            DiskCache::open(dir)
                .await
                .with_context(|| format!("Failed to open cache directory {}", dir.display()))?,
        ),
        None => Arc::new(MemoryCache::new()),
    };
    let fetcher = CachingFetcher::new(cache, Arc::new(HttpFetcher::from_config(&config)?));

    let routing = DistanceMatrixClient::from_config(&config.routing, api_key)
        .context("Failed to create routing client")?;
    let resolver = CommuteResolver::new(Arc::new(routing), BatchLimits::from(&config.routing));

    let pipeline = Pipeline::new(
        fetcher,
        resolver,
        PipelineOptions {
            destinations: destinations.clone(),
            concurrency: config.concurrency,
            fetch_delay: config.fetch_delay(),
        },
    );

    let (rows, _summary) = pipeline.run(&input_table.requests).await;

    match &output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output {}", path.display()))?;
            table::write_rows(file, &input_table.headers, &destinations, &rows)?;
            info!("💾 Saved {} rows to {}", rows.len(), path.display());
        }
        None => {
            table::write_rows(std::io::stdout(), &input_table.headers, &destinations, &rows)?;
        }
    }

    Ok(())
}
