use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenv::dotenv;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use booksync::config::{FetcherConfig, PipelineConfig, UpstreamConfig};
use booksync::pipeline::{scheduler, Pipeline};
use booksync::store::{MemoryOrderStore, OrderStore, PgOrderStore};
use booksync::types::RunSource;
use booksync::upstream::{FetchCache, HttpOrderBookApi, PageFetcher};

// --- CLI Argument Parsing ---
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set the verbosity level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    verbose: String,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run one reconciliation pass and print the summary as JSON
    Run,
    /// Run the scheduler loop, syncing on a fixed interval
    Watch {
        /// Seconds between scheduled runs
        #[arg(short, long, default_value_t = 90)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from the .env file
    dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.verbose)),
        )
        .init();

    let upstream = UpstreamConfig::from_env()?;
    let tuning = FetcherConfig::default();

    let store: Arc<dyn OrderStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(PgOrderStore::connect(&url).await?),
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory store (state is lost on exit)");
            Arc::new(MemoryOrderStore::new())
        }
    };

    let api = Arc::new(HttpOrderBookApi::new(upstream)?);
    let cache = Arc::new(FetchCache::new(tuning.cache_ttl));
    let fetcher = Arc::new(PageFetcher::new(api, cache, tuning.retry));
    let pipeline = Arc::new(Pipeline::new(fetcher, store, PipelineConfig::default()));

    match cli.command {
        Commands::Run => {
            let summary = pipeline.run(RunSource::Manual).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.success {
                std::process::exit(1);
            }
        }
        Commands::Watch { interval } => {
            let handle = scheduler::spawn_scheduled(pipeline, Duration::from_secs(interval));
            handle.await?;
        }
    }

    Ok(())
}
