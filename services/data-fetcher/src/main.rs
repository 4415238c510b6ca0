use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use data_fetcher::config::FetcherConfig;
use data_fetcher::fetcher::Fetcher;
use data_fetcher::queue::MemoryQueue;
use data_fetcher::storage::MemoryStorage;

#[derive(Parser, Debug)]
#[command(name = "data-fetcher", about = "Continuous market-data fetcher")]
struct Args {
    /// Path to a TOML config file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch a single ticker and exit after one successful pass
    #[arg(long)]
    ticker: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => FetcherConfig::load(path)?,
        None => FetcherConfig::default(),
    };

    tracing::info!("Starting data-fetcher service");

    let storage = Arc::new(MemoryStorage::new());
    let queue = Arc::new(MemoryQueue::new());
    let mut fetcher = Fetcher::new(config, storage, queue)?;
    if let Some(ticker) = &args.ticker {
        fetcher.set_ticker_id(ticker);
    }

    let result = tokio::select! {
        res = fetcher.run() => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            Ok(())
        }
    };

    // Persist cursors so the next start resumes instead of refetching
    if let Err(err) = fetcher.save_state().await {
        tracing::error!(error = %err, "cannot persist fetcher state on shutdown");
    }

    result?;
    Ok(())
}
