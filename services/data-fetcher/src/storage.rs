//! Storage contract consumed by the fetcher
//!
//! All writes are upserts keyed by natural identity, which is what makes the
//! at-least-once re-fetch after a restart safe. Production deployments wire a
//! database-backed implementation; `MemoryStorage` satisfies the same
//! contract for tests and local runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use types::fetch::FetcherState;
use types::stock::Stock;
use types::ticker::{Ticker, TickerDetails};

use crate::error::StorageError;

/// Persistence capability used by the ingestion pipeline and fetch loop.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upsert by ticker identifier.
    async fn put_ticker(&self, ticker: Ticker) -> Result<(), StorageError>;

    /// Upsert by ticker identifier.
    async fn put_ticker_details(&self, details: TickerDetails) -> Result<(), StorageError>;

    /// Upsert by composite (ticker identifier, bar timestamp).
    async fn put_stock(&self, stock: Stock) -> Result<(), StorageError>;

    /// Full scan, used for the priority re-fetch pass.
    async fn get_tickers(&self) -> Result<Vec<Ticker>, StorageError>;

    async fn get_fetcher_state(&self) -> Result<Option<FetcherState>, StorageError>;

    async fn put_fetcher_state(&self, state: FetcherState) -> Result<(), StorageError>;
}

/// In-memory `Storage` with upsert semantics.
#[derive(Default)]
pub struct MemoryStorage {
    tickers: RwLock<BTreeMap<String, Ticker>>,
    details: RwLock<BTreeMap<String, TickerDetails>>,
    stocks: RwLock<BTreeMap<String, Stock>>,
    state: RwLock<Option<FetcherState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stocks_len(&self) -> usize {
        self.stocks.read().await.len()
    }

    pub async fn details_len(&self) -> usize {
        self.details.read().await.len()
    }

    pub async fn get_stock(&self, stock_id: &str) -> Option<Stock> {
        self.stocks.read().await.get(stock_id).cloned()
    }

    pub async fn get_details(&self, ticker_id: &str) -> Option<TickerDetails> {
        self.details.read().await.get(ticker_id).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put_ticker(&self, ticker: Ticker) -> Result<(), StorageError> {
        self.tickers
            .write()
            .await
            .insert(ticker.ticker_id.clone(), ticker);
        Ok(())
    }

    async fn put_ticker_details(&self, details: TickerDetails) -> Result<(), StorageError> {
        self.details
            .write()
            .await
            .insert(details.ticker_id.clone(), details);
        Ok(())
    }

    async fn put_stock(&self, stock: Stock) -> Result<(), StorageError> {
        self.stocks
            .write()
            .await
            .insert(stock.stock_id.clone(), stock);
        Ok(())
    }

    async fn get_tickers(&self) -> Result<Vec<Ticker>, StorageError> {
        Ok(self.tickers.read().await.values().cloned().collect())
    }

    async fn get_fetcher_state(&self) -> Result<Option<FetcherState>, StorageError> {
        Ok(self.state.read().await.clone())
    }

    async fn put_fetcher_state(&self, state: FetcherState) -> Result<(), StorageError> {
        *self.state.write().await = Some(state);
        Ok(())
    }
}
