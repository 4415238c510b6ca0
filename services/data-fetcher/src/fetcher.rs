//! Continuous fetch loop
//!
//! Top-level driver: repeatedly runs a full ingestion pass, applies backoff
//! on failure, guards against re-entering right after a completed pass, and
//! latches the mode from historical backfill to the incremental window after
//! the first successful full pass. State is loaded at startup and persisted
//! on shutdown so a restart resumes instead of starting over.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::Endpoints;
use crate::client::{ApiAuth, HttpClient, RateLimitedClient};
use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::queue::MediaQueue;
use crate::state::{FetchMode, FetchState};
use crate::storage::Storage;

/// Query parameter the upstream expects the API credential under.
const API_TOKEN_KEY: &str = "apiKey";

/// The market-data fetcher: owns the fetch state and drives ingestion
/// through the client, storage, and queue collaborators.
pub struct Fetcher {
    pub(crate) client: Arc<dyn HttpClient>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) queue: Arc<dyn MediaQueue>,
    pub(crate) endpoints: Endpoints,
    pub(crate) config: FetcherConfig,
    pub(crate) state: FetchState,
    pub(crate) ticker_id: Option<String>,
}

impl Fetcher {
    /// Build a fetcher with the production rate-limited client.
    pub fn new(
        config: FetcherConfig,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn MediaQueue>,
    ) -> Result<Self, FetchError> {
        let client = RateLimitedClient::new(ApiAuth::QueryToken {
            key: API_TOKEN_KEY.to_string(),
            value: config.api_token.clone(),
        })
        .with_limiter(config.limiter_config())
        .with_retry_policy(config.retry_policy())
        .with_call_timeout(config.call_timeout());

        Self::with_client(config, Arc::new(client), storage, queue)
    }

    /// Build a fetcher around an injected HTTP client.
    pub fn with_client(
        config: FetcherConfig,
        client: Arc<dyn HttpClient>,
        storage: Arc<dyn Storage>,
        queue: Arc<dyn MediaQueue>,
    ) -> Result<Self, FetchError> {
        let endpoints = Endpoints::new(&config.base_url)?;
        let state = FetchState::new(
            config.mode_total_hours,
            config.mode_current_hours,
            config.recently_threshold(),
        );
        Ok(Self {
            client,
            storage,
            queue,
            endpoints,
            config,
            state,
            ticker_id: None,
        })
    }

    /// Pin a single ticker: the loop ingests only that ticker and terminates
    /// after one successful pass.
    pub fn set_ticker_id(&mut self, ticker_id: &str) {
        if ticker_id.is_empty() {
            warn!("ticker id is empty; ticker id not set");
            return;
        }
        self.ticker_id = Some(ticker_id.to_string());
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// Run the continuous fetch loop until the retry budget is exhausted (an
    /// error return; the supervisor restarts the process) or, in pinned
    /// single-ticker mode, until one pass succeeds.
    pub async fn run(&mut self) -> Result<(), FetchError> {
        if self.ticker_id.is_none() {
            // resume from persisted state when fetching the full universe
            if let Err(err) = self.load_state().await {
                error!(error = %err, "state loading from storage failed");
            }
        }
        self.state.set_mode(FetchMode::Total);

        let mut tries_left = self.config.fetch_retry_count;
        loop {
            if self.state.has_recently_fetched(Utc::now()) {
                info!(
                    sleep = ?self.config.recently_sleep(),
                    "recently fetched; waiting before the next pass"
                );
                sleep(self.config.recently_sleep()).await;
                self.state.reset_finished();
                continue;
            }

            match self.fetch_info().await {
                Ok(()) => {
                    self.state.set_updated_at(Utc::now());
                    self.state.mark_finished();
                    tries_left = self.config.fetch_retry_count;
                    info!("fetch pass successfully finished");

                    if self.ticker_id.is_some() {
                        return Ok(());
                    }
                    self.state.latch_current();
                }
                Err(err) => {
                    error!(
                        error = %err,
                        backoff = ?self.config.error_sleep(),
                        "fetch pass failed; backing off"
                    );
                    sleep(self.config.error_sleep()).await;
                    if tries_left == 0 {
                        return Err(FetchError::RetriesExhausted {
                            attempts: self.config.fetch_retry_count + 1,
                        });
                    }
                    tries_left -= 1;
                }
            }
        }
    }

    /// Persist the current fetch state. Called unconditionally on shutdown,
    /// including the fatal path.
    pub async fn save_state(&self) -> Result<(), FetchError> {
        self.storage
            .put_fetcher_state(self.state.to_record(Utc::now()))
            .await?;
        Ok(())
    }

    async fn load_state(&mut self) -> Result<(), FetchError> {
        let Some(record) = self.storage.get_fetcher_state().await? else {
            // cold start
            return Ok(());
        };
        self.state.restore(&record);
        info!("fetcher state restored from storage");
        Ok(())
    }
}
