//! Ingestion pipeline
//!
//! Walks the paginated ticker, details, and bars endpoints, maps wire
//! payloads to domain entities, and pushes branding images onto the media
//! queue. Every persistence call is an upsert, so re-running a partially
//! completed pass after a restart is safe.

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use types::media::{PutMessage, PutMessageMeta};

use crate::api::{
    self, StocksResponse, TickerDetailsResponse, TickersQuery, TickersResponse, RESP_STATUS_OK,
};
use crate::error::FetchError;
use crate::fetcher::Fetcher;

/// Media storage section branding images are published into.
const BRANDING_SECTION: &str = "polygon_references";
/// Origin tag on published media messages.
const SERVICE_TAG: &str = "data-fetcher";

const BRANDING_ICON: &str = "icon";
const BRANDING_LOGO: &str = "logo";

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|err| FetchError::Malformed(err.to_string()))
}

/// File extension of an image URL path, for naming the published object.
fn file_extension(image_url: &str) -> Option<String> {
    let url = reqwest::Url::parse(image_url).ok()?;
    let segment = url.path_segments()?.last()?.to_string();
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_string())
    }
}

impl Fetcher {
    /// One full ingestion pass: refresh bars for the configured priority
    /// tickers already in storage, then discover and ingest the ticker
    /// universe (or just the pinned ticker).
    pub async fn fetch_info(&mut self) -> Result<(), FetchError> {
        self.fetch_stocks_for_stored_tickers().await?;

        let filter = self.ticker_id.clone();
        self.fetch_tickers(filter.as_deref()).await?;
        Ok(())
    }

    /// Walk the ticker-list pages; for every ticker, upsert it and ingest its
    /// details and bars before moving on.
    pub(crate) async fn fetch_tickers(&mut self, filter: Option<&str>) -> Result<(), FetchError> {
        if filter.is_none() {
            warn!("no ticker filter specified; fetching the full listing");
        }
        let mut query = TickersQuery::new(filter);

        loop {
            let fresh = self.endpoints.tickers(&query);
            let url = self.state.ticker.resolve(move || fresh);

            let body = self.client.get(&url).await?;
            let resp: TickersResponse = decode(&body)?;

            if resp.status != RESP_STATUS_OK {
                return Err(FetchError::BadStatus(resp.status));
            }
            if resp.count == 0 {
                break;
            }

            for result in &resp.results {
                if result.ticker.trim().is_empty() {
                    continue;
                }
                let ticker = api::to_ticker(result, Utc::now());
                let ticker_id = ticker.ticker_id.clone();
                self.storage.put_ticker(ticker).await?;
                self.fetch_ticker_details_and_stocks(&ticker_id).await?;
            }

            let Some(next_url) = resp.next_url.as_deref().filter(|u| !u.is_empty()) else {
                break;
            };
            let Some(cursor) = api::cursor_from_next_url(next_url)? else {
                break;
            };
            debug!(%cursor, "following next ticker page");
            query.cursor = Some(cursor);
        }
        Ok(())
    }

    /// Details plus bars for one ticker. Branding publish failures are logged
    /// and swallowed; price-data ingestion must not block on them.
    pub(crate) async fn fetch_ticker_details_and_stocks(
        &mut self,
        ticker_id: &str,
    ) -> Result<(), FetchError> {
        let details = self.fetch_ticker_details(ticker_id).await?;
        self.storage.put_ticker_details(details).await?;
        self.fetch_stocks(ticker_id, true).await?;
        Ok(())
    }

    async fn fetch_ticker_details(
        &mut self,
        ticker_id: &str,
    ) -> Result<types::ticker::TickerDetails, FetchError> {
        let fresh = self.endpoints.ticker_details(ticker_id);
        let url = self.state.ticker_details.resolve(move || fresh);

        let body = self.client.get(&url).await?;
        let resp: TickerDetailsResponse = decode(&body)?;

        if resp.status != RESP_STATUS_OK {
            return Err(FetchError::BadStatus(resp.status));
        }
        let results = resp
            .results
            .ok_or_else(|| FetchError::Malformed("ticker details results not found".into()))?;

        if let Some(branding) = &results.branding {
            // best effort: branding must never fail the pass
            if let Err(err) = self.publish_ticker_branding(ticker_id, branding).await {
                error!(ticker_id, error = %err, "cannot publish branding for ticker");
            }
        }

        Ok(api::to_ticker_details(&results, Utc::now()))
    }

    /// Ingest bars for one ticker over the active mode's window, following
    /// the provider's absolute next-page URLs until an empty page.
    pub(crate) async fn fetch_stocks(
        &mut self,
        ticker_id: &str,
        use_resumed_cursor: bool,
    ) -> Result<(), FetchError> {
        let fresh = self
            .endpoints
            .stocks(ticker_id, self.state.window_hours(), Utc::now());
        let mut url = if use_resumed_cursor {
            self.state.stocks.resolve(move || fresh)
        } else {
            fresh
        };

        loop {
            let body = self.client.get(&url).await?;
            let resp: StocksResponse = decode(&body)?;

            if resp.status != RESP_STATUS_OK {
                return Err(FetchError::BadStatus(resp.status));
            }
            if resp.query_count == 0 && resp.count == 0 {
                warn!(ticker_id, "stock prices not found for ticker");
                return Ok(());
            }

            for result in &resp.results {
                let stock = api::to_stock(ticker_id, result, Utc::now());
                self.storage.put_stock(stock).await?;
            }

            match resp.next_url.as_deref().filter(|u| !u.is_empty()) {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }
        Ok(())
    }

    /// Refresh bars for stored tickers on the priority list before running
    /// discovery. An empty list makes this pass a no-op.
    pub(crate) async fn fetch_stocks_for_stored_tickers(&mut self) -> Result<(), FetchError> {
        if self.config.priority_tickers.is_empty() {
            debug!("no priority tickers configured; skipping refresh pass");
            return Ok(());
        }
        let tickers = self.storage.get_tickers().await?;

        let mut refreshed = 0usize;
        for ticker in &tickers {
            if !self
                .config
                .priority_tickers
                .iter()
                .any(|p| p == &ticker.ticker_id)
            {
                continue;
            }
            self.fetch_stocks(&ticker.ticker_id, false).await?;
            refreshed += 1;
        }
        info!(refreshed, stored = tickers.len(), "stocks refreshed for stored tickers");
        Ok(())
    }

    async fn publish_ticker_branding(
        &self,
        ticker_id: &str,
        branding: &api::TickerBranding,
    ) -> Result<(), FetchError> {
        for (image_url, kind) in [
            (branding.icon_url.trim(), BRANDING_ICON),
            (branding.logo_url.trim(), BRANDING_LOGO),
        ] {
            if image_url.is_empty() {
                continue;
            }
            let message = self.branding_message(ticker_id, image_url, kind).await?;
            self.queue
                .publish(message)
                .await
                .map_err(FetchError::from)?;
        }
        Ok(())
    }

    async fn branding_message(
        &self,
        ticker_id: &str,
        image_url: &str,
        kind: &str,
    ) -> Result<PutMessage, FetchError> {
        let image = self.client.get_full(image_url).await?;
        let extension = file_extension(image_url).ok_or_else(|| {
            FetchError::Malformed(format!("cannot extract image extension from url: {image_url}"))
        })?;

        // ticker_id-branding_kind.extension
        let name = format!("{ticker_id}-{kind}.{extension}");

        Ok(PutMessage {
            meta: PutMessageMeta {
                name,
                section: BRANDING_SECTION.to_string(),
                overwrite: false,
                from: SERVICE_TAG.to_string(),
                timestamp: Utc::now().timestamp(),
            },
            content: image.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use types::media::PutMessage;

    use crate::client::testing::ScriptedClient;
    use crate::config::FetcherConfig;
    use crate::error::QueueError;
    use crate::fetcher::Fetcher;
    use crate::queue::{MediaQueue, MemoryQueue};
    use crate::storage::{MemoryStorage, Storage};

    use super::file_extension;

    const EMPTY_TICKERS_PAGE: &str = r#"{"status":"OK","count":0,"results":[]}"#;
    const EMPTY_STOCKS_PAGE: &str =
        r#"{"status":"OK","queryCount":0,"resultsCount":0,"results":[]}"#;

    fn tickers_page(ticker: &str, next_url: Option<&str>) -> String {
        let next = match next_url {
            Some(u) => format!(r#","next_url":"{u}""#),
            None => String::new(),
        };
        format!(
            r#"{{"status":"OK","count":1{next},"results":[{{"ticker":"{ticker}","name":"{ticker} Inc","locale":"us","currency_name":"usd","cik":"0001","active":true}}]}}"#
        )
    }

    fn details_page(ticker: &str, icon_url: Option<&str>) -> String {
        let branding = match icon_url {
            Some(u) => format!(r#","branding":{{"icon_url":"{u}","logo_url":""}}"#),
            None => String::new(),
        };
        format!(
            r#"{{"status":"OK","results":{{"ticker":"{ticker}","description":"","homepage_url":"https://{ticker}.test","phone_number":"","total_employees":10,"address":{{"address1":"main street","city":"seattle","state":"WA","postal_code":"98101"}}{branding}}}}}"#
        )
    }

    // `page` offsets the bar timestamps so bars on different pages carry
    // distinct composite keys
    fn stocks_page(count: u64, page: u64, next_url: Option<&str>) -> String {
        let next = match next_url {
            Some(u) => format!(r#","next_url":"{u}""#),
            None => String::new(),
        };
        let results: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"o":1.0,"c":2.0,"h":3.0,"l":0.5,"v":100.0,"t":{}}}"#,
                    1_708_041_600_000i64 + (page * 100 + i) as i64 * 86_400_000
                )
            })
            .collect();
        format!(
            r#"{{"status":"OK","queryCount":{count},"resultsCount":{count}{next},"results":[{}]}}"#,
            results.join(",")
        )
    }

    struct FailingQueue;

    #[async_trait]
    impl MediaQueue for FailingQueue {
        async fn publish(&self, _message: PutMessage) -> Result<(), QueueError> {
            Err(QueueError("queue unavailable".into()))
        }
    }

    fn fetcher_with(
        client: Arc<ScriptedClient>,
        storage: Arc<MemoryStorage>,
        queue: Arc<dyn MediaQueue>,
        config: FetcherConfig,
    ) -> Fetcher {
        let mut config = config;
        config.base_url = "https://api.test".to_string();
        Fetcher::with_client(config, client, storage, queue).unwrap()
    }

    #[tokio::test]
    async fn test_full_pass_ingests_ticker_details_and_stocks() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &tickers_page("AAPL", None),
            &details_page("AAPL", None),
            &stocks_page(2, 0, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let queue = Arc::new(MemoryQueue::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage.clone(),
            queue.clone(),
            FetcherConfig::default(),
        );

        fetcher.fetch_info().await.unwrap();

        let tickers = storage.get_tickers().await.unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].ticker_id, "AAPL");
        assert_eq!(storage.details_len().await, 1);
        assert_eq!(storage.stocks_len().await, 2);
        // tickers page, details, stocks; pagination stopped without a next_url
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_ticker_pagination_follows_embedded_cursor_until_empty_page() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &tickers_page("AAPL", Some("https://api.test/v3/reference/tickers?cursor=next1")),
            &details_page("AAPL", None),
            &stocks_page(1, 0, None),
            EMPTY_TICKERS_PAGE,
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage.clone(),
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        fetcher.fetch_tickers(None).await.unwrap();

        let urls = client.urls();
        assert_eq!(urls.len(), 4);
        assert!(urls[3].contains("cursor=next1"), "second page uses the cursor: {}", urls[3]);
    }

    #[tokio::test]
    async fn test_ticker_pagination_stops_when_next_url_has_no_cursor() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &tickers_page("AAPL", Some("https://api.test/v3/reference/tickers")),
            &details_page("AAPL", None),
            &stocks_page(1, 0, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage,
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        fetcher.fetch_tickers(None).await.unwrap();
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_each_ticker_gets_its_own_details_request() {
        let listing = r#"{"status":"OK","count":2,"results":[
            {"ticker":"AAPL","name":"AAPL Inc","locale":"us","currency_name":"usd","cik":"0001","active":true},
            {"ticker":"MSFT","name":"MSFT Inc","locale":"us","currency_name":"usd","cik":"0002","active":true}
        ]}"#;
        let client = Arc::new(ScriptedClient::sequence(vec![
            listing,
            &details_page("AAPL", None),
            &stocks_page(1, 0, None),
            &details_page("MSFT", None),
            &stocks_page(1, 1, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage.clone(),
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        fetcher.fetch_tickers(None).await.unwrap();

        let urls = client.urls();
        assert!(urls[1].contains("/tickers/AAPL"), "first details url: {}", urls[1]);
        assert!(urls[3].contains("/tickers/MSFT"), "second details url: {}", urls[3]);
        assert_eq!(storage.details_len().await, 2);
    }

    #[tokio::test]
    async fn test_stocks_pagination_follows_absolute_next_url() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &stocks_page(2, 0, Some("https://api.test/v2/aggs/page2")),
            &stocks_page(1, 1, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage.clone(),
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        fetcher.fetch_stocks("AAPL", false).await.unwrap();

        assert_eq!(storage.stocks_len().await, 3);
        let urls = client.urls();
        assert_eq!(urls[1], "https://api.test/v2/aggs/page2");
    }

    #[tokio::test]
    async fn test_empty_stocks_page_terminates_without_another_request() {
        let client = Arc::new(ScriptedClient::sequence(vec![EMPTY_STOCKS_PAGE]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage.clone(),
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        fetcher.fetch_stocks("GHOST", false).await.unwrap();
        assert_eq!(storage.stocks_len().await, 0);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_api_status_fails_the_pass() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            r#"{"status":"ERROR","count":1,"results":[]}"#,
        ]));
        let mut fetcher = fetcher_with(
            client,
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        let err = fetcher.fetch_tickers(None).await.unwrap_err();
        assert!(matches!(err, crate::error::FetchError::BadStatus(_)));
    }

    #[tokio::test]
    async fn test_branding_published_with_composed_name() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &details_page("AAPL", Some("https://cdn.test/brand/apple.png")),
            "\u{1}\u{2}\u{3}", // icon bytes
            &stocks_page(1, 0, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let queue = Arc::new(MemoryQueue::new());
        let mut fetcher = fetcher_with(
            client,
            storage.clone(),
            queue.clone(),
            FetcherConfig::default(),
        );

        fetcher.fetch_ticker_details_and_stocks("AAPL").await.unwrap();

        let published = queue.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].meta.name, "AAPL-icon.png");
        assert_eq!(published[0].meta.section, "polygon_references");
        assert_eq!(published[0].meta.from, "data-fetcher");
        assert!(!published[0].meta.overwrite);
    }

    #[tokio::test]
    async fn test_queue_failure_does_not_fail_the_pass() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &details_page("AAPL", Some("https://cdn.test/brand/apple.png")),
            "icon-bytes",
            &stocks_page(1, 0, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client,
            storage.clone(),
            Arc::new(FailingQueue),
            FetcherConfig::default(),
        );

        fetcher.fetch_ticker_details_and_stocks("AAPL").await.unwrap();

        // details and stocks persisted despite the branding failure
        assert_eq!(storage.details_len().await, 1);
        assert_eq!(storage.stocks_len().await, 1);
    }

    #[tokio::test]
    async fn test_priority_refresh_restricted_to_configured_set() {
        let storage = Arc::new(MemoryStorage::new());
        for id in ["AAPL", "MSFT", "ZZZZ"] {
            storage
                .put_ticker(crate::api::to_ticker(
                    &crate::api::TickerResult {
                        ticker: id.into(),
                        active: true,
                        ..Default::default()
                    },
                    chrono::Utc::now(),
                ))
                .await
                .unwrap();
        }

        let client = Arc::new(ScriptedClient::repeating(EMPTY_STOCKS_PAGE));
        let mut config = FetcherConfig::default();
        config.priority_tickers = vec!["AAPL".into(), "MSFT".into()];
        let mut fetcher = fetcher_with(
            client.clone(),
            storage,
            Arc::new(MemoryQueue::new()),
            config,
        );

        fetcher.fetch_stocks_for_stored_tickers().await.unwrap();
        // one bars request per priority ticker, none for ZZZZ
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_priority_refresh_noop_when_unconfigured() {
        let client = Arc::new(ScriptedClient::empty());
        let mut fetcher = fetcher_with(
            client.clone(),
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );

        fetcher.fetch_stocks_for_stored_tickers().await.unwrap();
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_details_resume_uses_restored_url_once() {
        let client = Arc::new(ScriptedClient::sequence(vec![
            &details_page("AAPL", None),
            &stocks_page(1, 0, None),
        ]));
        let storage = Arc::new(MemoryStorage::new());
        let mut fetcher = fetcher_with(
            client.clone(),
            storage,
            Arc::new(MemoryQueue::new()),
            FetcherConfig::default(),
        );
        fetcher
            .state
            .ticker_details
            .restore("https://api.test/v3/reference/tickers/AAPL?resumed=1");

        fetcher.fetch_ticker_details_and_stocks("AAPL").await.unwrap();

        let urls = client.urls();
        assert_eq!(urls[0], "https://api.test/v3/reference/tickers/AAPL?resumed=1");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(
            file_extension("https://cdn.test/a/b/logo.svg").as_deref(),
            Some("svg")
        );
        assert!(file_extension("https://cdn.test/a/b/noext").is_none());
    }
}
