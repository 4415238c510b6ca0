//! Upstream market-data API wire model
//!
//! Endpoint URL builders, serde DTOs for the three paginated endpoints
//! (ticker list, ticker details, aggregate bars), and the mapping from wire
//! payloads to domain entities. Optional string fields are defaulted to a
//! sentinel so storage and downstream consumers share one "absent"
//! representation.

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::Deserialize;
use types::stock::Stock;
use types::ticker::{Ticker, TickerDetails};

use crate::error::FetchError;

/// Status value every endpoint must report; anything else is fatal for the
/// current call.
pub const RESP_STATUS_OK: &str = "OK";

/// Query parameter carrying the opaque next-page cursor on the ticker-list
/// endpoint.
pub const CURSOR_KEY: &str = "cursor";

/// Sentinel stored in place of fields the upstream omits.
pub const DEFAULT_FIELD: &str = "-";

const TICKERS_PATH: &str = "/v3/reference/tickers";
const AGGS_MULTIPLIER: u32 = 1;
const AGGS_TIMESPAN: &str = "day";

// ── URL builders ────────────────────────────────────────────────────

/// Query parameters of the ticker-list endpoint. `active=true` and ascending
/// order are always requested.
#[derive(Debug, Clone, Default)]
pub struct TickersQuery {
    pub ticker: Option<String>,
    pub cursor: Option<String>,
}

impl TickersQuery {
    pub fn new(ticker: Option<&str>) -> Self {
        Self {
            ticker: ticker.map(str::to_string),
            cursor: None,
        }
    }
}

/// Endpoint URL builders over a validated base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self, FetchError> {
        let base = Url::parse(base).map_err(|err| FetchError::InvalidBaseUrl(err.to_string()))?;
        Ok(Self { base })
    }

    /// `GET /v3/reference/tickers?active=true&order=asc[&ticker=][&cursor=]`
    pub fn tickers(&self, query: &TickersQuery) -> String {
        let mut url = self.base.clone();
        url.set_path(TICKERS_PATH);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("active", "true");
            pairs.append_pair("order", "asc");
            if let Some(ticker) = &query.ticker {
                pairs.append_pair("ticker", ticker);
            }
            if let Some(cursor) = &query.cursor {
                pairs.append_pair(CURSOR_KEY, cursor);
            }
        }
        url.to_string()
    }

    /// `GET /v3/reference/tickers/{ticker}`
    pub fn ticker_details(&self, ticker_id: &str) -> String {
        let mut url = self.base.clone();
        url.set_path(&format!("{}/{}", TICKERS_PATH, ticker_id));
        url.to_string()
    }

    /// `GET /v2/aggs/ticker/{ticker}/range/1/day/{from}/{to}` with a
    /// day-granularity range covering `window_hours` back from `now`.
    pub fn stocks(&self, ticker_id: &str, window_hours: i64, now: DateTime<Utc>) -> String {
        let from = (now - Duration::hours(window_hours)).format("%Y-%m-%d");
        let to = now.format("%Y-%m-%d");
        let mut url = self.base.clone();
        url.set_path(&format!(
            "/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            ticker_id, AGGS_MULTIPLIER, AGGS_TIMESPAN, from, to
        ));
        url.to_string()
    }
}

/// Extract the opaque cursor token from a provider next-page URL.
///
/// A missing or empty token means pagination is exhausted; an unparseable
/// URL is a malformed response.
pub fn cursor_from_next_url(next_url: &str) -> Result<Option<String>, FetchError> {
    let url = Url::parse(next_url)
        .map_err(|_| FetchError::Malformed(format!("cannot parse cursor url: {next_url}")))?;
    let cursor = url
        .query_pairs()
        .find(|(key, _)| key == CURSOR_KEY)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());
    Ok(cursor)
}

// ── Wire DTOs ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TickersResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub results: Vec<TickerResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerResult {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub currency_name: String,
    #[serde(default)]
    pub cik: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub last_updated_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerDetailsResponse {
    #[serde(default)]
    pub status: String,
    pub results: Option<TickerDetailsResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerDetailsResult {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage_url: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub total_employees: i64,
    pub address: Option<TickerAddress>,
    pub branding: Option<TickerBranding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerAddress {
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerBranding {
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub logo_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StocksResponse {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "queryCount", default)]
    pub query_count: u64,
    #[serde(rename = "resultsCount", default)]
    pub count: u64,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub results: Vec<StockResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockResult {
    #[serde(rename = "o", default)]
    pub open: f64,
    #[serde(rename = "c", default)]
    pub close: f64,
    #[serde(rename = "h", default)]
    pub highest: f64,
    #[serde(rename = "l", default)]
    pub lowest: f64,
    #[serde(rename = "v", default)]
    pub volume: f64,
    #[serde(rename = "t", default)]
    pub timestamp_ms: i64,
}

// ── Mapping to domain entities ──────────────────────────────────────

fn or_sentinel(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        DEFAULT_FIELD.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Title-case a free-form field ("new york" -> "New York"), keeping the
/// sentinel untouched.
fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn to_ticker(result: &TickerResult, now: DateTime<Utc>) -> Ticker {
    Ticker {
        ticker_id: or_sentinel(&result.ticker),
        company_name: or_sentinel(&result.name),
        company_locale: or_sentinel(&result.locale),
        currency_name: or_sentinel(&result.currency_name),
        ticker_cik: or_sentinel(&result.cik),
        active: result.active,
        created_at: now,
        external_updated_at: result.last_updated_utc.unwrap_or(now),
    }
}

pub fn to_ticker_details(result: &TickerDetailsResult, now: DateTime<Utc>) -> TickerDetails {
    let address = result.address.clone().unwrap_or_default();
    TickerDetails {
        ticker_id: or_sentinel(&result.ticker),
        company_description: or_sentinel(&result.description),
        homepage_url: or_sentinel(&result.homepage_url),
        phone_number: or_sentinel(&result.phone_number),
        total_employees: result.total_employees,
        company_state: or_sentinel(&address.state),
        company_city: or_sentinel(&title_case(&address.city)),
        company_address: or_sentinel(&title_case(&address.address1)),
        company_postal_code: or_sentinel(&address.postal_code),
        created_at: now,
    }
}

pub fn to_stock(ticker_id: &str, result: &StockResult, now: DateTime<Utc>) -> Stock {
    Stock {
        stock_id: Stock::compose_id(ticker_id, result.timestamp_ms),
        ticker_id: ticker_id.to_string(),
        open_price: result.open,
        close_price: result.close,
        highest_price: result.highest,
        lowest_price: result.lowest,
        trading_volume: result.volume,
        stocked_at: DateTime::<Utc>::from_timestamp_millis(result.timestamp_ms).unwrap_or(now),
        created_at: now,
    }
}
