//! Ticker and company metadata types
//!
//! A `Ticker` carries the static listing metadata returned by the upstream
//! market-data provider; `TickerDetails` carries the richer company profile
//! fetched per ticker. String fields that the provider may omit are filled
//! with a sentinel value by the ingestion layer, never left empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tradable instrument's identifier plus static company metadata.
///
/// Upserted by ticker identifier on every successful ticker-list page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// External ticker identifier, e.g. "AAPL"
    pub ticker_id: String,
    pub company_name: String,
    pub company_locale: String,
    pub currency_name: String,
    /// SEC CIK code
    pub ticker_cik: String,
    pub active: bool,
    /// When this record was created locally
    pub created_at: DateTime<Utc>,
    /// Last update reported by the upstream provider
    pub external_updated_at: DateTime<Utc>,
}

/// Company profile for a single ticker.
///
/// Created once details have been fetched; upserted by ticker identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker_id: String,
    pub company_description: String,
    pub homepage_url: String,
    pub phone_number: String,
    pub total_employees: i64,
    pub company_state: String,
    pub company_city: String,
    pub company_address: String,
    pub company_postal_code: String,
    pub created_at: DateTime<Utc>,
}
