//! Rate-limited HTTP client
//!
//! Wraps outbound calls to the upstream market-data API with a token-bucket
//! limiter and a hard per-acquire deadline. Every call auto-injects the API
//! credential configured at construction. Responses are classified into
//! retryable (transport, 5xx, limiter deadline) and fatal-for-this-call
//! (4xx) failures; `with_retry` re-issues the retryable class only.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::ClientError;

// ── Token bucket ────────────────────────────────────────────────────

#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    tokens: f64,
    refill_rate: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, per: Duration) -> Self {
        let refill_rate = if per.as_secs_f64() > 0.0 {
            capacity as f64 / per.as_secs_f64()
        } else {
            capacity as f64
        };
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = f64::min(self.capacity as f64, self.tokens + elapsed * self.refill_rate);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token bucket tuning: `reqs_count` permits per `per`, with `wait` between
/// acquire attempts and an absolute acquire `deadline`.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub reqs_count: u32,
    pub per: Duration,
    pub wait: Duration,
    pub deadline: Duration,
}

/// Blocking token-bucket limiter for outbound API calls.
///
/// The upstream rate limit is global, so a single bucket serializes all
/// callers; the fetch loop is single-task anyway.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    config: LimiterConfig,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(config.reqs_count, config.per)),
            config,
        }
    }

    /// Acquire one permit, sleeping between attempts until the configured
    /// deadline elapses.
    pub async fn acquire(&self) -> Result<(), ClientError> {
        let deadline = Instant::now() + self.config.deadline;
        loop {
            if self.bucket.lock().await.try_acquire() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::DeadlineExceeded(self.config.deadline));
            }
            debug!(
                reqs_count = self.config.reqs_count,
                per = ?self.config.per,
                until_deadline = ?(deadline - now),
                "request limit reached; sleeping before next acquire attempt"
            );
            sleep(self.config.wait.min(deadline - now)).await;
        }
    }
}

// ── Retry wrapper ───────────────────────────────────────────────────

/// Fixed-count, fixed-sleep retry policy for a single logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub count: u32,
    pub wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            count: 5,
            wait: Duration::from_secs(3),
        }
    }
}

/// Re-issue `call` up to `policy.count` times. Only retryable errors are
/// re-issued; a fatal classification is returned immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.count.max(1) => {
                warn!(attempt, error = %err, "request attempt failed");
                sleep(policy.wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

// ── HTTP client ─────────────────────────────────────────────────────

/// Response body plus the headers and status code the caller may inspect.
#[derive(Debug, Clone)]
pub struct FullResponse {
    pub content: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub status: u16,
}

/// Capability interface for outbound HTTP, so the pipeline can be exercised
/// against fakes.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ClientError>;
    async fn get_full(&self, url: &str) -> Result<FullResponse, ClientError>;
    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<Vec<u8>, ClientError>;
}

/// How the API credential rides on each request.
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// Credential as a query parameter, e.g. `?apiKey=...`
    QueryToken { key: String, value: String },
    /// Credential as a request header
    Header { name: String, value: String },
}

/// Production `HttpClient` backed by reqwest, with limiter, credential
/// injection, per-call timeout, and per-request retries.
pub struct RateLimitedClient {
    http: reqwest::Client,
    auth: ApiAuth,
    limiter: Option<RateLimiter>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl RateLimitedClient {
    pub fn new(auth: ApiAuth) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth,
            limiter: None,
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_limiter(mut self, config: LimiterConfig) -> Self {
        self.limiter = Some(RateLimiter::new(config));
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            ApiAuth::QueryToken { key, value } => request.query(&[(key.as_str(), value.as_str())]),
            ApiAuth::Header { name, value } => request.header(name.as_str(), value.as_str()),
        }
    }

    async fn send_once(&self, request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await?;
        }
        let response = request
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        let code = response.status().as_u16();
        if code >= 400 {
            return Err(ClientError::Status { code });
        }
        Ok(response)
    }

    async fn get_once(&self, url: &str) -> Result<reqwest::Response, ClientError> {
        let request = self
            .apply_auth(self.http.get(url))
            .timeout(self.call_timeout);
        self.send_once(request).await
    }

    async fn post_once(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::Response, ClientError> {
        let request = self
            .apply_auth(self.http.post(url).json(payload))
            .timeout(self.call_timeout);
        self.send_once(request).await
    }
}

#[async_trait]
impl HttpClient for RateLimitedClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        Ok(self.get_full(url).await?.content)
    }

    async fn get_full(&self, url: &str) -> Result<FullResponse, ClientError> {
        let response = with_retry(&self.retry, || self.get_once(url)).await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let content = response
            .bytes()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?
            .to_vec();

        Ok(FullResponse {
            content,
            headers,
            status,
        })
    }

    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<Vec<u8>, ClientError> {
        let response = with_retry(&self.retry, || self.post_once(url, payload)).await?;
        let content = response
            .bytes()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?
            .to_vec();
        Ok(content)
    }
}
