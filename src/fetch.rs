//! Paginated, rate-limited access to the OpenFoodFacts search API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{Instant, sleep, sleep_until};

use crate::error::{FatalFetchError, TransientFetchError};
use crate::extract::RawRecord;

pub const DEFAULT_SEARCH_URL: &str = "https://world.openfoodfacts.org/cgi/search.pl";
pub const DEFAULT_PAGE_SIZE: u32 = 250;
/// 100 requests per minute.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(600);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub has_next: bool,
    /// Total number of matches reported upstream, if any.
    pub total_count: Option<u64>,
}

/// Source of search result pages. Transient failures are handled inside;
/// an `Err` means the run cannot continue.
#[async_trait]
pub trait PageSource: Send {
    async fn fetch_page(&mut self, search_terms: &str, page: u32) -> Result<Page, FatalFetchError>;
}

#[async_trait]
impl<P: PageSource + ?Sized> PageSource for &mut P {
    async fn fetch_page(&mut self, search_terms: &str, page: u32) -> Result<Page, FatalFetchError> {
        (**self).fetch_page(search_terms, page).await
    }
}

/// Minimum spacing between the starts of consecutive requests.
///
/// Owned by one fetcher for the duration of one run.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Wait until a request may be sent, then record it as sent.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_request {
            let ready_at = last + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                log::debug!(
                    "Waiting {:?} before next request (rate limit compliance)",
                    ready_at - now
                );
                sleep_until(ready_at).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based): base * 2^attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub search_url: String,
    pub user_agent: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub rate_limit: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: format!("food-ingest/{}", env!("CARGO_PKG_VERSION")),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rate_limit: DEFAULT_RATE_LIMIT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a single HTTP attempt.
#[derive(Debug)]
enum AttemptError {
    Transient(TransientFetchError),
    Fatal(FatalFetchError),
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    count: Option<Value>,
    #[serde(default)]
    page_size: Option<Value>,
    products: Vec<RawRecord>,
}

/// Search client for OpenFoodFacts.
pub struct OffClient {
    http: reqwest::Client,
    config: FetchConfig,
    limiter: RateLimiter,
}

impl OffClient {
    pub fn new(config: FetchConfig, limiter: RateLimiter) -> Result<Self, FatalFetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FatalFetchError::Client(e.to_string()))?;

        Ok(Self {
            http,
            config,
            limiter,
        })
    }

    async fn fetch_once(&mut self, search_terms: &str, page: u32) -> Result<Page, AttemptError> {
        self.limiter.acquire().await;

        let response = self
            .http
            .get(&self.config.search_url)
            .query(&[
                ("search_terms", search_terms),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
            ])
            .query(&[("page", page), ("page_size", self.config.page_size)])
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(AttemptError::Transient(TransientFetchError::Status(status.as_u16())));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(FatalFetchError::Status(status.as_u16())));
        }

        let body = response.bytes().await.map_err(classify_reqwest_error)?;
        let envelope: SearchEnvelope = serde_json::from_slice(&body)
            .map_err(|e| AttemptError::Fatal(FatalFetchError::Malformed(e.to_string())))?;

        Ok(envelope.into_page(page, self.config.page_size))
    }
}

#[async_trait]
impl PageSource for OffClient {
    async fn fetch_page(&mut self, search_terms: &str, page: u32) -> Result<Page, FatalFetchError> {
        let retry = self.config.retry;
        let max_attempts = retry.max_attempts();
        let mut attempt = 0;

        loop {
            match self.fetch_once(search_terms, page).await {
                Ok(result) => {
                    log::debug!(
                        "Page {}: retrieved {} products (has_next: {})",
                        page,
                        result.records.len(),
                        result.has_next
                    );
                    return Ok(result);
                }
                Err(AttemptError::Fatal(e)) => {
                    log::error!("Page {} failed without retry: {}", page, e);
                    return Err(e);
                }
                Err(AttemptError::Transient(e)) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        log::error!("Page {} failed after {} attempts: {}", page, attempt, e);
                        return Err(FatalFetchError::RetriesExhausted {
                            attempts: attempt,
                            last: e,
                        });
                    }

                    let delay = retry.backoff(attempt - 1);
                    log::warn!(
                        "Request for page {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        page,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl SearchEnvelope {
    fn into_page(self, page: u32, requested_page_size: u32) -> Page {
        let total_count = self.count.as_ref().and_then(lenient_u64);
        let page_size = self
            .page_size
            .as_ref()
            .and_then(lenient_u64)
            .filter(|&size| size > 0)
            .unwrap_or(u64::from(requested_page_size));

        let has_next = if self.products.is_empty() {
            false
        } else if let Some(count) = total_count {
            u64::from(page)
                .checked_mul(page_size)
                .is_some_and(|seen| seen < count)
        } else {
            self.products.len() as u64 >= page_size
        };

        Page {
            records: self.products,
            has_next,
            total_count,
        }
    }
}

/// Upstream sends counts as numbers or numeric strings.
fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> AttemptError {
    if e.is_builder() {
        AttemptError::Fatal(FatalFetchError::Client(e.to_string()))
    } else if e.is_timeout() {
        AttemptError::Transient(TransientFetchError::Timeout)
    } else {
        AttemptError::Transient(TransientFetchError::Network(e.to_string()))
    }
}
