//! HTTP access with exponential backoff retry logic.
//!
//! Every provider call goes through the [`Fetch`] trait so that sources can be
//! tested against a scripted fetcher and so that retry behavior lives in one
//! decorator instead of in each scraper.
//!
//! # Architecture
//!
//! - [`Fetch`]: Core trait, one GET returning the response body as text
//! - [`ReqwestFetcher`]: The real client, one `reqwest::Client` per run
//! - [`Retrying`]: Decorator that adds retry logic to any `Fetch` implementation
//! - [`HttpClient`]: The retrying reqwest client built once in `main`
//!
//! # Retry Strategy
//!
//! Driven by an explicit [`RetryPolicy`] value:
//! - 2 retries after the first attempt
//! - Exponential backoff starting at 300 ms, capped at 5 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - Only transient failures (429, 5xx gateway errors, network) are retried

use crate::utils::truncate_for_log;
use rand::{rng, Rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// User-Agent sent with every request.
pub const USER_AGENT: &str = "job-reporter/1.1";

/// Maximum number of response-body bytes kept in a [`FetchError::Status`].
pub const ERROR_BODY_LIMIT: usize = 300;

/// HTTP statuses worth retrying.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Failure of a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response. `body` is truncated to [`ERROR_BODY_LIMIT`] bytes.
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// Connection failure, timeout, or an interrupted body.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    pub fn status(url: &str, status: u16, body: &str) -> Self {
        FetchError::Status {
            status,
            url: url.to_string(),
            body: truncate_for_log(body, ERROR_BODY_LIMIT),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            FetchError::Network { .. } => true,
            FetchError::Decode { .. } | FetchError::InvalidUrl { .. } => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A GET request: the full URL (query included) and a per-source timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub timeout: StdDuration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    /// Build a request from a base URL plus encoded query parameters.
    pub fn with_query<I, K, V>(base: &str, params: I, timeout: StdDuration) -> Result<Self, FetchError>
    where
        I: IntoIterator,
        I::Item: std::borrow::Borrow<(K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = Url::parse_with_params(base, params).map_err(|source| FetchError::InvalidUrl {
            url: base.to_string(),
            source,
        })?;
        Ok(Self::get(url.to_string(), timeout))
    }
}

/// Trait for a single async HTTP GET.
///
/// Implementors return the response body for a 2xx response and a
/// [`FetchError`] otherwise. This abstraction allows decorators (like retry
/// logic) and in-memory fetchers for tests.
pub trait Fetch {
    async fn fetch(&self, req: &HttpRequest) -> Result<String, FetchError>;

    /// Fetch and decode a JSON body.
    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        req: &HttpRequest,
    ) -> Result<T, FetchError> {
        let body = self.fetch(req).await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: req.url.clone(),
            source,
        })
    }
}

/// Backoff parameters for [`Retrying`].
///
/// The delay before retry `n` (1-based) is:
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=jitter_ms)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: StdDuration,
    pub max_delay: StdDuration,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: StdDuration::from_millis(300),
            max_delay: StdDuration::from_secs(5),
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift);
        delay.min(self.max_delay)
    }

    fn jitter(&self) -> StdDuration {
        if self.jitter_ms == 0 {
            return StdDuration::ZERO;
        }
        StdDuration::from_millis(rng().random_range(0..=self.jitter_ms))
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// Non-retryable errors (4xx other than 429, decode failures) are returned
/// on the first attempt.
pub struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Fetch> Retrying<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for Retrying<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("max_retries", &self.policy.max_retries)
            .field("base_delay", &self.policy.base_delay)
            .field("max_delay", &self.policy.max_delay)
            .finish()
    }
}

impl<T: Fetch> Fetch for Retrying<T> {
    #[instrument(level = "debug", skip_all, fields(url = %req.url))]
    async fn fetch(&self, req: &HttpRequest) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch(req).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() {
                        return Err(e);
                    }

                    if attempt > self.policy.max_retries {
                        error!(
                            attempt,
                            max = self.policy.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.backoff(attempt) + self.policy.jitter();
                    warn!(
                        attempt,
                        max = self.policy.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The real HTTP client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl Fetch for ReqwestFetcher {
    async fn fetch(&self, req: &HttpRequest) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let network = |e: reqwest::Error| FetchError::Network {
            url: req.url.clone(),
            message: e.to_string(),
        };

        let resp = self
            .client
            .get(&req.url)
            .timeout(req.timeout)
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "GET complete"
        );

        if status.is_success() {
            Ok(body)
        } else {
            Err(FetchError::status(&req.url, status.as_u16(), &body))
        }
    }
}

/// Retrying reqwest client constructed once per run and passed by reference.
pub type HttpClient = Retrying<ReqwestFetcher>;

/// Build the run's [`HttpClient`].
pub fn http_client(policy: RetryPolicy) -> Result<HttpClient, reqwest::Error> {
    Ok(Retrying::new(ReqwestFetcher::new()?, policy))
}
