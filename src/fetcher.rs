//! Session-based HTTP fetching with identity rotation and jittered retries.
//!
//! # Retry Strategy
//!
//! - Up to `max_attempts` tries (default 3)
//! - A fresh identity header on every attempt, the first included
//! - Before each retry: `base_delay * (1 + random[0, 1))`
//! - The last failure is returned as-is, without a trailing sleep
//!
//! Cookies set by the server persist across calls on the same fetcher.

use crate::config::HttpConfig;
use crate::error::{FetchError, ScrapeError};
use crate::identity::UserAgentSource;
use rand::{Rng, rng};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Delay policy between attempts.
pub trait Backoff: fmt::Debug + Send + Sync {
    /// Delay before retry number `retry` (1 for the first retry).
    fn delay(&self, retry: u32) -> Duration;
}

/// `base * (1 + U[0, 1))`, desynchronizing retries from rate-limit windows.
#[derive(Debug, Clone, Copy)]
pub struct JitteredBackoff {
    pub base: Duration,
}

impl Backoff for JitteredBackoff {
    fn delay(&self, _retry: u32) -> Duration {
        let factor: f64 = 1.0 + rng().random::<f64>();
        self.base.mul_f64(factor)
    }
}

/// No waiting at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Backoff for NoDelay {
    fn delay(&self, _retry: u32) -> Duration {
        Duration::ZERO
    }
}

/// A fetched page body.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// HTTP client used for plain page fetches.
pub struct HttpFetcher {
    client: reqwest::Client,
    identities: UserAgentSource,
    max_attempts: u32,
    timeout: Duration,
    backoff: Box<dyn Backoff>,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig, identities: UserAgentSource) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("es-ES,es;q=0.9,en;q=0.6"));

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ScrapeError::Config(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            identities,
            max_attempts: config.max_attempts.max(1),
            timeout: config.timeout(),
            backoff: Box::new(JitteredBackoff {
                base: config.base_delay(),
            }),
        })
    }

    /// Replace the delay policy, e.g. with [`NoDelay`] in tests.
    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// Fetch with the configured timeout.
    pub async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.fetch(url, self.timeout).await
    }

    /// Fetch `url`, retrying transport errors and non-2xx/3xx statuses.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let identity = self.identities.random_identity();
            debug!(attempt, identity = %identity, "Fetching");

            let outcome = self
                .client
                .get(url)
                .header(USER_AGENT, identity)
                .timeout(timeout)
                .send()
                .await;

            let failure = match outcome {
                Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                    let status = resp.status().as_u16();
                    let final_url = resp.url().to_string();
                    let body = resp.text().await.map_err(|source| FetchError::Body {
                        url: url.to_string(),
                        source,
                    })?;
                    debug!(status, bytes = body.len(), "Fetched page");
                    return Ok(FetchedPage {
                        final_url,
                        status,
                        body,
                    });
                }
                Ok(resp) => FetchError::Status {
                    url: url.to_string(),
                    status: resp.status().as_u16(),
                    attempts: attempt,
                },
                Err(source) => FetchError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    source,
                },
            };

            if attempt >= self.max_attempts {
                error!(
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %failure,
                    "fetch exhausted retries"
                );
                return Err(failure);
            }

            let delay = self.backoff.delay(attempt);
            warn!(
                attempt,
                max = self.max_attempts,
                ?delay,
                error = %failure,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}
