//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the archiver, including:
//! - Building HTTP clients with proper user agent strings
//! - Resolving forum paths against the site base
//! - Retry with fixed or linear backoff on transient failures
//! - Pacing requests across all workers
//! - Abandoning requests and waits on cancellation

use crate::config::{Backoff, FetcherConfig, UserAgentConfig};
use crate::site::SiteBase;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

/// A page could not be fetched
///
/// Fetch errors end the affected traversal unit only; they are never
/// retried further up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{url}: gave up after {attempts} attempts ({last_error})")]
    Exhausted {
        url: String,
        /// Status of the last response, if the last attempt got one
        last_status: Option<u16>,
        last_error: String,
        attempts: u32,
    },

    #[error("{url}: cancelled")]
    Cancelled { url: String },

    #[error("{path}: cannot build a URL: {reason}")]
    InvalidUrl { path: String, reason: String },
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use forum_archiver::config::UserAgentConfig;
/// use forum_archiver::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     name: "ForumArchiver".to_string(),
///     version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL)
    let user_agent = format!("{}/{} (+{})", config.name, config.version, config.contact_url);

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

struct AttemptFailure {
    status: Option<u16>,
    message: String,
}

/// Fetches forum pages with bounded retry
///
/// One fetcher is shared by all workers of a run; the pacing interval
/// applies across all of them.
pub struct Fetcher {
    client: Client,
    site: SiteBase,
    max_attempts: u32,
    retry_wait: Duration,
    backoff: Backoff,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Fetcher {
    pub fn new(
        site: SiteBase,
        config: &FetcherConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            client,
            site,
            max_attempts: config.max_attempts.max(1),
            retry_wait: Duration::from_millis(config.retry_wait_ms),
            backoff: config.backoff,
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    pub fn site(&self) -> &SiteBase {
        &self.site
    }

    /// Fetches the page at `path` (relative to the site base)
    ///
    /// Non-2xx responses and network errors are retried until
    /// `max_attempts` attempts have been made. Cancellation abandons the
    /// in-flight request or backoff wait immediately.
    pub async fn fetch(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
        let url = self.site.resolve(path).map_err(|e| FetchError::InvalidUrl {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let cancelled = || FetchError::Cancelled {
            url: url.to_string(),
        };

        let mut last_failure = AttemptFailure {
            status: None,
            message: String::new(),
        };

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let wait = self.delay_before_retry(attempt - 1);
                debug!(url = %url, attempt, wait_ms = wait.as_millis() as u64, "Waiting before retry");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = sleep(wait) => {}
                }
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                outcome = self.attempt(&url) => outcome,
            };

            match outcome {
                Ok(body) => {
                    trace!(
                        url = %url,
                        attempt,
                        max_attempts = self.max_attempts,
                        bytes = body.len(),
                        "Fetch attempt succeeded"
                    );
                    return Ok(body);
                }
                Err(failure) => {
                    debug!(
                        url = %url,
                        attempt,
                        max_attempts = self.max_attempts,
                        status = failure.status,
                        error = %failure.message,
                        "Fetch attempt failed"
                    );
                    last_failure = failure;
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            last_status: last_failure.status,
            last_error: last_failure.message,
            attempts: self.max_attempts,
        })
    }

    async fn attempt(&self, url: &Url) -> Result<Vec<u8>, AttemptFailure> {
        self.pace().await;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AttemptFailure {
                status: None,
                message: describe_network_error(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.bytes().await.map_err(|e| AttemptFailure {
            status: Some(status.as_u16()),
            message: describe_network_error(&e),
        })?;

        Ok(body.to_vec())
    }

    /// Wait after `failures` failed attempts
    fn delay_before_retry(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_wait,
            Backoff::Linear => self.retry_wait.saturating_mul(failures),
        }
    }

    /// Holds the caller until `min_interval` has passed since the previous
    /// request start
    async fn pace(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            sleep_until(previous + self.min_interval).await;
        }
        *last = Some(Instant::now());
    }
}

fn describe_network_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection failed".to_string()
    } else {
        error.to_string()
    }
}
