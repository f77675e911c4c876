//! Page fetcher implementation
//!
//! This module issues logical page requests for the crawler, including:
//! - Pacing every attempt through the shared rate limiter
//! - Retrying retryable transport failures up to a configured budget
//! - Decoding pages and tracking the cursor position within a query stream
//! - Detecting when the platform has truncated a result set at its cap
//! - Cheap count probes used by the window partitioner
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 429 | Back off the limiter (honouring Retry-After), retry |
//! | HTTP 5xx | Back off the limiter, retry |
//! | Timeout / connection failure | Back off the limiter, retry |
//! | Other HTTP status | Fail immediately |
//! | Malformed page | Fail immediately (ParseError) |
//! | Cancellation | Stop before the next attempt |

use crate::config::CrawlerConfig;
use crate::crawler::parser::parse_connection_page;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::transport::{PageRequest, Transport};
use crate::model::{Query, Record};
use crate::{FetchError, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Position within one query's result stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Opaque token handed back by the platform
    pub token: String,
    /// Records already returned before this position
    pub offset: u64,
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub records: Vec<Record>,
    /// None once the query is exhausted
    pub next_cursor: Option<Cursor>,
    /// The platform stopped returning results at its cap
    pub hit_platform_cap: bool,
    pub total_count: Option<u64>,
}

/// Outcome of probing a query's size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub hit_platform_cap: bool,
    pub estimated_count: Option<u64>,
}

/// Anything that can tell whether a query overruns the platform cap
#[async_trait]
pub trait CountProbe: Send + Sync {
    async fn probe(&self, query: &Query) -> Result<ProbeResult, FetchError>;
}

/// Tunables for the fetcher, derived from the crawler configuration
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub page_size: u32,
    pub probe_page_size: u32,
    pub platform_cap: u64,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub connection_field: String,
}

impl FetchSettings {
    pub fn from_config(config: &CrawlerConfig, connection_field: &str) -> Self {
        Self {
            page_size: config.page_size,
            probe_page_size: config.effective_probe_page_size(),
            platform_cap: config.platform_cap_threshold,
            max_retries: config.max_retries,
            request_timeout: config.request_timeout(),
            connection_field: connection_field.to_string(),
        }
    }
}

/// Fetches pages through a transport, one rate-limiter slot per attempt
pub struct PageFetcher<T> {
    transport: T,
    limiter: Arc<RateLimiter>,
    settings: FetchSettings,
    cancel: CancellationToken,
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(
        transport: T,
        limiter: Arc<RateLimiter>,
        settings: FetchSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            limiter,
            settings,
            cancel,
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches one page of `query`
    ///
    /// # Arguments
    ///
    /// * `query` - The logical query, possibly windowed
    /// * `cursor` - Position to continue from; None for the first page
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - Records plus the next cursor and cap signal
    /// * `Err(FetchError)` - Retry budget exhausted, malformed page, or cancelled
    pub async fn fetch(
        &self,
        query: &Query,
        cursor: Option<&Cursor>,
    ) -> Result<FetchedPage, FetchError> {
        self.fetch_sized(query, cursor, self.settings.page_size).await
    }

    async fn fetch_sized(
        &self,
        query: &Query,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> Result<FetchedPage, FetchError> {
        let request = PageRequest {
            query: query.clone(),
            after: cursor.map(|c| c.token.clone()),
            first: page_size,
        };

        let body = self.send_with_retry(&request).await?;
        let raw = parse_connection_page(&body, &self.settings.connection_field)?;

        let offset = cursor.map_or(0, |c| c.offset);
        let returned = offset + raw.records.len() as u64;

        let next_cursor = match (raw.has_next_page, raw.end_cursor) {
            (true, Some(token)) => {
                if cursor.map_or(false, |c| c.token == token) {
                    return Err(FetchError::Parse(format!(
                        "cursor did not advance past '{}'",
                        token
                    )));
                }
                Some(Cursor {
                    token,
                    offset: returned,
                })
            }
            _ => None,
        };

        let cap = self.settings.platform_cap;
        let hit_platform_cap = raw.total_count.map_or(false, |total| total >= cap)
            || (next_cursor.is_none() && returned >= cap);

        tracing::trace!(
            "Fetched {} records for {} at offset {} (next: {}, capped: {})",
            raw.records.len(),
            query,
            offset,
            next_cursor.is_some(),
            hit_platform_cap
        );

        Ok(FetchedPage {
            records: raw.records,
            next_cursor,
            hit_platform_cap,
            total_count: raw.total_count,
        })
    }

    async fn send_with_retry(&self, request: &PageRequest) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = self.limiter.acquire() => {}
            }

            let result =
                match tokio::time::timeout(self.settings.request_timeout, self.transport.send(request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout),
                };

            let error = match result {
                Ok(body) => {
                    self.limiter.record_success().await;
                    return Ok(body);
                }
                Err(error) => error,
            };

            match &error {
                TransportError::RateLimited { retry_after } => {
                    self.limiter.penalize(*retry_after).await;
                }
                other if other.is_retryable() => {
                    self.limiter.penalize(None).await;
                }
                _ => {}
            }

            if !error.is_retryable() || attempt > self.settings.max_retries {
                return Err(FetchError::Transport {
                    attempts: attempt,
                    source: error,
                });
            }

            tracing::warn!(
                "Request for {} failed (attempt {}/{}): {}",
                request.query,
                attempt,
                self.settings.max_retries + 1,
                error
            );
        }
    }

    /// Determines whether `query` overruns the platform cap
    ///
    /// If the first page reports a total count, that single page decides.
    /// Otherwise the stream is walked with probe-sized pages until it ends or
    /// reaches the cap.
    pub async fn probe(&self, query: &Query) -> Result<ProbeResult, FetchError> {
        let page_size = self.settings.probe_page_size;
        let mut page = self.fetch_sized(query, None, page_size).await?;

        if let Some(total) = page.total_count {
            return Ok(ProbeResult {
                hit_platform_cap: page.hit_platform_cap,
                estimated_count: Some(total),
            });
        }

        let mut seen = page.records.len() as u64;
        while !page.hit_platform_cap {
            let Some(cursor) = page.next_cursor.take() else {
                break;
            };
            page = self.fetch_sized(query, Some(&cursor), page_size).await?;
            seen = cursor.offset + page.records.len() as u64;
        }

        Ok(ProbeResult {
            hit_platform_cap: page.hit_platform_cap,
            estimated_count: Some(seen),
        })
    }
}

#[async_trait]
impl<T: Transport> CountProbe for PageFetcher<T> {
    async fn probe(&self, query: &Query) -> Result<ProbeResult, FetchError> {
        PageFetcher::probe(self, query).await
    }
}
