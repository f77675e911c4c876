//! Crawler module for draining the gallery API
//!
//! This module contains the core crawling logic, including:
//! - Request pacing with adaptive backoff
//! - The GraphQL transport and page decoding
//! - Page fetching with retries and platform-cap detection
//! - Time-window partitioning of capped queries
//! - Overall crawl orchestration

mod coordinator;
mod fetcher;
mod parser;
mod partitioner;
mod rate_limiter;
mod transport;

pub use coordinator::CrawlOrchestrator;
pub use fetcher::{CountProbe, Cursor, FetchSettings, FetchedPage, PageFetcher, ProbeResult};
pub use parser::{parse_connection_page, RawPage};
pub use partitioner::WindowPartitioner;
pub use rate_limiter::{BackoffPolicy, RateLimiter};
pub use transport::{
    build_http_client, build_variables, format_api_time, list_document, HttpTransport, PageRequest,
    Transport, LIST_OPERATION,
};

use crate::config::Config;
use crate::output::{CrawlReport, JsonSink};
use crate::SweepError;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Resolve the configured query against the current time
/// 2. Open the records file and checkpoint (discarding both when `fresh`)
/// 3. Build the HTTP transport
/// 4. Partition, drain and checkpoint until done or `shutdown` fires
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `fresh` - Ignore and discard any previous crawl state
/// * `shutdown` - Cancelling this token interrupts the crawl
///
/// # Returns
///
/// * `Ok(CrawlReport)` - The crawl finished, was interrupted, or aborted
/// * `Err(SweepError)` - The crawl could not start or could not persist its output
pub async fn run_crawl(
    config: &Config,
    fresh: bool,
    shutdown: CancellationToken,
) -> Result<CrawlReport, SweepError> {
    let query = config.query.to_query(Utc::now())?;
    let sink = JsonSink::from_config(&config.output, fresh)?;
    let transport = HttpTransport::new(&config.api, config.crawler.request_timeout())?;
    tracing::debug!("Sending requests to {}", transport.endpoint());

    let mut orchestrator = CrawlOrchestrator::new(
        query,
        &config.crawler,
        &config.api.connection_field,
        transport,
        sink,
    );

    let token = orchestrator.cancellation_token();
    let forward = tokio::spawn(async move {
        shutdown.cancelled().await;
        token.cancel();
    });

    let result = orchestrator.run().await;
    forward.abort();
    result
}
