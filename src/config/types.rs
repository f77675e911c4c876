use serde::Deserialize;
use std::time::Duration;

use crate::model::SortMode;

/// Main configuration structure for Gallery-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub query: QueryConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub output: OutputConfig,
}

/// What to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Keyword to search for; absent means the home feed
    #[serde(rename = "search-term", default)]
    pub search_term: Option<String>,

    /// Result ordering
    #[serde(rename = "sort-mode")]
    pub sort_mode: SortMode,

    /// First day to include (YYYY-MM-DD, UTC)
    #[serde(rename = "start-day", default)]
    pub start_day: Option<String>,

    /// Day the crawl stops before (YYYY-MM-DD, UTC, exclusive)
    #[serde(rename = "end-day", default)]
    pub end_day: Option<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Windows this short are never split further (seconds)
    #[serde(rename = "min-window-granularity-secs")]
    pub min_window_granularity_secs: u64,

    /// Maximum number of records one query can return
    #[serde(rename = "platform-cap-threshold")]
    pub platform_cap_threshold: u64,

    /// Records requested per page while draining
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Records requested per page while probing; defaults to `page-size`
    #[serde(rename = "probe-page-size", default)]
    pub probe_page_size: Option<u32>,

    /// Number of sub-windows a capped window is split into
    #[serde(rename = "partition-fanout", default = "default_partition_fanout")]
    pub partition_fanout: u32,

    /// Maximum number of windows drained at once
    #[serde(
        rename = "max-concurrent-windows",
        default = "default_max_concurrent_windows"
    )]
    pub max_concurrent_windows: u32,

    /// Requests allowed per rate-limiter interval
    #[serde(rename = "rate-limiter-budget")]
    pub rate_limiter_budget: u32,

    /// Length of the rate-limiter interval (milliseconds)
    #[serde(rename = "rate-limiter-interval-ms")]
    pub rate_limiter_interval_ms: u64,

    /// Upper bound on the widened request spacing (milliseconds)
    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Retries after a retryable transport failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Stop the whole crawl on the first window that fails
    #[serde(rename = "abort-on-window-failure", default)]
    pub abort_on_window_failure: bool,
}

impl CrawlerConfig {
    pub fn min_window_granularity(&self) -> Duration {
        Duration::from_secs(self.min_window_granularity_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn effective_probe_page_size(&self) -> u32 {
        self.probe_page_size.unwrap_or(self.page_size)
    }
}

/// Gallery API endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// GraphQL endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the connection field holding the listing in responses
    #[serde(rename = "connection-field", default = "default_connection_field")]
    pub connection_field: String,

    /// Bearer token sent with every request
    #[serde(rename = "auth-token", default)]
    pub auth_token: Option<String>,

    /// User-Agent header; a crate default is used when absent
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connection_field: default_connection_field(),
            auth_token: None,
            user_agent: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// JSON Lines file receiving every emitted record
    #[serde(rename = "records-path")]
    pub records_path: String,

    /// SQLite checkpoint database
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,
}

fn default_page_size() -> u32 {
    24
}

fn default_partition_fanout() -> u32 {
    2
}

fn default_max_concurrent_windows() -> u32 {
    1
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_endpoint() -> String {
    "https://api.pixai.art/graphql".to_string()
}

fn default_connection_field() -> String {
    "artworks".to_string()
}
