//! Transport layer for gallery page requests
//!
//! This module handles:
//! - The `Transport` seam the fetcher sends logical page requests through
//! - Building the HTTP client with the headers the gallery expects
//! - Encoding queries as GraphQL `listArtworks` calls
//! - Classifying HTTP failures into retryable and terminal errors

use crate::config::ApiConfig;
use crate::model::{Query, SortMode};
use crate::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, REFERER, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// GraphQL operation name used for every listing request
pub const LIST_OPERATION: &str = "listArtworks";

const DEFAULT_USER_AGENT: &str = concat!("gallery-sweep/", env!("CARGO_PKG_VERSION"));

const SITE_REFERER: &str = "https://pixai.art";

/// Stands in for the configured connection field in [`LIST_DOCUMENT`]
const CONNECTION_PLACEHOLDER: &str = "__CONNECTION__";

const LIST_DOCUMENT: &str = r#"query listArtworks($after: String, $first: Int, $orderBy: String, $q: String, $isSafeSearch: Boolean, $feed: String, $time: DateRange) {
  __CONNECTION__(after: $after, first: $first, orderBy: $orderBy, q: $q, isSafeSearch: $isSafeSearch, feed: $feed, time: $time) {
    edges {
      node {
        __typename
        id
        title
        authorId
        prompts
        createdAt
        updatedAt
        mediaId
        media { id type width height urls { variant url } }
        isNsfw
        isSensitive
        type
        likedCount
        commentCount
        author { id username displayName }
      }
      cursor
    }
    pageInfo {
      hasNextPage
      hasPreviousPage
      endCursor
      startCursor
    }
  }
}"#;

/// Builds the listing document selecting `connection_field`
pub fn list_document(connection_field: &str) -> String {
    LIST_DOCUMENT.replacen(CONNECTION_PLACEHOLDER, connection_field, 1)
}

/// Liked-count ordering used by ranking searches
const ORDER_BY_LIKES: &str = "-markInfo.likedCount";

/// One logical page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: Query,
    /// Opaque cursor of the previous page; None for the first page
    pub after: Option<String>,
    /// Number of records to return
    pub first: u32,
}

/// Sends page requests and returns raw response bodies
///
/// Implementations own request construction (headers, auth, encoding); the
/// fetcher only sees the body or a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PageRequest) -> Result<String, TransportError>;
}

/// Builds an HTTP client with the gallery's expected headers
///
/// # Arguments
///
/// * `config` - API configuration (user agent override)
/// * `timeout` - Overall per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(SITE_REFERER));

    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats an instant the way the gallery's `DateRange` input expects
pub fn format_api_time(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Builds the GraphQL variables for a page request
///
/// | Feed | Sort mode | Variables |
/// |------|-----------|-----------|
/// | home | any | `feed` = mode's API value |
/// | search | trending | `q`, `feed = "trending1"` |
/// | search | daily-ranking, most-liked | `q`, `orderBy` = liked count |
/// | search | latest | `q`, `feed = "latest"` |
///
/// A time window adds `time = {gt, lt}`. The filter is exclusive on both
/// ends, so `gt` is moved one millisecond before the window start to keep
/// the window half-open.
pub fn build_variables(request: &PageRequest) -> Value {
    let query = &request.query;
    let mut variables = json!({
        "after": request.after.as_deref().unwrap_or(""),
        "first": request.first,
        "isSafeSearch": true,
    });

    match query.search_term() {
        None => {
            variables["feed"] = json!(query.sort_mode().api_value());
        }
        Some(term) => {
            variables["q"] = json!(term);
            match query.sort_mode() {
                SortMode::DailyRanking | SortMode::MostLiked => {
                    variables["orderBy"] = json!(ORDER_BY_LIKES);
                }
                other => {
                    variables["feed"] = json!(other.api_value());
                }
            }
        }
    }

    if let Some(range) = query.time_window() {
        variables["time"] = json!({
            "gt": format_api_time(range.start() - ChronoDuration::milliseconds(1)),
            "lt": format_api_time(range.end()),
        });
    }

    variables
}

/// Production transport speaking GraphQL over HTTPS
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    auth_token: Option<String>,
    document: String,
}

impl HttpTransport {
    /// Creates a transport from API configuration
    ///
    /// The `operation` query parameter is appended to the endpoint unless
    /// already present.
    pub fn new(config: &ApiConfig, timeout: Duration) -> Result<Self, crate::SweepError> {
        let mut endpoint = Url::parse(&config.endpoint).map_err(|e| {
            crate::ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;
        if !endpoint.query_pairs().any(|(key, _)| key == "operation") {
            endpoint
                .query_pairs_mut()
                .append_pair("operation", LIST_OPERATION);
        }

        Ok(Self {
            client: build_http_client(config, timeout)?,
            endpoint,
            auth_token: config.auth_token.clone(),
            document: list_document(&config.connection_field),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PageRequest) -> Result<String, TransportError> {
        let payload = json!({
            "query": self.document,
            "variables": build_variables(request),
        });

        let mut builder = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(classify_error)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(TransportError::RateLimited { retry_after });
        }

        let body = response.text().await.map_err(classify_error)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }
}

fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeRange;
    use chrono::TimeZone;

    fn request(term: Option<&str>, mode: SortMode) -> PageRequest {
        PageRequest {
            query: Query::new(term.map(str::to_string), mode),
            after: None,
            first: 24,
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&ApiConfig::default(), Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_endpoint_gets_operation_parameter() {
        let transport = HttpTransport::new(&ApiConfig::default(), Duration::from_secs(30)).unwrap();
        assert_eq!(
            transport.endpoint().as_str(),
            "https://api.pixai.art/graphql?operation=listArtworks"
        );
    }

    #[test]
    fn test_document_selects_connection_field() {
        let document = list_document("favoriteArtworks");
        assert!(document.contains("  favoriteArtworks(after: $after,"));
        assert!(!document.contains(CONNECTION_PLACEHOLDER));
        assert!(list_document("artworks").contains("  artworks(after: $after,"));
    }

    #[test]
    fn test_home_feed_variables() {
        let variables = build_variables(&request(None, SortMode::Following));
        assert_eq!(variables["feed"], "following_news");
        assert_eq!(variables["after"], "");
        assert_eq!(variables["first"], 24);
        assert!(variables.get("q").is_none());
    }

    #[test]
    fn test_search_variables() {
        let trending = build_variables(&request(Some("cat"), SortMode::Trending));
        assert_eq!(trending["q"], "cat");
        assert_eq!(trending["feed"], "trending1");

        let ranked = build_variables(&request(Some("cat"), SortMode::DailyRanking));
        assert_eq!(ranked["orderBy"], "-markInfo.likedCount");
        assert!(ranked.get("feed").is_none());

        let latest = build_variables(&request(Some("cat"), SortMode::Latest));
        assert_eq!(latest["feed"], "latest");
    }

    #[test]
    fn test_time_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut req = request(Some("cat"), SortMode::MostLiked);
        req.query = req
            .query
            .with_time_window(TimeRange::new(start, end).unwrap());
        req.after = Some("cursor-1".to_string());

        let variables = build_variables(&req);
        assert_eq!(variables["time"]["gt"], "2023-12-31T23:59:59.999Z");
        assert_eq!(variables["time"]["lt"], "2024-01-02T00:00:00.000Z");
        assert_eq!(variables["after"], "cursor-1");
    }
}
