//! Integration tests for the crawler
//!
//! A synthetic in-process gallery exercises partitioning, exactly-once
//! delivery and resumption end-to-end; wiremock stands in for the GraphQL
//! endpoint to test the HTTP transport.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use gallery_sweep::config::{ApiConfig, CrawlerConfig};
use gallery_sweep::crawler::{
    BackoffPolicy, CrawlOrchestrator, FetchSettings, HttpTransport, PageFetcher, PageRequest,
    RateLimiter, Transport, WindowPartitioner,
};
use gallery_sweep::output::{JsonSink, MemorySink};
use gallery_sweep::state::CrawlPhase;
use gallery_sweep::storage::RunStatus;
use gallery_sweep::{Query, SortMode, SweepError, TimeRange, TransportError};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DRAIN_PAGE_SIZE: u32 = 5;
const PROBE_PAGE_SIZE: u32 = 7;

/// In-process gallery holding timestamped items
///
/// A query sees the items inside its time window, truncated to the first
/// `cap` of them like the real platform. Drain requests are told apart from
/// probes by their page size.
struct Gallery {
    items: Vec<(String, DateTime<Utc>)>,
    cap: usize,
    /// Drain requests for windows starting at or after this instant are rejected
    broken_from: Option<DateTime<Utc>>,
    /// Cancels the token once this many drain pages were served
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    drain_pages: AtomicUsize,
    requests: AtomicUsize,
}

impl Gallery {
    fn new(items: Vec<(String, DateTime<Utc>)>, cap: usize) -> Arc<Self> {
        Self::build(items, cap, None)
    }

    fn broken_from(
        items: Vec<(String, DateTime<Utc>)>,
        cap: usize,
        broken_from: DateTime<Utc>,
    ) -> Arc<Self> {
        Self::build(items, cap, Some(broken_from))
    }

    fn build(
        items: Vec<(String, DateTime<Utc>)>,
        cap: usize,
        broken_from: Option<DateTime<Utc>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            items,
            cap,
            broken_from,
            cancel_after: Mutex::new(None),
            drain_pages: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        })
    }

    fn cancel_after(&self, drain_pages: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((drain_pages, token));
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn count_in(&self, range: &TimeRange) -> usize {
        self.items
            .iter()
            .filter(|(_, at)| range.contains(*at))
            .count()
    }

    fn respond(&self, request: &PageRequest) -> Result<String, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let window = request.query.time_window();
        let is_drain = request.first == DRAIN_PAGE_SIZE;

        if let (true, Some(broken), Some(range)) = (is_drain, self.broken_from, window) {
            if range.start() >= broken {
                return Err(TransportError::Status {
                    status: 400,
                    body: "window rejected".to_string(),
                });
            }
        }

        let visible: Vec<_> = self
            .items
            .iter()
            .filter(|(_, at)| window.map_or(true, |range| range.contains(*at)))
            .take(self.cap)
            .collect();

        let offset: usize = request
            .after
            .as_deref()
            .and_then(|token| token.strip_prefix("offset-"))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        let end = (offset + request.first as usize).min(visible.len());
        let start = offset.min(end);

        let edges: Vec<_> = visible[start..end]
            .iter()
            .map(|(id, at)| {
                json!({
                    "node": {"id": id, "createdAt": at.to_rfc3339(), "title": format!("artwork {}", id)},
                    "cursor": format!("offset-{}", end)
                })
            })
            .collect();

        let body = json!({
            "data": {"artworks": {
                "edges": edges,
                "pageInfo": {
                    "hasNextPage": end < visible.len(),
                    "endCursor": format!("offset-{}", end)
                }
            }}
        })
        .to_string();

        if is_drain {
            let served = self.drain_pages.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, token)) = &*self.cancel_after.lock().unwrap() {
                if served >= *limit {
                    token.cancel();
                }
            }
        }

        Ok(body)
    }
}

struct GalleryTransport(Arc<Gallery>);

#[async_trait]
impl Transport for GalleryTransport {
    async fn send(&self, request: &PageRequest) -> Result<String, TransportError> {
        self.0.respond(request)
    }
}

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

fn day_range() -> TimeRange {
    TimeRange::new(origin(), origin() + ChronoDuration::hours(24)).unwrap()
}

/// 120 items spread evenly over one day, one every 12 minutes
///
/// With a cap of 20 the day partitions into eight 3-hour windows of 15 items.
fn day_items() -> Vec<(String, DateTime<Utc>)> {
    (0..120)
        .map(|i| {
            (
                format!("art-{}", i),
                origin() + ChronoDuration::minutes(i * 12),
            )
        })
        .collect()
}

fn crawler_config(cap: u64, workers: u32, abort: bool) -> CrawlerConfig {
    CrawlerConfig {
        min_window_granularity_secs: 60,
        platform_cap_threshold: cap,
        page_size: DRAIN_PAGE_SIZE,
        probe_page_size: Some(PROBE_PAGE_SIZE),
        partition_fanout: 2,
        max_concurrent_windows: workers,
        rate_limiter_budget: 100,
        rate_limiter_interval_ms: 1000,
        max_backoff_ms: 1000,
        max_retries: 0,
        request_timeout_ms: 5000,
        abort_on_window_failure: abort,
    }
}

fn day_query() -> Query {
    Query::new(Some("landscape".to_string()), SortMode::Latest).with_time_window(day_range())
}

fn orchestrator<S: gallery_sweep::output::Sink + 'static>(
    gallery: &Arc<Gallery>,
    config: &CrawlerConfig,
    query: Query,
    sink: S,
) -> CrawlOrchestrator<GalleryTransport, S> {
    CrawlOrchestrator::new(
        query,
        config,
        "artworks",
        GalleryTransport(Arc::clone(gallery)),
        sink,
    )
}

fn assert_distinct(ids: &[String]) {
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "an id was emitted twice");
}

#[tokio::test(start_paused = true)]
async fn test_partition_covers_range_and_respects_cap() {
    let gallery = Gallery::new(day_items(), 20);
    let fetcher = PageFetcher::new(
        GalleryTransport(Arc::clone(&gallery)),
        Arc::new(RateLimiter::new(
            100,
            Duration::from_secs(1),
            BackoffPolicy::default(),
        )),
        FetchSettings::from_config(&crawler_config(20, 1, false), "artworks"),
        CancellationToken::new(),
    );

    let partitioner = WindowPartitioner::new(&fetcher, Duration::from_secs(60), 2);
    let windows = partitioner.partition(&day_query(), day_range()).await.unwrap();

    assert_eq!(windows.len(), 8);
    assert_eq!(windows[0].range.start(), day_range().start());
    assert_eq!(windows[windows.len() - 1].range.end(), day_range().end());
    for pair in windows.windows(2) {
        assert_eq!(pair[0].range.end(), pair[1].range.start());
    }
    for window in &windows {
        assert!(!window.possibly_truncated);
        assert!(gallery.count_in(&window.range) < 20);
    }
    let covered: usize = windows.iter().map(|w| gallery.count_in(&w.range)).sum();
    assert_eq!(covered, 120);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_windows_emit_each_record_once() {
    // Same-id reposts three hours later land in a different window
    let mut items = day_items();
    for i in (0..120).step_by(10) {
        let at = origin() + ChronoDuration::minutes(i * 12 + 180);
        if at < day_range().end() {
            items.push((format!("art-{}", i), at));
        }
    }
    items.sort_by_key(|(_, at)| *at);
    let gallery = Gallery::new(items, 20);
    let sink = MemorySink::new();

    let report = orchestrator(&gallery, &crawler_config(20, 4, false), day_query(), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.total_emitted, 120);
    assert_eq!(report.windows_failed, 0);
    assert_eq!(report.windows_truncated, 0);
    let ids = sink.ids();
    assert_eq!(ids.len(), 120);
    assert_distinct(&ids);
}

#[tokio::test(start_paused = true)]
async fn test_boundary_duplicates_scenario() {
    let at = |minute: i64| origin() + ChronoDuration::minutes(minute);
    let items = vec![
        ("a".to_string(), at(2)),
        ("b".to_string(), at(3)),
        ("c1".to_string(), at(4)),
        ("c2".to_string(), at(5)),
        ("c3".to_string(), at(6)),
        ("a".to_string(), at(12)),
        ("b".to_string(), at(13)),
        ("d1".to_string(), at(14)),
        ("d2".to_string(), at(15)),
        ("d3".to_string(), at(16)),
    ];
    let gallery = Gallery::new(items, 6);
    let sink = MemorySink::new();
    let range = TimeRange::new(at(0), at(20)).unwrap();
    let query = Query::new(Some("cat".to_string()), SortMode::Latest).with_time_window(range);

    let report = orchestrator(&gallery, &crawler_config(6, 1, false), query, sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.windows_completed, 2);
    assert_eq!(report.total_emitted, 8);
    let ids = sink.ids();
    assert_eq!(ids.len(), 8);
    assert_distinct(&ids);
}

#[tokio::test(start_paused = true)]
async fn test_window_at_minimum_granularity_is_flagged_truncated() {
    let burst = origin() + ChronoDuration::seconds(30 * 60 + 17);
    let items = (0..30).map(|i| (format!("burst-{}", i), burst)).collect();
    let gallery = Gallery::new(items, 10);
    let sink = MemorySink::new();
    let range = TimeRange::new(origin(), origin() + ChronoDuration::hours(1)).unwrap();
    let query = Query::new(Some("cat".to_string()), SortMode::Latest).with_time_window(range);

    let report = orchestrator(&gallery, &crawler_config(10, 1, false), query, sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.windows_truncated, 1);
    assert_eq!(report.windows_completed, 7);
    assert_eq!(report.total_emitted, 10);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_crawl_resumes_pending_windows_only() {
    let sink = MemorySink::new();
    let gallery = Gallery::new(day_items(), 20);
    let mut first = orchestrator(&gallery, &crawler_config(20, 1, false), day_query(), sink.clone());
    // Three drain pages per window: stop after the second window
    gallery.cancel_after(6, first.cancellation_token());

    let report = first.run().await.unwrap();
    assert!(report.interrupted());
    assert_eq!(report.phase, CrawlPhase::Draining);
    assert_eq!(report.windows_completed, 2);
    assert_eq!(report.windows_pending, 6);
    assert_eq!(report.total_emitted, 30);

    let healthy = Gallery::new(day_items(), 20);
    let report = orchestrator(&healthy, &crawler_config(20, 1, false), day_query(), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.windows_completed, 8);
    assert_eq!(report.total_emitted, 120);
    // No probes on resume, only the six remaining windows
    assert_eq!(healthy.requests(), 6 * 3);
    let ids = sink.ids();
    assert_eq!(ids.len(), 120);
    assert_distinct(&ids);
}

#[tokio::test(start_paused = true)]
async fn test_failed_windows_are_skipped_then_retried() {
    let sink = MemorySink::new();
    let broken = Gallery::broken_from(day_items(), 20, origin() + ChronoDuration::hours(12));

    let report = orchestrator(&broken, &crawler_config(20, 2, false), day_query(), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.windows_completed, 4);
    assert_eq!(report.windows_failed, 4);
    assert_eq!(report.total_emitted, 60);

    let healthy = Gallery::new(day_items(), 20);
    let report = orchestrator(&healthy, &crawler_config(20, 2, false), day_query(), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.windows_failed, 0);
    assert_eq!(report.windows_completed, 8);
    assert_eq!(report.total_emitted, 120);
    assert_eq!(healthy.requests(), 4 * 3);
    assert_distinct(&sink.ids());
}

#[tokio::test(start_paused = true)]
async fn test_abort_policy_stops_at_first_failed_window() {
    let sink = MemorySink::new();
    let broken = Gallery::broken_from(day_items(), 20, origin() + ChronoDuration::hours(12));

    let mut crawl = orchestrator(&broken, &crawler_config(20, 1, true), day_query(), sink.clone());
    let report = crawl.run().await.unwrap();

    assert_eq!(report.phase, CrawlPhase::Failed);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(crawl.phase(), CrawlPhase::Failed);
    assert_eq!(report.windows_completed, 4);
    assert_eq!(report.windows_failed, 1);
    assert_eq!(report.windows_pending, 3);
    assert_eq!(report.total_emitted, 60);
}

#[tokio::test(start_paused = true)]
async fn test_json_sink_resume_after_abort() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("artworks.jsonl");
    let checkpoint = dir.path().join("artworks.checkpoint.db");

    let broken = Gallery::broken_from(day_items(), 20, origin() + ChronoDuration::hours(12));
    let sink = JsonSink::open(&records, &checkpoint, true).unwrap();
    let report = orchestrator(&broken, &crawler_config(20, 1, true), day_query(), sink)
        .run()
        .await
        .unwrap();
    assert_eq!(report.phase, CrawlPhase::Failed);
    assert_eq!(std::fs::read_to_string(&records).unwrap().lines().count(), 60);

    let healthy = Gallery::new(day_items(), 20);
    let sink = JsonSink::open(&records, &checkpoint, false).unwrap();
    let report = orchestrator(&healthy, &crawler_config(20, 1, true), day_query(), sink)
        .run()
        .await
        .unwrap();
    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.total_emitted, 120);

    let ids: Vec<String> = std::fs::read_to_string(&records)
        .unwrap()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids.len(), 120);
    assert_distinct(&ids);

    let other_query =
        Query::new(Some("portrait".to_string()), SortMode::Latest).with_time_window(day_range());
    let sink = JsonSink::open(&records, &checkpoint, false).unwrap();
    let result = orchestrator(&healthy, &crawler_config(20, 1, true), other_query, sink)
        .run()
        .await;
    assert!(matches!(result, Err(SweepError::CheckpointMismatch { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_json_sink_lost_checkpoint_keeps_records_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("artworks.jsonl");
    let first_checkpoint = dir.path().join("first.checkpoint.db");

    let broken = Gallery::broken_from(day_items(), 20, origin() + ChronoDuration::hours(12));
    let sink = JsonSink::open(&records, &first_checkpoint, true).unwrap();
    orchestrator(&broken, &crawler_config(20, 1, true), day_query(), sink)
        .run()
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&records).unwrap().lines().count(), 60);

    // Same records file, a checkpoint database that never existed
    let healthy = Gallery::new(day_items(), 20);
    let sink = JsonSink::open(&records, &dir.path().join("second.checkpoint.db"), false).unwrap();
    let report = orchestrator(&healthy, &crawler_config(20, 1, true), day_query(), sink)
        .run()
        .await
        .unwrap();
    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.total_emitted, 120);

    let ids: Vec<String> = std::fs::read_to_string(&records)
        .unwrap()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids.len(), 120);
    assert_distinct(&ids);
}

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        endpoint: format!("{}/graphql", server.uri()),
        connection_field: "artworks".to_string(),
        auth_token: Some("secret".to_string()),
        user_agent: None,
    }
}

fn connection_body(ids: &[&str], next: Option<&str>) -> serde_json::Value {
    let edges: Vec<_> = ids
        .iter()
        .map(|id| json!({"node": {"id": id, "title": format!("artwork {}", id)}, "cursor": id}))
        .collect();
    json!({
        "data": {"artworks": {
            "edges": edges,
            "pageInfo": {"hasNextPage": next.is_some(), "endCursor": next}
        }}
    })
}

fn http_fetcher(server: &MockServer, max_retries: u32) -> PageFetcher<HttpTransport> {
    let transport = HttpTransport::new(&api_config(server), Duration::from_secs(5)).unwrap();
    let mut settings = FetchSettings::from_config(&crawler_config(1000, 1, false), "artworks");
    settings.max_retries = max_retries;
    PageFetcher::new(
        transport,
        Arc::new(RateLimiter::new(
            100,
            Duration::from_secs(1),
            BackoffPolicy::default(),
        )),
        settings,
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_http_transport_sends_graphql_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(query_param("operation", "listArtworks"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "variables": {
                "q": "cat",
                "orderBy": "-markInfo.likedCount",
                "first": 5,
                "after": "",
                "time": {"gt": "2024-04-30T23:59:59.999Z", "lt": "2024-05-02T00:00:00.000Z"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(connection_body(&["1", "2"], None)))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&api_config(&mock_server), Duration::from_secs(5)).unwrap();
    let request = PageRequest {
        query: Query::new(Some("cat".to_string()), SortMode::MostLiked)
            .with_time_window(day_range()),
        after: None,
        first: 5,
    };

    let body = transport.send(&request).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["artworks"]["edges"][1]["node"]["id"], "2");
}

#[tokio::test]
async fn test_http_crawl_follows_cursors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({"variables": {"after": "", "feed": "latest"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(connection_body(&["1", "2"], Some("c1"))),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"variables": {"after": "c1"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(connection_body(&["2", "3"], None)))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&api_config(&mock_server), Duration::from_secs(5)).unwrap();
    let sink = MemorySink::new();
    let mut crawl = CrawlOrchestrator::new(
        Query::new(None, SortMode::Latest),
        &crawler_config(1000, 1, false),
        "artworks",
        transport,
        sink.clone(),
    );

    let report = crawl.run().await.unwrap();
    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.total_emitted, 3);
    assert_eq!(sink.ids(), vec!["1", "2", "3"]);
    assert_eq!(sink.records()[0].attributes["title"], "artwork 1");
}

#[tokio::test]
async fn test_http_crawl_uses_configured_connection_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains("favoriteArtworks(after: $after"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"favoriteArtworks": {
                "edges": [{"node": {"id": "7"}}, {"node": {"id": "8"}}],
                "pageInfo": {"hasNextPage": false, "endCursor": null}
            }}
        })))
        .mount(&mock_server)
        .await;

    let mut api = api_config(&mock_server);
    api.connection_field = "favoriteArtworks".to_string();
    let transport = HttpTransport::new(&api, Duration::from_secs(5)).unwrap();
    let sink = MemorySink::new();
    let mut crawl = CrawlOrchestrator::new(
        Query::new(None, SortMode::Latest),
        &crawler_config(1000, 1, false),
        &api.connection_field,
        transport,
        sink.clone(),
    );

    let report = crawl.run().await.unwrap();
    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(sink.ids(), vec!["7", "8"]);
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(connection_body(&["1"], None)))
        .mount(&mock_server)
        .await;

    let fetcher = http_fetcher(&mock_server, 2);
    let query = Query::new(None, SortMode::Trending);
    let page = fetcher.fetch(&query, None).await.unwrap();

    assert_eq!(page.records.len(), 1);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_server_errors_exhaust_retry_budget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let fetcher = http_fetcher(&mock_server, 2);
    let error = fetcher
        .fetch(&Query::new(None, SortMode::Trending), None)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        gallery_sweep::FetchError::Transport { attempts: 3, .. }
    ));
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_graphql_errors_fail_the_window() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"errors": [{"message": "query too complex"}]})),
        )
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&api_config(&mock_server), Duration::from_secs(5)).unwrap();
    let sink = MemorySink::new();
    let report = CrawlOrchestrator::new(
        Query::new(None, SortMode::Trending),
        &crawler_config(1000, 1, false),
        "artworks",
        transport,
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(report.phase, CrawlPhase::Completed);
    assert_eq!(report.windows_failed, 1);
    assert_eq!(report.total_emitted, 0);
    let checkpoint = sink.checkpoint().unwrap();
    assert!(checkpoint.windows()[0]
        .error
        .as_deref()
        .unwrap()
        .contains("query too complex"));
}
