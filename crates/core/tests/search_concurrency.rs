//! Concurrency integration tests.
//!
//! These tests exercise the fan-out and detail expansion machinery with mock
//! backends and fetchers:
//! - One outcome per backend whatever each backend does
//! - Partial success versus total failure
//! - Bounded detail fetch concurrency
//! - Deduplication across concurrent detail fetches

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use torrproxy_core::{
    testing::{fixtures, MockBackend},
    Backend, BackendError, BackendRegistry, DetailFetchQueue, Dispatcher, Extractor,
    FingerprintSet, PageFetcher, SearchError, SearchResult, SearchService,
};

fn registry(backends: Vec<Arc<dyn Backend>>) -> Arc<BackendRegistry> {
    Arc::new(BackendRegistry::new(backends).expect("valid registry"))
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_yields_one_outcome_per_backend() {
    let backends: Vec<Arc<dyn Backend>> = vec![
        Arc::new(
            MockBackend::new("ok", "Ok Tracker")
                .with_results(vec![fixtures::magnet_result("A", &fixtures::info_hash(1))]),
        ),
        Arc::new(MockBackend::new("empty", "Empty Tracker")),
        Arc::new(
            MockBackend::new("err", "Broken Tracker")
                .with_error(BackendError::Http("connection refused".to_string())),
        ),
        Arc::new(MockBackend::new("panic", "Panicking Tracker").with_panic("boom")),
        Arc::new(MockBackend::new("slow", "Slow Tracker").with_delay(Duration::from_secs(60))),
    ];

    let outcomes = Dispatcher::new(Duration::from_secs(2))
        .dispatch(backends, "show")
        .await;

    assert_eq!(outcomes.len(), 5);
    let by_name: HashMap<_, _> = outcomes
        .iter()
        .map(|o| (o.backend.as_str(), o))
        .collect();
    assert_eq!(by_name.len(), 5);

    assert_eq!(by_name["Ok Tracker"].results.len(), 1);
    assert!(!by_name["Empty Tracker"].is_failure());
    assert_eq!(
        by_name["Broken Tracker"].error.as_deref(),
        Some("request failed: connection refused")
    );
    assert!(by_name["Panicking Tracker"]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("boom")));
    assert_eq!(
        by_name["Slow Tracker"].error.as_deref(),
        Some("deadline exceeded")
    );
}

#[tokio::test(start_paused = true)]
async fn test_search_partial_success_is_success() {
    let service = SearchService::new(
        registry(vec![
            Arc::new(
                MockBackend::new("a", "Tracker A")
                    .with_results(vec![fixtures::magnet_result("Show", &fixtures::info_hash(7))]),
            ),
            Arc::new(
                MockBackend::new("b", "Tracker B")
                    .with_error(BackendError::Auth("login error: bad".to_string())),
            ),
        ]),
        Dispatcher::new(Duration::from_secs(1)),
    );

    let results = service.search("show", &[] as &[&str]).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, "Tracker A");
}

#[tokio::test(start_paused = true)]
async fn test_search_total_failure_joins_reasons() {
    let service = SearchService::new(
        registry(vec![
            Arc::new(
                MockBackend::new("a", "Tracker A")
                    .with_error(BackendError::Http("timeout".to_string())),
            ),
            Arc::new(MockBackend::new("b", "Tracker B").with_delay(Duration::from_secs(30))),
        ]),
        Dispatcher::new(Duration::from_secs(1)),
    );

    let err = service.search("show", &["A", "b"]).await.unwrap_err();
    let SearchError::AllBackendsFailed(reasons) = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(reasons.len(), 2);
    let message = err.to_string();
    assert!(message.starts_with("all backends failed: "));
    assert!(message.contains("Tracker A: request failed: timeout"));
    assert!(message.contains("Tracker B: deadline exceeded"));
    assert!(message.contains(" | "));
}

/// Serves detail pages with staggered delays and records peak concurrency.
///
/// The delay of each page is derived from its URL and a seed, so different
/// seeds give different completion orders.
struct StaggeredFetcher {
    pages: HashMap<String, String>,
    seed: u64,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl StaggeredFetcher {
    fn new(pages: HashMap<String, String>) -> Self {
        Self::with_seed(pages, 0)
    }

    fn with_seed(pages: HashMap<String, String>, seed: u64) -> Self {
        Self {
            pages,
            seed,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn delay_for(&self, url: &str) -> Duration {
        let mut hasher = DefaultHasher::new();
        (self.seed, url).hash(&mut hasher);
        Duration::from_millis(1 + hasher.finish() % 13)
    }
}

#[async_trait]
impl PageFetcher for StaggeredFetcher {
    async fn fetch(&self, url: &str) -> Result<String, BackendError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay_for(url)).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| BackendError::Http(format!("no page {url}")))
    }
}

/// Each line of a page is `title,hash`.
struct LineExtractor;

impl Extractor for LineExtractor {
    fn extract(&self, page_url: &str, body: &str) -> Vec<SearchResult> {
        body.lines()
            .filter_map(|line| line.split_once(','))
            .map(|(title, hash)| SearchResult {
                title: title.to_string(),
                link: page_url.to_string(),
                info_hash: hash.to_string(),
                ..Default::default()
            })
            .collect()
    }
}

#[tokio::test]
async fn test_detail_queue_caps_concurrent_fetches() {
    let pages: HashMap<String, String> = (0..100)
        .map(|i| {
            (
                format!("https://site.example/p/{i}"),
                format!("Item {i},{}", fixtures::info_hash(i)),
            )
        })
        .collect();
    let urls: Vec<String> = pages.keys().cloned().collect();
    let fetcher = Arc::new(StaggeredFetcher::new(pages));

    let results = DetailFetchQueue::default()
        .expand(
            urls,
            fetcher.clone(),
            Arc::new(LineExtractor),
            Arc::new(FingerprintSet::new()),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(results.len(), 100);
    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= DetailFetchQueue::DEFAULT_CONCURRENCY, "peak was {peak}");
    assert!(peak > 1, "fetches never overlapped");
    assert_eq!(fetcher.active.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_fingerprint_survives_once() {
    let shared = fixtures::info_hash(0xdead);
    let pages: HashMap<String, String> = (1..=40)
        .map(|i| {
            (
                format!("https://site.example/p/{i}"),
                format!(
                    "Shared from {i},{}\nUnique {i},{}",
                    shared.to_uppercase(),
                    fixtures::info_hash(i)
                ),
            )
        })
        .collect();
    let mut urls: Vec<String> = pages.keys().cloned().collect();
    urls.sort();

    for seed in 0..8u64 {
        // Vary both the submission order and the per-page delays.
        let n = urls.len();
        urls.rotate_left((seed as usize * 7) % n);
        let seen = Arc::new(FingerprintSet::new());

        let results = DetailFetchQueue::new(8)
            .expand(
                urls.clone(),
                Arc::new(StaggeredFetcher::with_seed(pages.clone(), seed)),
                Arc::new(LineExtractor),
                seen.clone(),
                &CancellationToken::new(),
            )
            .await;

        let shared_hits = results
            .iter()
            .filter(|r| r.info_hash.eq_ignore_ascii_case(&shared))
            .count();
        assert_eq!(shared_hits, 1, "seed {seed}");
        assert_eq!(results.len(), 41, "seed {seed}");

        let distinct: HashSet<_> = results.iter().map(|r| r.info_hash.to_lowercase()).collect();
        assert_eq!(distinct.len(), 41, "seed {seed}");
        assert_eq!(seen.len(), 41, "seed {seed}");
    }
}
