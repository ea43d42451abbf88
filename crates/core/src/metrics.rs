//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Backend fan-out (searches, outcomes, durations)
//! - Detail page expansion (fetches, duplicates dropped)
//! - Session handling (login attempts)
//! - Download relay

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search fan-out
// =============================================================================

/// Backend searches by backend and outcome.
pub static BACKEND_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "torrproxy_backend_searches_total",
            "Total backend searches by outcome",
        ),
        &["backend", "result"], // "success", "empty", "failed", "timeout"
    )
    .unwrap()
});

/// Backend search duration in seconds.
pub static BACKEND_SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "torrproxy_backend_search_duration_seconds",
            "Duration of a single backend search",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
        &["backend"],
    )
    .unwrap()
});

/// Results returned to clients per search request.
pub static SEARCH_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "torrproxy_search_results",
            "Number of aggregated results per search request",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
    )
    .unwrap()
});

// =============================================================================
// Detail pages
// =============================================================================

/// Detail page fetches by result.
pub static DETAIL_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "torrproxy_detail_fetches_total",
            "Detail page fetches by result",
        ),
        &["result"], // "ok", "failed", "cancelled"
    )
    .unwrap()
});

/// Items dropped because their fingerprint was already seen.
pub static DUPLICATES_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "torrproxy_duplicates_dropped_total",
        "Extracted items dropped as duplicates within a search",
    )
    .unwrap()
});

// =============================================================================
// Sessions and relay
// =============================================================================

/// Session checks by backend and result.
pub static LOGIN_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "torrproxy_login_attempts_total",
            "Session checks and logins by result",
        ),
        &["backend", "result"], // "cached", "verified", "logged_in", "failed"
    )
    .unwrap()
});

/// Download relay requests by result.
pub static RELAY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("torrproxy_relay_requests_total", "Download relay requests"),
        &["result"], // "ok", "bad_request", "unauthorized", "upstream_error", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(BACKEND_SEARCHES.clone()),
        Box::new(BACKEND_SEARCH_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Detail pages
        Box::new(DETAIL_FETCHES.clone()),
        Box::new(DUPLICATES_DROPPED.clone()),
        // Sessions and relay
        Box::new(LOGIN_ATTEMPTS.clone()),
        Box::new(RELAY_REQUESTS.clone()),
    ]
}
