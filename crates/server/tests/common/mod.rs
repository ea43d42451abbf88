//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock backends injected, enabling E2E testing of the HTTP surface
//! without reaching real trackers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use torrproxy_core::{
    config::{RelayConfig, SearchConfig},
    testing::MockBackend,
    Backend, BackendRegistry, Config,
};

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use torrproxy_core::testing::fixtures;

/// Test fixture for E2E testing with mock backends.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new(vec![
///         MockBackend::new("a", "Tracker A").with_results(vec![...]),
///     ]);
///
///     let response = fixture.get("/search?q=show").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The mock backends, in registration order
    #[allow(dead_code)]
    pub backends: Vec<Arc<MockBackend>>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    #[allow(dead_code)]
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` when the body is empty or not JSON
    pub body: Value,
    /// Raw body bytes
    #[allow(dead_code)]
    pub bytes: Vec<u8>,
}

impl TestFixture {
    /// Create a fixture serving the given backends with a 2 second search deadline.
    pub fn new(backends: Vec<MockBackend>) -> Self {
        Self::with_config(backends, TestConfig::default())
    }

    pub fn with_config(backends: Vec<MockBackend>, test_config: TestConfig) -> Self {
        let backends: Vec<Arc<MockBackend>> = backends.into_iter().map(Arc::new).collect();
        let registry = BackendRegistry::new(
            backends
                .iter()
                .map(|b| Arc::clone(b) as Arc<dyn Backend>)
                .collect(),
        )
        .expect("Failed to build registry");

        let config = Config {
            search: SearchConfig {
                timeout_secs: test_config.search_timeout_secs,
                ..Default::default()
            },
            relay: RelayConfig {
                timeout_secs: test_config.relay_timeout_secs,
                ..Default::default()
            },
            ..Default::default()
        };

        let state = Arc::new(
            torrproxy_server::state::AppState::new(config, Arc::new(registry))
                .expect("Failed to create app state"),
        );
        let router = torrproxy_server::api::create_router(state);

        Self { router, backends }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            bytes: body_bytes.to_vec(),
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub search_timeout_secs: u64,
    pub relay_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            search_timeout_secs: 2,
            relay_timeout_secs: 5,
        }
    }
}
