//! Mock backend for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::backend::{AuthenticatedBackend, Backend, BackendError, SearchResult};

/// Session behaviour exposed through the authenticated capability.
#[derive(Debug)]
struct MockSession {
    base_url: String,
    login_error: Option<String>,
    logins: AtomicUsize,
}

/// Mock implementation of the Backend trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable search results
/// - Simulate failures, delays and panics
/// - Track how often and with what query it was searched
/// - Optionally expose a session for the download relay
///
/// # Example
///
/// ```rust,ignore
/// use torrproxy_core::testing::{MockBackend, fixtures};
///
/// let backend = MockBackend::new("mock", "Mock Tracker")
///     .with_results(vec![fixtures::magnet_result("Some Show S01E01", "abc123")])
///     .with_delay(Duration::from_millis(50));
/// ```
#[derive(Debug)]
pub struct MockBackend {
    id: String,
    name: String,
    results: Vec<SearchResult>,
    error: Option<BackendError>,
    panic: Option<String>,
    delay: Duration,
    client: Client,
    session: Option<MockSession>,
    searches: AtomicUsize,
    cancellations: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl MockBackend {
    /// Create a backend that returns no results.
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            results: Vec::new(),
            error: None,
            panic: None,
            delay: Duration::ZERO,
            client: Client::new(),
            session: None,
            searches: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn with_results(mut self, results: Vec<SearchResult>) -> Self {
        self.results = results;
        self
    }

    /// Every search fails with this error.
    pub fn with_error(mut self, error: BackendError) -> Self {
        self.error = Some(error);
        self
    }

    /// Every search panics with this message.
    pub fn with_panic(mut self, message: &str) -> Self {
        self.panic = Some(message.to_string());
        self
    }

    /// Sleep before answering. The sleep ends early if the search is cancelled.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Expose the authenticated capability with an anonymous client.
    pub fn with_session(mut self, base_url: &str) -> Self {
        self.session = Some(MockSession {
            base_url: base_url.to_string(),
            login_error: None,
            logins: AtomicUsize::new(0),
        });
        self
    }

    /// Like [`MockBackend::with_session`] but every login attempt fails.
    pub fn with_failing_login(mut self, base_url: &str, reason: &str) -> Self {
        self = self.with_session(base_url);
        if let Some(session) = self.session.as_mut() {
            session.login_error = Some(reason.to_string());
        }
        self
    }

    /// Number of times `search` was called.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Number of searches that ended because the token fired.
    pub fn cancellation_count(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Number of times the relay asked for a session.
    pub fn login_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.logins.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, BackendError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        *self
            .last_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(query.to_string());

        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.cancellations.fetch_add(1, Ordering::SeqCst);
                    return Err(BackendError::Cancelled);
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        if let Some(message) = &self.panic {
            panic!("{}", message);
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(self.results.clone())
    }

    fn as_authenticated(&self) -> Option<&dyn AuthenticatedBackend> {
        self.session.as_ref().map(|_| self as &dyn AuthenticatedBackend)
    }
}

#[async_trait]
impl AuthenticatedBackend for MockBackend {
    async fn ensure_logged_in(&self) -> Result<(), BackendError> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        session.logins.fetch_add(1, Ordering::SeqCst);
        match &session.login_error {
            Some(reason) => Err(BackendError::Auth(reason.clone())),
            None => Ok(()),
        }
    }

    fn http_client(&self) -> &Client {
        &self.client
    }

    fn base_url(&self) -> &str {
        self.session
            .as_ref()
            .map(|s| s.base_url.as_str())
            .unwrap_or_default()
    }
}
