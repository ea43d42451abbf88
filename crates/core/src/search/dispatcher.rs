//! Fan-out of one query to many backends under a shared deadline.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendError, BackendOutcome};
use crate::metrics::{BACKEND_SEARCHES, BACKEND_SEARCH_DURATION};

/// Extra time granted after the deadline for tasks to report back before
/// they are aborted.
const COLLECT_GRACE: Duration = Duration::from_millis(250);

/// Runs one search per backend in parallel.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl Dispatcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query every backend and return exactly one outcome per backend, in
    /// completion order.
    pub async fn dispatch(&self, backends: Vec<Arc<dyn Backend>>, query: &str) -> Vec<BackendOutcome> {
        let cancel = CancellationToken::new();
        // Cancels child work if the caller drops this future mid-flight.
        let _guard = cancel.clone().drop_guard();
        self.dispatch_with(backends, query, Instant::now() + self.timeout, &cancel)
            .await
    }

    /// Like [`Dispatcher::dispatch`] with an explicit deadline and token.
    ///
    /// The token is cancelled before returning.
    pub async fn dispatch_with(
        &self,
        backends: Vec<Arc<dyn Backend>>,
        query: &str,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Vec<BackendOutcome> {
        let expected = backends.len();
        let mut pending: HashMap<usize, String> = HashMap::with_capacity(expected);
        let mut tasks = JoinSet::new();

        for (index, backend) in backends.into_iter().enumerate() {
            pending.insert(index, backend.display_name().to_string());
            let query = query.to_string();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let outcome = search_one(backend, &query, deadline, &cancel).await;
                (index, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(expected);
        loop {
            match tokio::time::timeout_at(deadline + COLLECT_GRACE, tasks.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => {
                    pending.remove(&index);
                    outcomes.push(outcome);
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Backend task did not report an outcome");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = tasks.len(),
                        "Backends still running past the deadline, aborting"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        // Tasks that were aborted or died without reporting still get an outcome.
        let past_deadline = Instant::now() >= deadline;
        for (_, backend) in pending {
            let reason = if past_deadline {
                BackendError::DeadlineExceeded.to_string()
            } else {
                "search task aborted".to_string()
            };
            outcomes.push(BackendOutcome::failed(backend, reason));
        }

        cancel.cancel();
        debug_assert_eq!(outcomes.len(), expected);
        outcomes
    }
}

async fn search_one(
    backend: Arc<dyn Backend>,
    query: &str,
    deadline: Instant,
    cancel: &CancellationToken,
) -> BackendOutcome {
    let name = backend.display_name().to_string();
    let started = Instant::now();

    let search = AssertUnwindSafe(backend.search(query, cancel)).catch_unwind();
    let result = match tokio::time::timeout_at(deadline, search).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(BackendError::Internal(format!(
            "backend panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(BackendError::DeadlineExceeded),
    };

    BACKEND_SEARCH_DURATION
        .with_label_values(&[backend.id()])
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(results) => {
            let label = if results.is_empty() { "empty" } else { "success" };
            BACKEND_SEARCHES
                .with_label_values(&[backend.id(), label])
                .inc();
            debug!(backend = %name, count = results.len(), "Backend search finished");
            BackendOutcome::success(name, results)
        }
        Err(e) => {
            let label = match e {
                BackendError::DeadlineExceeded => "timeout",
                _ => "failed",
            };
            BACKEND_SEARCHES
                .with_label_values(&[backend.id(), label])
                .inc();
            warn!(backend = %name, error = %e, "Backend search failed");
            BackendOutcome::failed(name, e.to_string())
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
