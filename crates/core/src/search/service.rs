//! Search entry point combining selection, fan-out and aggregation.

use std::sync::Arc;

use tracing::{debug, info};

use super::{aggregate, Dispatcher, SearchError};
use crate::backend::{BackendRegistry, TaggedResult};
use crate::metrics::SEARCH_RESULTS;

/// Runs a query against the selected backends of a registry.
#[derive(Debug, Clone)]
pub struct SearchService {
    registry: Arc<BackendRegistry>,
    dispatcher: Dispatcher,
}

impl SearchService {
    pub fn new(registry: Arc<BackendRegistry>, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Search `indexers` (every backend when empty) for `query`.
    pub async fn search<S: AsRef<str>>(
        &self,
        query: &str,
        indexers: &[S],
    ) -> Result<Vec<TaggedResult>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let backends = self.registry.select(indexers);
        if backends.is_empty() && !indexers.is_empty() {
            return Err(SearchError::NoMatchingIndexers);
        }

        debug!(query, backends = backends.len(), "Dispatching search");
        let outcomes = self.dispatcher.dispatch(backends, query).await;
        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        let backends = outcomes.len();

        let results = aggregate(outcomes)?;
        SEARCH_RESULTS.observe(results.len() as f64);
        info!(query, backends, failed, results = results.len(), "Search completed");
        Ok(results)
    }
}
