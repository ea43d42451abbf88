//! Merging of backend outcomes into the response list.

use thiserror::Error;

use crate::backend::{BackendOutcome, TaggedResult};

/// Errors surfaced by a search request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("missing q parameter")]
    EmptyQuery,

    #[error("no matching indexers found")]
    NoMatchingIndexers,

    /// Every selected backend failed. Holds `"<name>: <reason>"` per backend.
    #[error("all backends failed: {}", .0.join(" | "))]
    AllBackendsFailed(Vec<String>),
}

/// Flatten outcomes into one list tagged with each backend's display name.
///
/// Succeeds as long as one backend did not fail, even when every successful
/// backend came back empty.
pub fn aggregate(outcomes: Vec<BackendOutcome>) -> Result<Vec<TaggedResult>, SearchError> {
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for outcome in &outcomes {
        if let Some(error) = &outcome.error {
            failures.push(format!("{}: {}", outcome.backend, error));
        }
    }

    if !outcomes.is_empty() && failures.len() == outcomes.len() {
        return Err(SearchError::AllBackendsFailed(failures));
    }

    for outcome in outcomes {
        let source = outcome.backend;
        results.extend(outcome.results.into_iter().map(|result| TaggedResult {
            result,
            source: source.clone(),
        }));
    }

    Ok(results)
}
