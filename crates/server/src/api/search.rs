//! Aggregated search handler.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use torrproxy_core::{SearchError, TaggedResult};

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    /// Comma-separated indexer ids. Absent or blank means every indexer.
    #[serde(default)]
    pub indexers: Option<String>,
}

impl SearchParams {
    /// `None` when no filter was given, otherwise the named ids (possibly none).
    fn indexer_ids(&self) -> Option<Vec<&str>> {
        let raw = self.indexers.as_deref()?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }
}

/// GET /search?q=<query>&indexers=<ids>
///
/// Returns the merged results of every backend that answered. Fails only
/// when the request is invalid or every selected backend failed.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<TaggedResult>>, ApiError> {
    let query = params.q.as_deref().unwrap_or_default();
    if query.trim().is_empty() {
        return Err(SearchError::EmptyQuery.into());
    }

    let results = match params.indexer_ids() {
        Some(ids) if ids.is_empty() => return Err(SearchError::NoMatchingIndexers.into()),
        Some(ids) => state.search().search(query, &ids).await?,
        None => state.search().search::<&str>(query, &[]).await?,
    };
    Ok(Json(results))
}
