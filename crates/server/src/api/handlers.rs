use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use torrproxy_core::SanitizedConfig;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// A registered indexer as listed by `GET /indexers`.
#[derive(Debug, Serialize)]
pub struct IndexerInfo {
    pub id: String,
    pub name: String,
    /// Whether downloads go through a server-side session.
    pub authenticated: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn list_indexers(State(state): State<Arc<AppState>>) -> Json<Vec<IndexerInfo>> {
    let indexers = state
        .registry()
        .all()
        .iter()
        .map(|backend| IndexerInfo {
            id: backend.id().to_string(),
            name: backend.display_name().to_string(),
            authenticated: backend.as_authenticated().is_some(),
        })
        .collect();
    Json(indexers)
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
