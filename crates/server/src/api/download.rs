//! Download relay handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    #[serde(default)]
    pub indexer: Option<String>,
    #[serde(default)]
    pub dl_url: Option<String>,
}

/// GET /torrproxy/download?indexer=<id>&dl_url=<url>
///
/// Streams the remote file using the indexer's session.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let indexer = params.indexer.as_deref().unwrap_or_default();
    let dl_url = params.dl_url.as_deref().unwrap_or_default();

    let download = state.relay().fetch(indexer, dl_url).await?;
    let content_type = download.content_type.clone();
    let content_disposition = download.content_disposition.clone();

    let mut response = Body::from_stream(download.into_stream()).into_response();
    let headers = response.headers_mut();
    match HeaderValue::from_str(&content_type) {
        Ok(value) => {
            headers.insert(header::CONTENT_TYPE, value);
        }
        Err(_) => {
            warn!(content_type, "Dropping invalid upstream content type");
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(torrproxy_core::relay::DEFAULT_CONTENT_TYPE),
            );
        }
    }
    if let Some(value) = content_disposition.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
