//! Download relay.
//!
//! Fetches a file on behalf of the caller using the session of the backend
//! that produced the link, so cookies and tokens never leave the server.
//! The whole operation, streaming included, runs under one deadline.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::BackendRegistry;
use crate::config::RelayConfig;
use crate::metrics::RELAY_REQUESTS;

/// Content type used when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-bittorrent";

/// Relay errors. Each variant maps to one HTTP status class.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or unusable parameters (400).
    #[error("{0}")]
    BadRequest(String),

    /// The backend could not establish a session (401).
    #[error("{0}")]
    Auth(String),

    /// Transport failure or error status from the remote site (502).
    #[error("{0}")]
    Upstream(String),

    /// The relay deadline expired (504).
    #[error("download relay timed out after {0:?}")]
    Timeout(Duration),
}

impl RelayError {
    /// Metric label for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Auth(_) => "unauthorized",
            Self::Upstream(_) => "upstream_error",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Streaming body of a relayed download, bounded by the relay deadline.
pub type RelayStream = Pin<Box<dyn Stream<Item = Result<Bytes, RelayError>> + Send>>;

/// A successful upstream response, ready to be streamed to the caller.
pub struct RelayedDownload {
    pub content_type: String,
    pub content_disposition: Option<String>,
    response: Response,
    deadline: Instant,
    timeout: Duration,
}

impl std::fmt::Debug for RelayedDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayedDownload")
            .field("content_type", &self.content_type)
            .field("content_disposition", &self.content_disposition)
            .field("status", &self.response.status())
            .finish()
    }
}

impl RelayedDownload {
    /// Body chunks. The stream ends with [`RelayError::Timeout`] if the
    /// deadline passes mid-transfer.
    pub fn into_stream(self) -> RelayStream {
        let deadline = self.deadline;
        let timeout = self.timeout;
        let body = self.response.bytes_stream().boxed();

        futures::stream::unfold(Some(body), move |state| async move {
            let mut body = state?;
            match tokio::time::timeout_at(deadline, body.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                Ok(Some(Err(e))) => Some((
                    Err(RelayError::Upstream(format!("failed to read torrent body: {}", e))),
                    None,
                )),
                Ok(None) => None,
                Err(_) => Some((Err(RelayError::Timeout(timeout)), None)),
            }
        })
        .boxed()
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, RelayError> {
        let mut stream = self.into_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }
}

/// Resolves relay links against the registry and fetches them.
pub struct DownloadRelay {
    registry: Arc<BackendRegistry>,
    client: Client,
    timeout: Duration,
    user_agent: String,
}

impl DownloadRelay {
    pub fn new(registry: Arc<BackendRegistry>, config: &RelayConfig) -> Result<Self, RelayError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RelayError::Upstream(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            registry,
            client,
            timeout,
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `dl_url` through the backend named `indexer`.
    ///
    /// Returns once upstream headers are in. The body is streamed from the
    /// returned [`RelayedDownload`] under the same deadline.
    pub async fn fetch(&self, indexer: &str, dl_url: &str) -> Result<RelayedDownload, RelayError> {
        let deadline = Instant::now() + self.timeout;
        let result = match tokio::time::timeout_at(deadline, self.open(indexer, dl_url)).await {
            Ok(Ok(response)) => Ok(RelayedDownload {
                content_type: header_value(&response, CONTENT_TYPE)
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                content_disposition: header_value(&response, CONTENT_DISPOSITION),
                response,
                deadline,
                timeout: self.timeout,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RelayError::Timeout(self.timeout)),
        };

        match &result {
            Ok(download) => {
                RELAY_REQUESTS.with_label_values(&["ok"]).inc();
                info!(indexer, content_type = %download.content_type, "Relaying download");
            }
            Err(e) => {
                RELAY_REQUESTS.with_label_values(&[e.kind()]).inc();
                warn!(indexer, error = %e, "Download relay failed");
            }
        }
        result
    }

    async fn open(&self, indexer: &str, dl_url: &str) -> Result<Response, RelayError> {
        let indexer = indexer.trim();
        let dl_url = dl_url.trim();
        if indexer.is_empty() || dl_url.is_empty() {
            return Err(RelayError::BadRequest(
                "missing indexer or dl_url".to_string(),
            ));
        }

        let backend = self
            .registry
            .find(indexer)
            .ok_or_else(|| RelayError::BadRequest(format!("indexer not found: {}", indexer)))?;

        let (client, base_url) = match backend.as_authenticated() {
            Some(auth) => {
                auth.ensure_logged_in().await.map_err(|e| {
                    RelayError::Auth(format!("{} login failed: {}", backend.id(), e))
                })?;
                (auth.http_client().clone(), auth.base_url().to_string())
            }
            None => (self.client.clone(), String::new()),
        };

        let url = resolve_url(&base_url, dl_url)?;
        debug!(indexer = backend.id(), url = %url, "Validating download link");

        let check = self
            .get(&client, &url)
            .await
            .map_err(|e| RelayError::Upstream(format!("failed to fetch details page: {}", e)))?;
        if check.status().as_u16() >= 400 {
            let code = check.status().as_u16();
            let body = check.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "details page returned {}: {}",
                code, body
            )));
        }
        drop(check);

        let response = self
            .get(&client, &url)
            .await
            .map_err(|e| RelayError::Upstream(format!("failed to download torrent: {}", e)))?;
        if response.status().as_u16() >= 400 {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "torrent download returned {}: {}",
                code, body
            )));
        }
        Ok(response)
    }

    async fn get(&self, client: &Client, url: &Url) -> Result<Response, reqwest::Error> {
        client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
    }
}

/// Absolute form of `dl_url`, resolving relative links against `base_url`.
fn resolve_url(base_url: &str, dl_url: &str) -> Result<Url, RelayError> {
    if let Ok(url) = Url::parse(dl_url) {
        return Ok(url);
    }
    Url::parse(base_url)
        .and_then(|base| base.join(dl_url))
        .map_err(|_| RelayError::BadRequest(format!("invalid dl_url: {}", dl_url)))
}

fn header_value(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}
