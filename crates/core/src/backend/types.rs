//! Types shared by every backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// One item discovered by a backend.
///
/// Field names follow the JSON wire format served by `/search`. No field is
/// ever `null`: unknown strings are empty, unknown counters are zero and an
/// unknown publish date is omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Detail page on the remote site.
    pub link: String,
    #[serde(default)]
    pub description: String,
    /// Free-to-download (freeleech) flag.
    #[serde(default)]
    pub free: bool,
    /// Size as displayed by the remote site.
    #[serde(default)]
    pub size: String,
    #[serde(
        rename = "pubdate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seeders: u32,
    #[serde(default)]
    pub leechers: u32,
    /// Lowercase 40-hex info hash, empty when unknown.
    #[serde(rename = "infohash", default)]
    pub info_hash: String,
    /// Magnet URI, direct .torrent URL or relay URL.
    #[serde(default)]
    pub torrent_url: String,
}

/// A search result tagged with the display name of the backend that found it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedResult {
    #[serde(flatten)]
    pub result: SearchResult,
    pub source: String,
}

/// What a single backend produced for one dispatch.
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    /// Backend display name.
    pub backend: String,
    pub results: Vec<SearchResult>,
    /// Set when the backend failed. Results are empty in that case.
    pub error: Option<String>,
}

impl BackendOutcome {
    pub fn success(backend: impl Into<String>, results: Vec<SearchResult>) -> Self {
        Self {
            backend: backend.into(),
            results,
            error: None,
        }
    }

    pub fn failed(backend: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Errors a backend can report for a single call.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Rejected(String),

    #[error("search cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Http(format!("request timed out: {}", e))
        } else if e.is_decode() {
            BackendError::Parse(e.to_string())
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

/// Connector to one remote catalog.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable machine key, unique case-insensitively.
    fn id(&self) -> &str;

    /// Human-readable name used to tag results and in error messages.
    fn display_name(&self) -> &str;

    /// Search the catalog.
    ///
    /// Implementations stop in-flight network work once `cancel` fires and
    /// skip malformed items instead of failing the whole call.
    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, BackendError>;

    /// Session capability used by the download relay.
    fn as_authenticated(&self) -> Option<&dyn AuthenticatedBackend> {
        None
    }
}

/// A backend whose downloads need its own HTTP session.
#[async_trait]
pub trait AuthenticatedBackend: Send + Sync {
    /// Make sure the session is usable, logging in if needed.
    async fn ensure_logged_in(&self) -> Result<(), BackendError>;

    /// Client carrying the session's cookies or credentials.
    fn http_client(&self) -> &Client;

    /// Base URL relative download links are resolved against.
    fn base_url(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_search_result_wire_names() {
        let result = SearchResult {
            title: "Some Show S01".to_string(),
            link: "https://tracker.example/details/1".to_string(),
            free: true,
            seeders: 12,
            leechers: 3,
            info_hash: "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3".to_string(),
            torrent_url: "magnet:?xt=urn:btih:a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"
                .to_string(),
            publish_date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            ..Default::default()
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["infohash"], "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3");
        assert_eq!(json["pubdate"], "2024-03-01T12:00:00Z");
        assert_eq!(json["free"], true);
        assert_eq!(json["description"], "");
        assert_eq!(json["size"], "");
        assert!(json.get("info_hash").is_none());
    }

    #[test]
    fn test_unknown_pubdate_is_omitted() {
        let json = serde_json::to_value(SearchResult::default()).unwrap();
        assert!(json.get("pubdate").is_none());
        assert!(json.as_object().unwrap().values().all(|v| !v.is_null()));
    }

    #[test]
    fn test_tagged_result_is_flat() {
        let tagged = TaggedResult {
            result: SearchResult {
                title: "x".to_string(),
                ..Default::default()
            },
            source: "Rede Torrent".to_string(),
        };

        let json = serde_json::to_value(&tagged).unwrap();
        assert_eq!(json["title"], "x");
        assert_eq!(json["source"], "Rede Torrent");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = BackendOutcome::success("A", vec![SearchResult::default()]);
        assert!(!ok.is_failure());
        assert_eq!(ok.results.len(), 1);

        let failed = BackendOutcome::failed("B", "deadline exceeded");
        assert!(failed.is_failure());
        assert!(failed.results.is_empty());
        assert_eq!(failed.error.as_deref(), Some("deadline exceeded"));
    }

    #[test]
    fn test_rejected_error_message_is_verbatim() {
        let err = BackendError::Rejected("no need to search for packs".to_string());
        assert_eq!(err.to_string(), "no need to search for packs");
    }
}
