//! CapybaraBR (UNIT3D JSON API) indexer.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::magnet::normalize_info_hash;
use super::util::{
    build_client, check_status, join_path, json_string, json_u32, parse_date, relay_link,
    until_cancelled,
};
use crate::backend::{AuthenticatedBackend, Backend, BackendError, SearchResult};
use crate::config::CapybaraBrConfig;

/// Offset assumed for `created_at` values that carry none (BRT).
const DEFAULT_OFFSET: &str = " -03:00";

const DATE_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S %:z", "%Y-%m-%dT%H:%M:%S%.fZ"];

pub struct CapybaraBrIndexer {
    config: CapybaraBrConfig,
    client: Client,
    public_url: String,
}

impl CapybaraBrIndexer {
    pub const ID: &'static str = "capybarabr";
    pub const NAME: &'static str = "CapybaraBR (API)";

    /// Create the indexer. The API key, when set, is sent as a bearer token
    /// on every request, relayed downloads included.
    pub fn new(
        config: CapybaraBrConfig,
        public_url: &str,
        user_agent: &str,
    ) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| BackendError::Internal(format!("invalid api key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        let client = build_client(config.timeout_secs, user_agent, false, headers)?;

        Ok(Self {
            config,
            client,
            public_url: public_url.to_string(),
        })
    }

    async fn fetch_json(&self, url: Url) -> Result<Value, BackendError> {
        let response = self.client.get(url).send().await?;
        Ok(check_status(Self::ID, response)?.json().await?)
    }

    fn parse_payload(&self, payload: &Value) -> Result<Vec<SearchResult>, BackendError> {
        let items = payload
            .get("data")
            .filter(|v| !v.is_null())
            .or_else(|| payload.get("results"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BackendError::Parse("capybarabr: unexpected json structure".to_string())
            })?;

        let mut results = Vec::with_capacity(items.len());
        for item in items.iter().filter_map(Value::as_object) {
            let attrs = item
                .get("attributes")
                .and_then(Value::as_object)
                .unwrap_or(item);

            let free = json_string(attrs.get("freeleech")).contains("100");
            if self.config.freeleech_only && !free {
                continue;
            }

            let mut created_at = json_string(attrs.get("created_at"));
            if !created_at.is_empty() && !created_at.contains('+') && !created_at.contains('-') {
                created_at.push_str(DEFAULT_OFFSET);
            }

            let download = json_string(attrs.get("download_link"));
            results.push(SearchResult {
                title: json_string(attrs.get("name")),
                link: json_string(attrs.get("details_link")),
                description: String::new(),
                free,
                size: json_string(attrs.get("size")),
                publish_date: parse_date(&created_at, DATE_FORMATS),
                seeders: json_u32(attrs.get("seeders")),
                leechers: json_u32(attrs.get("leechers")),
                info_hash: normalize_info_hash(&json_string(attrs.get("info_hash")))
                    .unwrap_or_default(),
                torrent_url: if download.is_empty() {
                    String::new()
                } else {
                    relay_link(&self.public_url, Self::ID, &download)
                },
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl Backend for CapybaraBrIndexer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn display_name(&self) -> &str {
        Self::NAME
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, BackendError> {
        if query.to_lowercase().contains("complet") {
            return Err(BackendError::Rejected(
                "no need to search for packs".to_string(),
            ));
        }

        let mut url = join_path(&self.config.base_url, "api/torrents/filter")?;
        url.query_pairs_mut()
            .append_pair("name", query)
            .append_pair("perPage", "100");

        debug!(url = %url, "Searching CapybaraBR");
        let payload = until_cancelled(cancel, self.fetch_json(url)).await?;

        let results = self.parse_payload(&payload)?;
        debug!(count = results.len(), "CapybaraBR search complete");
        Ok(results)
    }

    fn as_authenticated(&self) -> Option<&dyn AuthenticatedBackend> {
        Some(self)
    }
}

#[async_trait]
impl AuthenticatedBackend for CapybaraBrIndexer {
    /// Token authentication needs no login round-trip.
    async fn ensure_logged_in(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn http_client(&self) -> &Client {
        &self.client
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn indexer(base_url: &str, freeleech_only: bool) -> CapybaraBrIndexer {
        CapybaraBrIndexer::new(
            CapybaraBrConfig {
                base_url: base_url.to_string(),
                api_key: "secret".to_string(),
                freeleech_only,
                ..Default::default()
            },
            "http://localhost:8090",
            "torrProxy/0.1",
        )
        .unwrap()
    }

    fn payload() -> Value {
        json!({
            "data": [
                {
                    "type": "torrent",
                    "attributes": {
                        "name": "Some Show S01E01 1080p",
                        "details_link": "https://capybarabr.com/torrents/1",
                        "download_link": "https://capybarabr.com/torrent/download/1.abc",
                        "size": 1073741824,
                        "freeleech": "100%",
                        "seeders": 12,
                        "leechers": "3",
                        "info_hash": "A94A8FE5CCB19BA61C4C0873D391E987982FBBD3",
                        "created_at": "2024-05-03T14:05:09.000000Z"
                    }
                },
                {
                    "name": "Flat Item",
                    "freeleech": "0%",
                    "created_at": "05/03/2024 11:05:09"
                },
                "not an object"
            ]
        })
    }

    #[test]
    fn test_parse_payload() {
        let results = indexer("https://capybarabr.com/", false)
            .parse_payload(&payload())
            .unwrap();

        assert_eq!(results.len(), 2);
        let first = &results[0];
        assert_eq!(first.title, "Some Show S01E01 1080p");
        assert!(first.free);
        assert_eq!(first.size, "1073741824");
        assert_eq!(first.seeders, 12);
        assert_eq!(first.leechers, 3);
        assert_eq!(first.info_hash, "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3");
        assert_eq!(
            first.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 5, 3, 14, 5, 9).unwrap())
        );
        assert!(first
            .torrent_url
            .starts_with("http://localhost:8090/torrproxy/download?indexer=capybarabr&dl_url="));

        let flat = &results[1];
        assert_eq!(flat.title, "Flat Item");
        assert!(!flat.free);
        assert!(flat.torrent_url.is_empty());
        // No offset in the source: read as BRT
        assert_eq!(
            flat.publish_date,
            Some(Utc.with_ymd_and_hms(2024, 5, 3, 14, 5, 9).unwrap())
        );
    }

    #[test]
    fn test_malformed_info_hash_is_dropped() {
        let payload = json!({
            "data": [
                {"attributes": {"name": "Short", "info_hash": "abc123"}},
                {"attributes": {"name": "Junk", "info_hash": "g94a8fe5ccb19ba61c4c0873d391e987982fbbd3"}}
            ]
        });
        let results = indexer("https://capybarabr.com/", false)
            .parse_payload(&payload)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.info_hash.is_empty()));
    }

    #[test]
    fn test_freeleech_only_skips_paid_items() {
        let results = indexer("https://capybarabr.com/", true)
            .parse_payload(&payload())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].free);
    }

    #[test]
    fn test_results_key_and_bad_structure() {
        let idx = indexer("https://capybarabr.com/", false);
        let results = idx
            .parse_payload(&json!({"data": null, "results": [{"name": "x"}]}))
            .unwrap();
        assert_eq!(results.len(), 1);

        let err = idx.parse_payload(&json!({"message": "nope"})).unwrap_err();
        assert!(err.to_string().contains("unexpected json structure"));
    }

    #[tokio::test]
    async fn test_pack_queries_are_rejected() {
        let err = indexer("https://capybarabr.com/", false)
            .search("Some Show Completa", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no need to search for packs");
    }

    #[tokio::test]
    async fn test_search_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/torrents/filter"))
            .and(query_param("name", "some show"))
            .and(query_param("perPage", "100"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload()))
            .expect(1)
            .mount(&server)
            .await;

        let results = indexer(&server.uri(), false)
            .search("some show", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = indexer(&server.uri(), false)
            .search("x", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Upstream { status: 503, .. }));
        assert!(err.to_string().contains("capybarabr: bad response 503"));
    }
}
