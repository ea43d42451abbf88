//! Rede Torrent indexer, backed by a JSON search proxy.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::magnet::{normalize_info_hash, parse_magnet};
use super::util::{
    build_client, check_status, join_path, json_string, json_u32, parse_date, until_cancelled,
};
use crate::backend::{Backend, BackendError, SearchResult};
use crate::config::RedeTorrentConfig;

static SEASON_PADDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(S0)(\d{1,2})$").unwrap());
static SEASON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(S)(\d{1,3})$").unwrap());

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

pub struct RedeTorrentIndexer {
    config: RedeTorrentConfig,
    client: Client,
}

impl RedeTorrentIndexer {
    pub const ID: &'static str = "redetorrent";
    pub const NAME: &'static str = "Rede Torrent";

    pub fn new(config: RedeTorrentConfig, user_agent: &str) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs, user_agent, false, HeaderMap::new())?;
        Ok(Self { config, client })
    }

    async fn fetch_json(&self, url: Url) -> Result<Value, BackendError> {
        let response = self.client.get(url).send().await?;
        Ok(check_status(Self::ID, response)?.json().await?)
    }

    fn parse_payload(payload: &Value) -> Result<Vec<SearchResult>, BackendError> {
        let items = payload
            .get("results")
            .filter(|v| !v.is_null())
            .or_else(|| payload.get("data"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                BackendError::Parse("redetorrent: unexpected results format".to_string())
            })?;

        let results = items
            .iter()
            .filter_map(Value::as_object)
            .map(|item| {
                let mut magnet = json_string(item.get("magnet_link"));
                if magnet.is_empty() {
                    magnet = json_string(item.get("magnet"));
                }
                let original_title = json_string(item.get("original_title"));
                let mut title = json_string(item.get("title")).trim().to_string();
                if title.is_empty() {
                    title = original_title.trim().to_string();
                }
                let info_hash = normalize_info_hash(&json_string(item.get("info_hash")))
                    .or_else(|| parse_magnet(&magnet).map(|info| info.info_hash))
                    .unwrap_or_default();

                SearchResult {
                    title,
                    link: json_string(item.get("details")),
                    description: original_title,
                    free: false,
                    size: json_string(item.get("size")),
                    publish_date: parse_date(&json_string(item.get("date")), DATE_FORMATS),
                    seeders: json_u32(item.get("seed_count")),
                    leechers: json_u32(item.get("leech_count")),
                    info_hash,
                    torrent_url: magnet,
                }
            })
            .collect();
        Ok(results)
    }
}

/// Rewrite a query the way the proxy expects it: lowercase, no pack suffix,
/// and a trailing season tag (`S02`, `s2`) spelled as `temporada 2`.
pub(crate) fn preprocess_query(query: &str) -> String {
    let lowered = query.to_lowercase().replace(" complet", "");
    let padded = SEASON_PADDED.replace(&lowered, "temporada $2");
    SEASON.replace(&padded, "temporada $2").into_owned()
}

#[async_trait]
impl Backend for RedeTorrentIndexer {
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
        let mut url = join_path(&self.config.base_url, "indexers/rede_torrent")?;
        url.query_pairs_mut()
            .append_pair("q", &preprocess_query(query))
            .append_pair("filter_results", "true");

        debug!(url = %url, "Searching Rede Torrent");
        let payload = until_cancelled(cancel, self.fetch_json(url)).await?;
        Self::parse_payload(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_preprocess_query() {
        assert_eq!(preprocess_query("Some Show S02"), "some show temporada 2");
        assert_eq!(preprocess_query("Some Show S10"), "some show temporada 10");
        assert_eq!(preprocess_query("Some Show s3"), "some show temporada 3");
        assert_eq!(preprocess_query("Some Show Complete"), "some showe");
        assert_eq!(preprocess_query("Movie 2024"), "movie 2024");
    }

    #[test]
    fn test_parse_payload() {
        let payload = json!({
            "results": [
                {
                    "title": "  Show S01E01 ",
                    "original_title": "Show Original",
                    "magnet_link": "magnet:?xt=urn:btih:A94A8FE5CCB19BA61C4C0873D391E987982FBBD3",
                    "details": "https://rede.example/show",
                    "size": "1.2 GB",
                    "seed_count": 40,
                    "leech_count": "2",
                    "date": "2024-05-03 14:05:09"
                },
                {
                    "original_title": "Fallback Title",
                    "magnet": "magnet:?xt=urn:btih:0000000000000000000000000000000000000001",
                    "info_hash": "ABCDEF0000000000000000000000000000000000"
                },
                null
            ]
        });

        let results = RedeTorrentIndexer::parse_payload(&payload).unwrap();
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.title, "Show S01E01");
        assert_eq!(first.description, "Show Original");
        assert_eq!(first.seeders, 40);
        assert_eq!(first.leechers, 2);
        assert_eq!(first.info_hash, "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3");
        assert!(first.publish_date.is_some());
        assert!(first.torrent_url.starts_with("magnet:"));

        let second = &results[1];
        assert_eq!(second.title, "Fallback Title");
        assert_eq!(second.info_hash, "abcdef0000000000000000000000000000000000");
        assert!(second.publish_date.is_none());
    }

    #[test]
    fn test_malformed_info_hash_falls_back_to_magnet() {
        let payload = json!({
            "results": [
                {
                    "title": "Bad Hash",
                    "info_hash": "not-a-hash",
                    "magnet_link": "magnet:?xt=urn:btih:A94A8FE5CCB19BA61C4C0873D391E987982FBBD3"
                },
                {
                    "title": "No Magnet",
                    "info_hash": "zz4a8fe5ccb19ba61c4c0873d391e987982fbbd3"
                }
            ]
        });

        let results = RedeTorrentIndexer::parse_payload(&payload).unwrap();
        assert_eq!(results[0].info_hash, "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3");
        assert_eq!(results[1].info_hash, "");
    }

    #[test]
    fn test_unexpected_format() {
        let err = RedeTorrentIndexer::parse_payload(&json!({"results": "nope"})).unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[tokio::test]
    async fn test_search_hits_proxy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexers/rede_torrent"))
            .and(query_param("q", "show temporada 1"))
            .and(query_param("filter_results", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(1)
            .mount(&server)
            .await;

        let indexer = RedeTorrentIndexer::new(
            RedeTorrentConfig {
                base_url: server.uri(),
                ..Default::default()
            },
            "torrProxy/0.1",
        )
        .unwrap();

        let results = indexer
            .search("Show S01", &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
