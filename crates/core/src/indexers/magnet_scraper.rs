//! Generic scraper for sites whose search page lists detail pages that
//! carry magnet links.
//!
//! The search page yields candidate detail URLs. Those are expanded through
//! the [`DetailFetchQueue`], which bounds concurrent fetches and drops items
//! whose info hash was already seen during this search.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::magnet::parse_magnet;
use super::util::{abs_url, build_client, check_status, selector, until_cancelled};
use crate::backend::{Backend, BackendError, SearchResult};
use crate::config::ScraperConfig;
use crate::search::{DetailFetchQueue, Extractor, FingerprintSet};

/// Reads every magnet link of a detail page.
pub struct MagnetPageExtractor {
    title: Selector,
    magnet: Selector,
}

impl MagnetPageExtractor {
    pub fn new(title_selector: &str) -> Result<Self, BackendError> {
        Ok(Self {
            title: selector(title_selector)?,
            magnet: selector(r#"a[href^="magnet:"]"#)?,
        })
    }
}

impl Extractor for MagnetPageExtractor {
    fn extract(&self, page_url: &str, body: &str) -> Vec<SearchResult> {
        let document = Html::parse_document(body);
        let page_title = document
            .select(&self.title)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        document
            .select(&self.magnet)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let info = parse_magnet(href)?;
                let title = info
                    .display_name
                    .unwrap_or_else(|| page_title.clone());
                Some(SearchResult {
                    title,
                    link: page_url.to_string(),
                    info_hash: info.info_hash,
                    torrent_url: href.trim().to_string(),
                    ..Default::default()
                })
            })
            .collect()
    }
}

pub struct MagnetScraperIndexer {
    config: ScraperConfig,
    client: Client,
    queue: DetailFetchQueue,
    detail_link: Selector,
    extractor: Arc<MagnetPageExtractor>,
}

impl MagnetScraperIndexer {
    pub fn new(
        config: ScraperConfig,
        queue: DetailFetchQueue,
        user_agent: &str,
    ) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs, user_agent, false, HeaderMap::new())?;
        let detail_link = selector(&config.detail_link_selector)?;
        let extractor = Arc::new(MagnetPageExtractor::new(&config.title_selector)?);
        Ok(Self {
            config,
            client,
            queue,
            detail_link,
            extractor,
        })
    }

    fn search_url(&self, query: &str) -> Result<Url, BackendError> {
        let path = self
            .config
            .search_path
            .replace("{query}", &urlencoding::encode(query.trim()));
        let raw = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&raw)
            .map_err(|e| BackendError::Internal(format!("invalid search url {}: {}", raw, e)))
    }

    async fn fetch_listing(&self, url: Url) -> Result<String, BackendError> {
        let response = self.client.get(url).send().await?;
        Ok(check_status(&self.config.id, response)?.text().await?)
    }

    /// Absolute detail page URLs in page order, without repeats.
    fn detail_links(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut links: Vec<String> = Vec::new();
        for anchor in document.select(&self.detail_link) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let url = abs_url(&self.config.base_url, href);
            if !url.starts_with("http") || links.contains(&url) {
                continue;
            }
            links.push(url);
        }
        links
    }
}

#[async_trait]
impl Backend for MagnetScraperIndexer {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn display_name(&self) -> &str {
        &self.config.name
    }

    async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let url = self.search_url(query)?;
        debug!(indexer = %self.config.id, url = %url, "Fetching listing page");
        let listing = until_cancelled(cancel, self.fetch_listing(url)).await?;

        let links = self.detail_links(&listing);
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let results = self
            .queue
            .expand(
                links,
                Arc::new(self.client.clone()),
                self.extractor.clone(),
                Arc::new(FingerprintSet::new()),
                cancel,
            )
            .await;
        if cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        debug!(indexer = %self.config.id, count = results.len(), "Scraper search complete");
        Ok(results)
    }
}
