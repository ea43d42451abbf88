//! Bounded-concurrency expansion of listing pages into detail items.
//!
//! Each candidate URL gets its own task. A semaphore limits how many tasks
//! perform network I/O at once; parsing happens after the permit is released.
//! Items are deduplicated across tasks through a shared [`FingerprintSet`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::FingerprintSet;
use crate::backend::{BackendError, SearchResult};
use crate::metrics::{DETAIL_FETCHES, DUPLICATES_DROPPED};

/// Downloads one page body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, BackendError>;
}

#[async_trait]
impl PageFetcher for Client {
    async fn fetch(&self, url: &str) -> Result<String, BackendError> {
        let response = self.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Upstream {
                status: status.as_u16(),
                message: format!("detail page returned {}: {}", status.as_u16(), url),
            });
        }
        Ok(response.text().await?)
    }
}

/// Turns one fetched page into zero or more items.
pub trait Extractor: Send + Sync {
    fn extract(&self, page_url: &str, body: &str) -> Vec<SearchResult>;
}

/// Expands candidate URLs into deduplicated items.
#[derive(Debug, Clone)]
pub struct DetailFetchQueue {
    concurrency: usize,
}

impl Default for DetailFetchQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONCURRENCY)
    }
}

impl DetailFetchQueue {
    pub const DEFAULT_CONCURRENCY: usize = 5;

    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every URL, extract its items and keep the first item per
    /// fingerprint. Returns once every task has finished.
    ///
    /// Items with an empty fingerprint are always kept. Failed fetches are
    /// logged and contribute nothing. Result order is unspecified.
    pub async fn expand(
        &self,
        urls: Vec<String>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        seen: Arc<FingerprintSet>,
        cancel: &CancellationToken,
    ) -> Vec<SearchResult> {
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        debug!(
            urls = urls.len(),
            concurrency = self.concurrency,
            "Expanding detail pages"
        );

        for url in urls {
            let job = DetailJob {
                url,
                fetcher: Arc::clone(&fetcher),
                extractor: Arc::clone(&extractor),
                seen: Arc::clone(&seen),
                gate: Arc::clone(&gate),
                cancel: cancel.clone(),
            };
            tasks.spawn(job.run());
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(items) => results.extend(items),
                Err(e) => {
                    DETAIL_FETCHES.with_label_values(&["failed"]).inc();
                    warn!(error = %e, "Detail fetch task failed");
                }
            }
        }
        results
    }
}

struct DetailJob {
    url: String,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    seen: Arc<FingerprintSet>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl DetailJob {
    async fn run(self) -> Vec<SearchResult> {
        let Some(body) = self.fetch_gated().await else {
            return Vec::new();
        };

        let items = self.extractor.extract(&self.url, &body);
        let extracted = items.len();
        let kept: Vec<SearchResult> = items
            .into_iter()
            .filter(|item| item.info_hash.is_empty() || self.seen.insert_if_absent(&item.info_hash))
            .collect();

        let dropped = extracted - kept.len();
        if dropped > 0 {
            DUPLICATES_DROPPED.inc_by(dropped as u64);
        }
        debug!(url = %self.url, extracted, kept = kept.len(), "Detail page processed");
        kept
    }

    /// Fetch the page while holding an admission permit.
    async fn fetch_gated(&self) -> Option<String> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                DETAIL_FETCHES.with_label_values(&["cancelled"]).inc();
                return None;
            }
            permit = Arc::clone(&self.gate).acquire_owned() => permit.ok()?,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                DETAIL_FETCHES.with_label_values(&["cancelled"]).inc();
                debug!(url = %self.url, "Detail fetch cancelled");
                None
            }
            fetched = self.fetcher.fetch(&self.url) => match fetched {
                Ok(body) => {
                    DETAIL_FETCHES.with_label_values(&["ok"]).inc();
                    Some(body)
                }
                Err(e) => {
                    DETAIL_FETCHES.with_label_values(&["failed"]).inc();
                    warn!(url = %self.url, error = %e, "Detail fetch failed");
                    None
                }
            },
        }
    }
}
