//! Testing utilities and mock implementations.
//!
//! This module provides a mock backend and result fixtures so the
//! dispatcher, aggregator, relay and HTTP layer can be exercised without
//! reaching real trackers.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use torrproxy_core::testing::{fixtures, MockBackend};
//! use torrproxy_core::BackendRegistry;
//!
//! let registry = BackendRegistry::new(vec![
//!     Arc::new(MockBackend::new("a", "Tracker A").with_results(vec![
//!         fixtures::magnet_result("Some Show S01E01", "abc123"),
//!     ])),
//! ])?;
//! ```

mod mock_backend;

pub use mock_backend::MockBackend;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::backend::SearchResult;

    /// A result carrying a magnet link for `info_hash`.
    pub fn magnet_result(title: &str, info_hash: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            link: format!("https://tracker.example/details/{}", info_hash),
            size: "1.4 GB".to_string(),
            seeders: 25,
            leechers: 4,
            info_hash: info_hash.to_lowercase(),
            torrent_url: format!("magnet:?xt=urn:btih:{}", info_hash),
            ..Default::default()
        }
    }

    /// A result with a relay download link and no known info hash.
    pub fn relay_result(title: &str, indexer: &str, dl_url: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            link: dl_url.to_string(),
            free: true,
            torrent_url: format!(
                "http://localhost:8090/torrproxy/download?indexer={}&dl_url={}",
                indexer,
                urlencoding::encode(dl_url)
            ),
            ..Default::default()
        }
    }

    /// A 40-character hex fingerprint derived from `n`.
    pub fn info_hash(n: u32) -> String {
        format!("{:040x}", n)
    }

    /// Minimal HTML detail page with one magnet link per hash.
    pub fn magnet_page(title: &str, hashes: &[String]) -> String {
        let links: String = hashes
            .iter()
            .map(|h| {
                format!(
                    r#"<a href="magnet:?xt=urn:btih:{}&dn={}">download</a>"#,
                    h,
                    urlencoding::encode(title)
                )
            })
            .collect();
        format!(
            "<html><body><h1>{}</h1><div class=\"links\">{}</div></body></html>",
            title, links
        )
    }
}
