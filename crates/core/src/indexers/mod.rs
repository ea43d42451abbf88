//! Concrete tracker backends and the registry builder.

mod amigosshare;
mod capybarabr;
mod magnet;
mod magnet_scraper;
mod redetorrent;
mod util;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

pub use amigosshare::AmigosShareIndexer;
pub use capybarabr::CapybaraBrIndexer;
pub use magnet::{normalize_info_hash, parse_magnet, MagnetInfo};
pub use magnet_scraper::{MagnetPageExtractor, MagnetScraperIndexer};
pub use redetorrent::RedeTorrentIndexer;

use crate::backend::{Backend, BackendRegistry, RegistryError};
use crate::config::Config;
use crate::search::DetailFetchQueue;

/// Build every indexer that has a configuration section.
pub fn build_registry(config: &Config) -> Result<BackendRegistry, RegistryError> {
    let public_url = &config.server.public_url;
    let user_agent = &config.relay.user_agent;
    let indexers = &config.indexers;
    let mut backends: Vec<Arc<dyn Backend>> = Vec::new();

    if let Some(c) = &indexers.capybarabr {
        let indexer = CapybaraBrIndexer::new(c.clone(), public_url, user_agent)
            .map_err(|e| invalid(CapybaraBrIndexer::ID, e))?;
        backends.push(Arc::new(indexer));
    }
    if let Some(c) = &indexers.redetorrent {
        let indexer = RedeTorrentIndexer::new(c.clone(), user_agent)
            .map_err(|e| invalid(RedeTorrentIndexer::ID, e))?;
        backends.push(Arc::new(indexer));
    }
    if let Some(c) = &indexers.amigosshare {
        let indexer = AmigosShareIndexer::new(
            c.clone(),
            Duration::from_secs(config.session.validity_secs),
            public_url,
            user_agent,
        )
        .map_err(|e| invalid(AmigosShareIndexer::ID, e))?;
        backends.push(Arc::new(indexer));
    }
    for c in &indexers.scrapers {
        let queue = DetailFetchQueue::new(config.search.detail_fetch_concurrency);
        let indexer = MagnetScraperIndexer::new(c.clone(), queue, user_agent)
            .map_err(|e| invalid(&c.id, e))?;
        backends.push(Arc::new(indexer));
    }

    let registry = BackendRegistry::new(backends)?;
    info!(indexers = ?registry.ids(), "Indexers registered");
    Ok(registry)
}

fn invalid(id: &str, error: impl std::fmt::Display) -> RegistryError {
    RegistryError::InvalidBackend {
        id: id.to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_only_configured_indexers_are_registered() {
        let config = load_config_from_str(
            r#"
[indexers.redetorrent]

[[indexers.scrapers]]
id = "filmes"
name = "Filmes Torrent"
base_url = "https://filmes.example"
"#,
        )
        .unwrap();

        let registry = build_registry(&config).unwrap();
        assert_eq!(registry.ids(), vec!["redetorrent", "filmes"]);
        assert!(registry.find("Filmes Torrent").is_some());
    }

    #[test]
    fn test_empty_config_builds_empty_registry() {
        let registry = build_registry(&Config::default()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_capability_exposure() {
        let config = load_config_from_str(
            r#"
[indexers.capybarabr]
[indexers.redetorrent]
[indexers.amigosshare]
"#,
        )
        .unwrap();
        let registry = build_registry(&config).unwrap();

        let authenticated = |id: &str| registry.find(id).unwrap().as_authenticated().is_some();
        assert!(authenticated("capybarabr"));
        assert!(authenticated("amigosshare"));
        assert!(!authenticated("redetorrent"));
    }

    #[test]
    fn test_bad_scraper_selector_is_reported() {
        let config = load_config_from_str(
            r#"
[[indexers.scrapers]]
id = "broken"
name = "Broken"
base_url = "https://broken.example"
detail_link_selector = "a["
"#,
        )
        .unwrap();
        let err = build_registry(&config).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidBackend { ref id, .. } if id == "broken"));
    }
}
