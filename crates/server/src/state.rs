use std::sync::Arc;
use std::time::Duration;

use torrproxy_core::{
    BackendRegistry, Config, Dispatcher, DownloadRelay, RelayError, SanitizedConfig,
    SearchService,
};

/// Shared application state
pub struct AppState {
    config: Config,
    search: SearchService,
    relay: DownloadRelay,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<BackendRegistry>) -> Result<Self, RelayError> {
        let dispatcher = Dispatcher::new(Duration::from_secs(config.search.timeout_secs));
        let relay = DownloadRelay::new(Arc::clone(&registry), &config.relay)?;
        Ok(Self {
            search: SearchService::new(registry, dispatcher),
            relay,
            config,
        })
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn registry(&self) -> &BackendRegistry {
        self.search.registry()
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn relay(&self) -> &DownloadRelay {
        &self.relay
    }
}
