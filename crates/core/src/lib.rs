pub mod backend;
pub mod config;
pub mod indexers;
pub mod metrics;
pub mod relay;
pub mod search;
pub mod session;
pub mod testing;

pub use backend::{
    AuthenticatedBackend, Backend, BackendError, BackendOutcome, BackendRegistry, RegistryError,
    SearchResult, TaggedResult,
};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use indexers::build_registry;
pub use relay::{DownloadRelay, RelayError, RelayedDownload};
pub use search::{
    aggregate, DetailFetchQueue, Dispatcher, Extractor, FingerprintSet, PageFetcher, SearchError,
    SearchService,
};
pub use session::{LoginFlow, SessionCache, SessionState};
