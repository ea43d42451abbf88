use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub indexers: IndexersConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL of this server, used to build relay links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8090
}

fn default_public_url() -> String {
    "http://localhost:8090".to_string()
}

/// Aggregate search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Deadline shared by every backend of one search request (default: 15)
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    /// Max detail pages fetched concurrently per search (default: 5)
    #[serde(default = "default_detail_fetch_concurrency")]
    pub detail_fetch_concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_search_timeout(),
            detail_fetch_concurrency: default_detail_fetch_concurrency(),
        }
    }
}

fn default_search_timeout() -> u64 {
    15
}

fn default_detail_fetch_concurrency() -> usize {
    5
}

/// Download relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Deadline for a whole relay operation, including streaming (default: 60)
    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_relay_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_relay_timeout() -> u64 {
    60
}

pub(crate) fn default_user_agent() -> String {
    "torrProxy/0.1".to_string()
}

/// Login session cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// How long a verified login is trusted without a new check (default: 600)
    #[serde(default = "default_session_validity")]
    pub validity_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validity_secs: default_session_validity(),
        }
    }
}

fn default_session_validity() -> u64 {
    600
}

/// Indexer configuration. An indexer is registered only when its section is present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capybarabr: Option<CapybaraBrConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redetorrent: Option<RedeTorrentConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amigosshare: Option<AmigosShareConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scrapers: Vec<ScraperConfig>,
}

/// CapybaraBR (UNIT3D API) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapybaraBrConfig {
    #[serde(default = "default_capybara_base")]
    pub base_url: String,
    /// UNIT3D API token, sent as a bearer token
    #[serde(default)]
    pub api_key: String,
    /// Only keep 100% freeleech torrents
    #[serde(default)]
    pub freeleech_only: bool,
    #[serde(default = "default_indexer_timeout")]
    pub timeout_secs: u64,
}

impl Default for CapybaraBrConfig {
    fn default() -> Self {
        Self {
            base_url: default_capybara_base(),
            api_key: String::new(),
            freeleech_only: false,
            timeout_secs: default_indexer_timeout(),
        }
    }
}

fn default_capybara_base() -> String {
    "https://capybarabr.com/".to_string()
}

/// Rede Torrent (JSON search proxy) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedeTorrentConfig {
    #[serde(default = "default_rede_base")]
    pub base_url: String,
    #[serde(default = "default_rede_timeout")]
    pub timeout_secs: u64,
}

impl Default for RedeTorrentConfig {
    fn default() -> Self {
        Self {
            base_url: default_rede_base(),
            timeout_secs: default_rede_timeout(),
        }
    }
}

fn default_rede_base() -> String {
    "http://127.0.0.1:4949".to_string()
}

fn default_rede_timeout() -> u64 {
    15
}

/// Amigos Share Club (HTML tracker with cookie login) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AmigosShareConfig {
    #[serde(default = "default_amigos_base")]
    pub base_url: String,
    /// Empty username or password means the site is used anonymously
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub freeleech_only: bool,
    #[serde(default = "default_amigos_sort")]
    pub sort: String,
    #[serde(default = "default_amigos_order")]
    pub order: String,
    #[serde(default = "default_indexer_timeout")]
    pub timeout_secs: u64,
}

impl Default for AmigosShareConfig {
    fn default() -> Self {
        Self {
            base_url: default_amigos_base(),
            username: String::new(),
            password: String::new(),
            freeleech_only: false,
            sort: default_amigos_sort(),
            order: default_amigos_order(),
            timeout_secs: default_indexer_timeout(),
        }
    }
}

fn default_amigos_base() -> String {
    "https://cliente.amigos-share.club/".to_string()
}

fn default_amigos_sort() -> String {
    "id".to_string()
}

fn default_amigos_order() -> String {
    "desc".to_string()
}

/// Generic HTML site whose search page links to detail pages carrying magnet links.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Machine id, unique across all indexers (case-insensitive)
    pub id: String,
    /// Display name used to tag results
    pub name: String,
    pub base_url: String,
    /// Search path relative to `base_url`; `{query}` is replaced by the encoded query
    #[serde(default = "default_search_path")]
    pub search_path: String,
    /// CSS selector matching the detail page links on the search page
    #[serde(default = "default_detail_link_selector")]
    pub detail_link_selector: String,
    /// CSS selector for the item title on a detail page
    #[serde(default = "default_title_selector")]
    pub title_selector: String,
    #[serde(default = "default_indexer_timeout")]
    pub timeout_secs: u64,
}

fn default_search_path() -> String {
    "/?s={query}".to_string()
}

fn default_detail_link_selector() -> String {
    "article h2 a[href]".to_string()
}

fn default_title_selector() -> String {
    "h1".to_string()
}

fn default_indexer_timeout() -> u64 {
    20
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub relay: RelayConfig,
    pub session: SessionConfig,
    pub indexers: SanitizedIndexersConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capybarabr: Option<SanitizedCapybaraBrConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redetorrent: Option<RedeTorrentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amigosshare: Option<SanitizedAmigosShareConfig>,
    pub scrapers: Vec<ScraperConfig>,
}

/// Sanitized CapybaraBR config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCapybaraBrConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub freeleech_only: bool,
}

/// Sanitized Amigos Share config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAmigosShareConfig {
    pub base_url: String,
    pub credentials_configured: bool,
    pub freeleech_only: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let indexers = &config.indexers;
        Self {
            server: config.server.clone(),
            search: config.search.clone(),
            relay: config.relay.clone(),
            session: config.session.clone(),
            indexers: SanitizedIndexersConfig {
                capybarabr: indexers
                    .capybarabr
                    .as_ref()
                    .map(|c| SanitizedCapybaraBrConfig {
                        base_url: c.base_url.clone(),
                        api_key_configured: !c.api_key.is_empty(),
                        freeleech_only: c.freeleech_only,
                    }),
                redetorrent: indexers.redetorrent.clone(),
                amigosshare: indexers
                    .amigosshare
                    .as_ref()
                    .map(|a| SanitizedAmigosShareConfig {
                        base_url: a.base_url.clone(),
                        credentials_configured: !a.username.is_empty()
                            && !a.password.is_empty(),
                        freeleech_only: a.freeleech_only,
                    }),
                scrapers: indexers.scrapers.clone(),
            },
        }
    }
}
