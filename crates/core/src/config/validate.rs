use std::collections::HashSet;

use url::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0 and the public URL parses
/// - Search/relay timeouts, session window and detail fetch concurrency are not 0
/// - Every configured indexer has a parsable base URL
/// - Scraper ids are unique and do not shadow the built-in indexers
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }
    check_url("server.public_url", &config.server.public_url)?;

    if config.search.timeout_secs == 0 {
        return Err(invalid("search.timeout_secs cannot be 0"));
    }
    if config.search.detail_fetch_concurrency == 0 {
        return Err(invalid("search.detail_fetch_concurrency cannot be 0"));
    }
    if config.relay.timeout_secs == 0 {
        return Err(invalid("relay.timeout_secs cannot be 0"));
    }
    if config.session.validity_secs == 0 {
        return Err(invalid("session.validity_secs cannot be 0"));
    }

    let indexers = &config.indexers;
    if let Some(c) = &indexers.capybarabr {
        check_url("indexers.capybarabr.base_url", &c.base_url)?;
    }
    if let Some(r) = &indexers.redetorrent {
        check_url("indexers.redetorrent.base_url", &r.base_url)?;
    }
    if let Some(a) = &indexers.amigosshare {
        check_url("indexers.amigosshare.base_url", &a.base_url)?;
    }

    let mut ids: HashSet<String> = ["capybarabr", "redetorrent", "amigosshare"]
        .into_iter()
        .map(String::from)
        .collect();
    for scraper in &indexers.scrapers {
        if scraper.id.trim().is_empty() {
            return Err(invalid("indexers.scrapers[].id cannot be empty"));
        }
        if !ids.insert(scraper.id.to_lowercase()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate indexer id: {}",
                scraper.id
            )));
        }
        check_url(&format!("indexers.scrapers.{}.base_url", scraper.id), &scraper.base_url)?;
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}

fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::ValidationError(format!("{} is not a valid URL: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config_from_str, ScraperConfig};

    fn scraper(id: &str) -> ScraperConfig {
        load_config_from_str(&format!(
            r#"
[[indexers.scrapers]]
id = "{id}"
name = "Scraper {id}"
base_url = "https://{id}.example"
"#
        ))
        .unwrap()
        .indexers
        .scrapers
        .remove(0)
    }

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = Config::default();
        config.search.detail_fetch_concurrency = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeouts_fail() {
        let mut config = Config::default();
        config.search.timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.relay.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_base_url_fails() {
        let config = load_config_from_str(
            r#"
[indexers.redetorrent]
base_url = "not a url"
"#,
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("indexers.redetorrent.base_url"));
    }

    #[test]
    fn test_validate_duplicate_scraper_ids_fail() {
        let mut config = Config::default();
        config.indexers.scrapers = vec![scraper("filmes"), scraper("FILMES")];
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate indexer id"));
    }

    #[test]
    fn test_validate_scraper_shadowing_builtin_fails() {
        let mut config = Config::default();
        config.indexers.scrapers = vec![scraper("amigosshare")];
        assert!(validate_config(&config).is_err());
    }
}
