//! Amigos Share Club indexer: HTML tracker behind a cookie login.
//!
//! Searches always perform a fresh login when credentials are configured.
//! Relayed downloads go through the [`SessionCache`] instead, so repeated
//! downloads inside the validity window skip the login round-trip.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::header::{HeaderMap, REFERER};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::util::{
    abs_url, build_client, check_status, clean_title, join_path, parse_date,
    parse_int_from_text, relay_link, selector, until_cancelled,
};
use crate::backend::{AuthenticatedBackend, Backend, BackendError, SearchResult};
use crate::config::AmigosShareConfig;
use crate::session::{login_and_verify, LoginFlow, SessionCache};

const LOGIN_PAGE: &str = "account-login.php";
const LOGOUT_PAGE: &str = "account-logout.php";
const SEARCH_PAGE: &str = "torrents-search.php";
const DATE_FORMATS: &[&str] = &["%d/%m/%y %H:%M:%S", "%d/%m/%Y %H:%M:%S"];
const QUALITY_TAGS: &[&str] = &["1080p", "720p", "4k"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RELEASE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Lançado:\s*(.+)$").unwrap());
static SINGLE_DIGIT_HOUR: Lazy<Regex> = Lazy::new(|| Regex::new(r" (\d:)").unwrap());

/// Selectors for the search result listing.
struct ListingSelectors {
    row: Selector,
    title_link: Selector,
    download_link: Selector,
    size: Selector,
    controls: Selector,
    genre: Selector,
    year: Selector,
    language: Selector,
    badge: Selector,
    free_badge: Selector,
    paragraph: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self, BackendError> {
        Ok(Self {
            row: selector("div#fancy-list-group ul.list-group li.list-group-item")?,
            title_link: selector(
                r#"a[href*="torrents-details.php?id="], a[href*="details-misc.php?id="]"#,
            )?,
            download_link: selector(r#"a[href*="download.php?id="]"#)?,
            size: selector("div.list-group-item-content p.m-0 span.badge-info")?,
            controls: selector("div.list-group-item-controls a")?,
            genre: selector(
                r##"div.list-group-item-content p.m-0 span.badge-primary[style$="#1c38c2;"]"##,
            )?,
            year: selector(
                r##"div.list-group-item-content p.m-0 span.badge-primary[style$="#246AB6;"]"##,
            )?,
            language: selector(
                r##"div.list-group-item-content p.m-0 span.badge-primary[style$="#b6249d;"]"##,
            )?,
            badge: selector("div.list-group-item-content p.m-0 span.badge-primary")?,
            free_badge: selector("span.badge-success")?,
            paragraph: selector("p")?,
        })
    }
}

pub struct AmigosShareIndexer {
    config: AmigosShareConfig,
    client: Client,
    session: SessionCache,
    public_url: String,
    selectors: ListingSelectors,
}

impl AmigosShareIndexer {
    pub const ID: &'static str = "amigosshare";
    pub const NAME: &'static str = "Amigos Share Club (ASC)";

    pub fn new(
        config: AmigosShareConfig,
        session_validity: Duration,
        public_url: &str,
        user_agent: &str,
    ) -> Result<Self, BackendError> {
        let client = build_client(config.timeout_secs, user_agent, true, HeaderMap::new())?;
        Ok(Self {
            config,
            client,
            session: SessionCache::new(Self::ID, session_validity),
            public_url: public_url.to_string(),
            selectors: ListingSelectors::new()?,
        })
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    fn search_url(&self, query: &str) -> Result<Url, BackendError> {
        let terms = WHITESPACE.replace_all(query.trim(), "%");
        let mut url = join_path(&self.config.base_url, SEARCH_PAGE)?;
        url.query_pairs_mut()
            .append_pair("search", &terms)
            .append_pair("sort", non_empty_or(&self.config.sort, "id"))
            .append_pair("order", non_empty_or(&self.config.order, "desc"));
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String, BackendError> {
        let response = self.client.get(url).send().await?;
        Ok(check_status(Self::ID, response)?.text().await?)
    }

    async fn search_page(&self, query: &str) -> Result<String, BackendError> {
        if self.has_credentials() {
            login_and_verify(self).await?;
        }
        let url = self.search_url(query)?;
        debug!(url = %url, "Searching Amigos Share");
        self.get_text(url).await
    }

    fn parse_results(&self, html: &str) -> Vec<SearchResult> {
        let document = Html::parse_document(html);
        let s = &self.selectors;

        document
            .select(&s.row)
            .filter_map(|row| {
                let free = row
                    .select(&s.free_badge)
                    .any(|badge| text_of(badge).contains("FREE"));
                if self.config.freeleech_only && !free {
                    return None;
                }

                let title_link = row.select(&s.title_link).next()?;
                let title = text_of(title_link);
                if title.is_empty() {
                    return None;
                }
                let details = title_link.value().attr("href").unwrap_or_default();
                let download = row
                    .select(&s.download_link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or_default();

                let mut controls = row.select(&s.controls);
                let seeders = controls.next().map(|a| parse_int_from_text(&text_of(a)));
                let leechers = controls.next().map(|a| parse_int_from_text(&text_of(a)));

                let quality = row
                    .select(&s.badge)
                    .map(text_of)
                    .find(|text| QUALITY_TAGS.iter().any(|tag| text.contains(tag)))
                    .unwrap_or_default();
                let year = first_text(row, &s.year);
                let language = first_text(row, &s.language);

                let download_url = abs_url(&self.config.base_url, download);
                Some(SearchResult {
                    title: clean_title(&title, &year, &quality, &language),
                    link: abs_url(&self.config.base_url, details),
                    description: first_text(row, &s.genre),
                    free,
                    size: first_text(row, &s.size),
                    publish_date: release_date(row, &s.paragraph)
                        .and_then(|date| parse_date(&date, DATE_FORMATS)),
                    seeders: seeders.unwrap_or(0),
                    leechers: leechers.unwrap_or(0),
                    info_hash: String::new(),
                    torrent_url: if download_url.is_empty() {
                        String::new()
                    } else {
                        relay_link(&self.public_url, Self::ID, &download_url)
                    },
                })
            })
            .collect()
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> String {
    row.select(selector).next().map(text_of).unwrap_or_default()
}

/// Text after `Lançado:` with single-digit hours zero-padded.
fn release_date(row: ElementRef<'_>, paragraph: &Selector) -> Option<String> {
    let text = row
        .select(paragraph)
        .map(text_of)
        .find(|text| text.contains("Lançado:"))?;
    let caps = RELEASE_DATE.captures(&text)?;
    let date = caps[1].trim();
    Some(SINGLE_DIGIT_HOUR.replace_all(date, " 0$1").into_owned())
}

/// Named inputs of every form on the page, with their default values.
pub(crate) fn form_inputs(html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let Ok(inputs) = selector("form input[name]") else {
        return Vec::new();
    };
    document
        .select(&inputs)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Text of the first `.alert` banner, if the page shows one.
pub(crate) fn alert_message(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let alert = selector(".alert").ok()?;
    let banner = document.select(&alert).next()?;
    let text = text_of(banner);
    Some(if text.is_empty() {
        "login failed: server returned alert".to_string()
    } else {
        text
    })
}

/// Whether a page was served to a logged-in user.
///
/// Any reference to the login page (form action or meta refresh) means the
/// session is gone. Otherwise a logout link must be present: an anchor to
/// the logout page or one labelled "Sair" / "Logout".
pub(crate) fn is_logged_in_page(html: &str) -> bool {
    if html.contains(LOGIN_PAGE) {
        return false;
    }
    let Ok(anchors) = selector("a") else {
        return false;
    };
    let document = Html::parse_document(html);
    let is_logout = |word: &str| word.eq_ignore_ascii_case("sair") || word.eq_ignore_ascii_case("logout");
    document.select(&anchors).any(|a| {
        let href = a.value().attr("href").unwrap_or_default();
        href.contains(LOGOUT_PAGE) || text_of(a).split_whitespace().any(is_logout)
    })
}

fn set_field(fields: &mut Vec<(String, String)>, name: &str, value: &str) {
    fields.retain(|(k, _)| k != name);
    fields.push((name.to_string(), value.to_string()));
}

#[async_trait]
impl LoginFlow for AmigosShareIndexer {
    fn has_credentials(&self) -> bool {
        !self.config.username.is_empty() && !self.config.password.is_empty()
    }

    async fn verify(&self) -> Result<bool, BackendError> {
        let body = self
            .get_text(join_path(&self.config.base_url, SEARCH_PAGE)?)
            .await?;
        Ok(is_logged_in_page(&body))
    }

    async fn login(&self) -> Result<(), BackendError> {
        let login_url = join_path(&self.config.base_url, LOGIN_PAGE)?;

        let form_page = self
            .client
            .get(login_url.clone())
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("GET login page failed: {}", e)))?
            .text()
            .await?;

        let mut fields = form_inputs(&form_page);
        set_field(&mut fields, "username", &self.config.username);
        set_field(&mut fields, "password", &self.config.password);
        set_field(&mut fields, "autologout", "yes");

        let response = self
            .client
            .post(login_url.clone())
            .header(REFERER, login_url.as_str())
            .form(&fields)
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("POST login failed: {}", e)))?;
        let body = response.text().await?;

        if let Some(message) = alert_message(&body) {
            return Err(BackendError::Auth(format!("login error: {}", message)));
        }
        debug!("Amigos Share login form accepted");
        Ok(())
    }
}

#[async_trait]
impl Backend for AmigosShareIndexer {
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
        let html = until_cancelled(cancel, self.search_page(query)).await?;
        let results = self.parse_results(&html);
        debug!(count = results.len(), "Amigos Share search complete");
        Ok(results)
    }

    fn as_authenticated(&self) -> Option<&dyn AuthenticatedBackend> {
        Some(self)
    }
}

#[async_trait]
impl AuthenticatedBackend for AmigosShareIndexer {
    async fn ensure_logged_in(&self) -> Result<(), BackendError> {
        self.session.ensure_logged_in(self).await
    }

    fn http_client(&self) -> &Client {
        &self.client
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }
}
