//! Helpers shared by the indexers.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use scraper::Selector;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::BackendError;

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static PARENTHESIZED_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)[\(](.*?)[\)](.*?)$").unwrap());
static DUBBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(Dual|Nacional|Dublado)").unwrap());

/// Resolve a possibly relative `href` against `base`.
///
/// Returns `href` untouched when either side does not parse.
pub(crate) fn abs_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}

/// Append `path` to the path of `base`, keeping any existing prefix.
pub(crate) fn join_path(base: &str, path: &str) -> Result<Url, BackendError> {
    let mut url = Url::parse(base)
        .map_err(|e| BackendError::Internal(format!("invalid base url {}: {}", base, e)))?;
    let joined = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    Ok(url)
}

/// First run of digits in `s`, or 0.
pub(crate) fn parse_int_from_text(s: &str) -> u32 {
    FIRST_NUMBER
        .find(s)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse a timestamp trying RFC 3339 first, then each `chrono` format.
///
/// Formats containing an offset (`%z`, `%:z`) are honoured, the others are
/// read as UTC. Surrounding quotes are ignored.
pub(crate) fn parse_date(s: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    formats.iter().find_map(|format| {
        if format.contains("%z") || format.contains("%:z") {
            DateTime::parse_from_str(s, format)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        } else {
            NaiveDateTime::parse_from_str(s, format)
                .ok()
                .map(|dt| dt.and_utc())
        }
    })
}

/// Normalise a tracker title.
///
/// Keeps the parenthesised (usually English) part of bilingual titles, appends
/// year, quality and language, and marks dubbed releases as Brazilian.
pub(crate) fn clean_title(title: &str, year: &str, quality: &str, language: &str) -> String {
    let mut title = match PARENTHESIZED_TITLE.captures(title) {
        Some(caps) => format!("{}{}", &caps[2], &caps[3]).trim().to_string(),
        None => title.to_string(),
    };

    if !year.is_empty() {
        title.push(' ');
        title.push_str(year);
    }
    if !quality.is_empty() {
        title.push(' ');
        if quality.eq_ignore_ascii_case("4k") {
            title.push_str("2160p");
        } else {
            title.push_str(quality);
        }
    }
    if !language.is_empty() {
        title.push(' ');
        title.push_str(language);
    }

    DUBBED.replace_all(&title, "Brazilian $1").into_owned()
}

/// Render a JSON scalar as a string. Missing and `null` become empty.
pub(crate) fn json_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Read a JSON number or numeric string as a counter. Anything else is 0.
pub(crate) fn json_u32(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Link that routes a download through this server's relay endpoint.
pub(crate) fn relay_link(public_url: &str, indexer: &str, dl_url: &str) -> String {
    match join_path(public_url, "torrproxy/download") {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("indexer", indexer)
                .append_pair("dl_url", dl_url);
            url.to_string()
        }
        Err(_) => String::new(),
    }
}

/// Compile a CSS selector, reporting failures as backend errors.
pub(crate) fn selector(css: &str) -> Result<Selector, BackendError> {
    Selector::parse(css)
        .map_err(|e| BackendError::Internal(format!("invalid selector {:?}: {}", css, e)))
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackendError::Cancelled),
        result = fut => result,
    }
}

/// HTTP client with the shared defaults of every indexer.
pub(crate) fn build_client(
    timeout_secs: u64,
    user_agent: &str,
    cookies: bool,
    headers: HeaderMap,
) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .cookie_store(cookies)
        .default_headers(headers)
        .build()
        .map_err(|e| BackendError::Internal(format!("failed to build http client: {}", e)))
}

/// Fail with [`BackendError::Upstream`] on 4xx/5xx responses.
pub(crate) fn check_status(
    indexer: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(BackendError::Upstream {
            status: status.as_u16(),
            message: format!("{}: bad response {}", indexer, status.as_u16()),
        });
    }
    Ok(response)
}
