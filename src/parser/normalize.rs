use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::record::{Candidate, Record};

static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
static WEB_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://[^\s/?#]+").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

/// Run-wide inputs for turning candidates into records.
pub struct Context<'a> {
    pub source: &'a Url,
    pub default_title: &'a str,
    pub run_date: NaiveDate,
}

pub fn normalize(candidates: Vec<Candidate>, ctx: &Context) -> Vec<Record> {
    candidates
        .into_iter()
        .filter_map(|c| {
            let Some(url) = resolve_url(&c.url, ctx.source) else {
                debug!(block = c.block_index, href = %c.url, "not an http(s) link, skipping");
                return None;
            };
            Some(Record {
                date: derive_date(c.date_hint.as_deref(), ctx.run_date),
                title: normalize_title(&c.title, ctx.default_title),
                url,
                source: ctx.source.as_str().to_string(),
            })
        })
        .collect()
}

/// Make `href` absolute against the page it was found on. Only http(s) survives.
pub fn resolve_url(href: &str, source: &Url) -> Option<String> {
    let href = href.trim();
    let resolved = if let Some(rest) = href.strip_prefix("//") {
        format!("{}://{}", source.scheme(), rest)
    } else if href.starts_with('/') {
        format!("{}{}", source.origin().ascii_serialization(), href)
    } else if SCHEME_RE.is_match(href) {
        href.to_string()
    } else {
        source.join(href).ok()?.to_string()
    };

    is_web_url(&resolved).then_some(resolved)
}

fn is_web_url(url: &str) -> bool {
    WEB_URL_RE.is_match(url)
        && Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
            .unwrap_or(false)
}

pub fn normalize_title(raw: &str, default_title: &str) -> String {
    let title = raw.trim();
    if title.is_empty() {
        default_title.to_string()
    } else {
        title.to_string()
    }
}

/// First valid `YYYY-MM-DD` in the hint, else the run date.
pub fn derive_date(hint: Option<&str>, run_date: NaiveDate) -> String {
    hint.and_then(|text| {
        DATE_RE
            .find_iter(text)
            .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
    })
    .unwrap_or(run_date)
    .format("%Y-%m-%d")
    .to_string()
}
