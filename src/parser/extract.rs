use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::ScrapeError;
use crate::record::Candidate;
use crate::settings::{AnchorMode, Settings};

/// Attributes that may carry the link target, in order of preference.
const LINK_ATTRS: &[&str] = &["href", "data-href", "data-url"];
const JS_SCHEME: &str = "javascript:";

pub struct Selectors {
    block: Selector,
    anchor: Selector,
    meta: Selector,
    mode: AnchorMode,
}

impl Selectors {
    pub fn new(block: &str, anchor: &str, meta: &str, mode: AnchorMode) -> Result<Self, ScrapeError> {
        Ok(Selectors {
            block: compile(block)?,
            anchor: compile(anchor)?,
            meta: compile(meta)?,
            mode,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ScrapeError> {
        Self::new(
            &settings.block_selector,
            &settings.anchor_selector,
            &settings.meta_selector,
            settings.anchor_mode,
        )
    }
}

fn compile(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Parse(format!("invalid selector '{}': {}", selector, e)))
}

/// Walk the collection blocks in document order and pull out their links.
pub fn extract(html: &str, selectors: &Selectors) -> Result<Vec<Candidate>, ScrapeError> {
    if html.trim().is_empty() {
        return Err(ScrapeError::Parse("empty document".into()));
    }
    if !html.contains('<') {
        return Err(ScrapeError::Parse("response contains no markup".into()));
    }

    let document = Html::parse_document(html);
    let mut candidates = Vec::new();
    let mut blocks = 0;

    for (block_index, block) in document.select(&selectors.block).enumerate() {
        blocks += 1;
        let anchors = anchors_in(block, selectors);
        if anchors.is_empty() {
            debug!(block_index, "block has no anchor, skipping");
            continue;
        }

        let date_hint = date_hint(block, &selectors.meta);
        for anchor in anchors {
            let Some(url) = link_target(anchor) else {
                debug!(block_index, "anchor without link target, skipping");
                continue;
            };
            candidates.push(Candidate {
                url,
                title: text_of(anchor),
                date_hint: date_hint.clone(),
                block_index,
            });
        }
    }

    if blocks == 0 {
        warn!("no collection blocks on the page, has the layout changed?");
    }
    Ok(candidates)
}

fn anchors_in<'a>(block: ElementRef<'a>, selectors: &Selectors) -> Vec<ElementRef<'a>> {
    // The live page puts the block class on the <a> itself.
    if selectors.anchor.matches(&block) {
        return vec![block];
    }
    match selectors.mode {
        AnchorMode::First => block.select(&selectors.anchor).take(1).collect(),
        AnchorMode::All => block.select(&selectors.anchor).collect(),
    }
}

fn link_target(anchor: ElementRef) -> Option<String> {
    LINK_ATTRS.iter().find_map(|name| {
        anchor
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|v| !is_placeholder(v))
            .map(String::from)
    })
}

/// Values scripted pages leave in `href` when the real target lives elsewhere.
fn is_placeholder(value: &str) -> bool {
    value.is_empty()
        || value.starts_with('#')
        || value
            .get(..JS_SCHEME.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(JS_SCHEME))
}

/// Meta text inside the block, else from the block's next element sibling.
fn date_hint(block: ElementRef, meta: &Selector) -> Option<String> {
    if let Some(inner) = block.select(meta).next() {
        return Some(text_of(inner));
    }
    block
        .next_siblings()
        .find_map(ElementRef::wrap)
        .filter(|sibling| meta.matches(sibling))
        .map(text_of)
}

fn text_of(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Selectors {
        Selectors::new(".fs-collect", "a", ".fs-meta", AnchorMode::First).unwrap()
    }

    #[test]
    fn first_anchor_per_block() {
        let html = r#"
            <div class="fs-collect"><a href="/a">Spins</a><a href="/ignored">x</a></div>
            <div class="fs-collect"><a href="https://x.com/b">Coins</a></div>
            <div class="fs-collect"><span>no link here</span></div>"#;
        let c = extract(html, &defaults()).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].url, "/a");
        assert_eq!(c[0].title, "Spins");
        assert_eq!(c[0].block_index, 0);
        assert_eq!(c[1].url, "https://x.com/b");
        assert_eq!(c[1].block_index, 1);
    }

    #[test]
    fn all_anchor_mode() {
        let html = r#"<div class="fs-collect"><a href="/1">one</a><a href="/2">two</a></div>"#;
        let sel = Selectors::new(".fs-collect", "a", ".fs-meta", AnchorMode::All).unwrap();
        let urls: Vec<_> = extract(html, &sel).unwrap().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, ["/1", "/2"]);
    }

    #[test]
    fn block_that_is_the_anchor() {
        let html = r#"<a class="fs-collect" href="/?gift=123"> 25 <b>Free</b> Spins </a>"#;
        let c = extract(html, &defaults()).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].url, "/?gift=123");
        assert_eq!(c[0].title, "25 Free Spins");
    }

    #[test]
    fn data_attribute_fallbacks() {
        let html = r#"
            <div class="fs-collect"><a data-href="/from-data-href">a</a></div>
            <div class="fs-collect"><a href="  " data-url="/from-data-url">b</a></div>
            <div class="fs-collect"><a>c</a></div>"#;
        let urls: Vec<_> = extract(html, &defaults()).unwrap().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, ["/from-data-href", "/from-data-url"]);
    }

    #[test]
    fn placeholder_href_defers_to_data_attributes() {
        let html = r##"
            <a class="fs-collect" href="javascript:void(0)" data-href="/?gift=1">a</a>
            <a class="fs-collect" href="#" data-url="/?gift=2">b</a>
            <a class="fs-collect" href="JavaScript:open()">c</a>
            <a class="fs-collect" href="#top">d</a>"##;
        let urls: Vec<_> = extract(html, &defaults()).unwrap().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, ["/?gift=1", "/?gift=2"]);
    }

    #[test]
    fn meta_inside_and_beside_block() {
        let html = r#"
            <div class="fs-collect"><a href="/a">a</a><span class="fs-meta">Posted 2024-05-01</span></div>
            <a class="fs-collect" href="/b">b</a><small class="fs-meta">2024-06-02</small>
            <a class="fs-collect" href="/c">c</a><small>2024-07-03</small>"#;
        let c = extract(html, &defaults()).unwrap();
        assert_eq!(c[0].date_hint.as_deref(), Some("Posted 2024-05-01"));
        assert_eq!(c[1].date_hint.as_deref(), Some("2024-06-02"));
        assert_eq!(c[2].date_hint, None);
    }

    #[test]
    fn invalid_selector_is_a_parse_error() {
        assert!(matches!(
            Selectors::new("div[", "a", ".fs-meta", AnchorMode::First),
            Err(ScrapeError::Parse(_))
        ));
    }

    #[test]
    fn non_markup_is_a_parse_error() {
        assert!(matches!(extract("   ", &defaults()), Err(ScrapeError::Parse(_))));
        assert!(matches!(extract("{\"ok\":true}", &defaults()), Err(ScrapeError::Parse(_))));
    }

    #[test]
    fn page_without_blocks_yields_nothing() {
        let c = extract("<html><body><p>maintenance</p></body></html>", &defaults()).unwrap();
        assert!(c.is_empty());
    }
}
