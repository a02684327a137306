//! Page-local discovery strategies.
//!
//! Each strategy inspects one parsed page and returns resolved absolute
//! PDF URLs. Strategies never fetch anything; the keyword-gated secondary
//! page step lives in the extractor because it needs the network.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::resolve::{raw_has_pdf_suffix, resolve_pdf_link};
use crate::models::StrategyKind;

/// Quoted strings ending in `.pdf`, optionally followed by a query string.
static QUOTED_PDF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']([^"'<>\s]+?\.pdf(?:\?[^"'<>\s]*)?)["']"#).unwrap()
});

/// Selectors probed on every page, in addition to per-site ones.
pub const PROBE_SELECTORS: &[&str] = &[
    ".volantino-link",
    ".leaflet-link",
    ".flyer-link",
    ".btn-volantino",
    ".button-volantino",
    ".volantino-btn",
    "#volantino-link",
    "#leaflet-link",
    "#flyer-link",
    "[data-pdf]",
    "[data-url]",
    "[data-href]",
    "[data-link]",
    "[data-volantino]",
    "[data-leaflet]",
    "[data-flyer]",
    ".elementor-image",
];

/// One step of the discovery chain.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Resolved absolute PDF URLs found on the page, in document order.
    fn extract(&self, document: &Html, base: &Url) -> Vec<String>;

    /// Whether the strategy is re-applied to keyword-gated secondary pages.
    fn applies_to_secondary_pages(&self) -> bool {
        false
    }
}

/// Select all elements matching `css`; an unparsable selector matches nothing.
fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}

/// `a[href]` targets ending in `.pdf`.
pub struct DirectAnchors;

impl Strategy for DirectAnchors {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectAnchor
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut urls = Vec::new();
        for element in select_all(document, "a[href]") {
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_pdf_link(base, href))
            {
                push_unique(&mut urls, url);
            }
        }
        urls
    }

    fn applies_to_secondary_pages(&self) -> bool {
        true
    }
}

/// `iframe`, `embed` and `object` sources ending in `.pdf`.
pub struct EmbeddedFrames;

impl Strategy for EmbeddedFrames {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EmbeddedFrame
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut urls = Vec::new();
        for element in select_all(document, "iframe[src], embed[src], object[data]") {
            let value = element.value();
            let src = value.attr("src").or_else(|| value.attr("data"));
            if let Some(url) = src.and_then(|s| resolve_pdf_link(base, s)) {
                push_unique(&mut urls, url);
            }
        }
        urls
    }

    fn applies_to_secondary_pages(&self) -> bool {
        true
    }
}

/// Quoted `.pdf` strings inside `onclick` handlers and inline scripts.
pub struct InlineScripts;

impl InlineScripts {
    fn scan(text: &str, base: &Url, urls: &mut Vec<String>) {
        // JSON blobs escape slashes
        let text = text.replace("\\/", "/");
        for capture in QUOTED_PDF.captures_iter(&text) {
            if let Some(url) = capture.get(1).and_then(|m| resolve_pdf_link(base, m.as_str())) {
                push_unique(urls, url);
            }
        }
    }
}

impl Strategy for InlineScripts {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InlineScript
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut urls = Vec::new();

        for element in select_all(document, "[onclick]") {
            if let Some(handler) = element.value().attr("onclick") {
                Self::scan(handler, base, &mut urls);
            }
        }

        for element in select_all(document, "script") {
            let body: String = element.text().collect();
            if !body.trim().is_empty() {
                Self::scan(&body, base, &mut urls);
            }
        }

        urls
    }
}

/// Known flyer widgets: every attribute of the widget and of its
/// `a`/`img` descendants is checked for a `.pdf` value.
pub struct SelectorProbe {
    selectors: Vec<String>,
}

impl SelectorProbe {
    pub fn new(extra_selectors: &[String]) -> Self {
        let mut selectors: Vec<String> = PROBE_SELECTORS.iter().map(|s| s.to_string()).collect();
        for extra in extra_selectors {
            if !selectors.contains(extra) {
                selectors.push(extra.clone());
            }
        }
        Self { selectors }
    }

    fn scan_attributes(element: ElementRef<'_>, base: &Url, urls: &mut Vec<String>) {
        for (_, value) in element.value().attrs() {
            if raw_has_pdf_suffix(value) {
                if let Some(url) = resolve_pdf_link(base, value) {
                    push_unique(urls, url);
                }
            }
        }
    }
}

impl Default for SelectorProbe {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl Strategy for SelectorProbe {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SelectorProbe
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<String> {
        let descendants = Selector::parse("a, img").ok();
        let mut urls = Vec::new();

        for css in &self.selectors {
            for element in select_all(document, css) {
                Self::scan_attributes(element, base, &mut urls);
                if let Some(ref descendants) = descendants {
                    for child in element.select(descendants) {
                        Self::scan_attributes(child, base, &mut urls);
                    }
                }
            }
        }

        urls
    }
}

/// `meta[content]` values ending in `.pdf`.
pub struct MetaTags;

impl Strategy for MetaTags {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MetaTag
    }

    fn extract(&self, document: &Html, base: &Url) -> Vec<String> {
        let mut urls = Vec::new();
        for element in select_all(document, "meta[content]") {
            if let Some(url) = element
                .value()
                .attr("content")
                .and_then(|c| resolve_pdf_link(base, c))
            {
                push_unique(&mut urls, url);
            }
        }
        urls
    }
}

/// The page-local chain in order, with per-site probe selectors.
pub fn default_chain(extra_selectors: &[String]) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(DirectAnchors),
        Box::new(EmbeddedFrames),
        Box::new(InlineScripts),
        Box::new(SelectorProbe::new(extra_selectors)),
        Box::new(MetaTags),
    ]
}
