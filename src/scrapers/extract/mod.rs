//! Candidate extraction: the ordered multi-strategy discovery chain.
//!
//! Page-local strategies run over one parsed page. Keyword-gated secondary
//! pages sit between the frame scan and the script scan in the chain; they
//! are fetched through a [`PageFetcher`] and only the anchor and frame
//! strategies are re-applied to them.
//!
//! Parsed documents are never held across an await: `scraper::Html` is
//! not `Send`, so each page is parsed, scanned into owned strings, and
//! dropped before the next fetch.

pub mod resolve;
pub mod strategies;

use std::collections::HashSet;

use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

pub use resolve::{has_pdf_suffix, host_matches, resolve_link, resolve_pdf_link};
pub use strategies::{default_chain, Strategy, PROBE_SELECTORS};

use super::config::{root_domain, SiteProfile};
use super::http_client::PageFetcher;
use crate::models::{Candidate, CandidateSet, StrategyKind};

/// Link target or text fragments that make a page worth a secondary visit.
pub const SECONDARY_PAGE_KEYWORDS: &[&str] = &[
    "volantino",
    "volantini",
    "offerte",
    "flyer",
    "leaflet",
    "promozioni",
    "promo",
    "sfoglia",
];

/// Extensions that are never HTML pages.
const NON_PAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".zip", ".doc", ".docx", ".xls", ".mp4",
];

pub const DEFAULT_MAX_SECONDARY_PAGES: usize = 10;

/// Run-scoped discovery state shared across seed pages.
#[derive(Debug, Default)]
pub struct DiscoveryState {
    pub candidates: CandidateSet,
    visited_pages: HashSet<String>,
}

impl DiscoveryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a page as fetched so it is not visited again as a secondary page.
    pub fn mark_visited(&mut self, url: &str) {
        self.visited_pages.insert(normalize_page_url(url));
    }
}

/// What discovery on one seed page produced.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// New candidates added to the set.
    pub added: usize,
    /// Secondary pages attempted.
    pub secondary_pages: Vec<String>,
    /// Secondary pages that could not be fetched, with the reason.
    pub failed_pages: Vec<(String, String)>,
}

/// Ordered chain of discovery strategies.
pub struct CandidateExtractor {
    strategies: Vec<Box<dyn Strategy>>,
    keywords: Vec<String>,
    allowed_domain: String,
    max_secondary_pages: usize,
}

impl CandidateExtractor {
    pub fn new(extra_selectors: &[String]) -> Self {
        Self {
            strategies: default_chain(extra_selectors),
            keywords: SECONDARY_PAGE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            allowed_domain: String::new(),
            max_secondary_pages: DEFAULT_MAX_SECONDARY_PAGES,
        }
    }

    pub fn for_profile(profile: &SiteProfile) -> Self {
        Self::new(&profile.selectors)
            .with_allowed_domain(&profile.allowed_domain)
            .with_max_secondary_pages(profile.max_secondary_pages)
    }

    /// Allow secondary pages on this domain and its subdomains, in addition
    /// to the domain of the page the link was found on.
    pub fn with_allowed_domain(mut self, domain: &str) -> Self {
        self.allowed_domain = domain.to_string();
        self
    }

    pub fn with_max_secondary_pages(mut self, max: usize) -> Self {
        self.max_secondary_pages = max;
        self
    }

    /// Run every page-local strategy over one page, without following links.
    pub fn extract_page(&self, html: &str, page_url: &str) -> Vec<Candidate> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let (results, _) = self.scan_page(html, &base, false);

        let mut set = CandidateSet::new();
        for (kind, urls) in results {
            for url in urls {
                set.insert(Candidate::new(url, kind, page_url));
            }
        }
        set.into_vec()
    }

    /// Discover candidates on a fetched page.
    ///
    /// With `depth` 1, keyword-gated secondary pages are fetched through
    /// `fetcher`; failures there are logged and skipped. Deeper budgets
    /// are treated as 1.
    pub async fn discover<F>(
        &self,
        html: &str,
        page_url: &str,
        depth: u32,
        fetcher: &F,
        state: &mut DiscoveryState,
    ) -> DiscoveryReport
    where
        F: PageFetcher + ?Sized,
    {
        let mut report = DiscoveryReport::default();
        let Ok(base) = Url::parse(page_url) else {
            warn!("Cannot discover on invalid page URL {}", page_url);
            return report;
        };
        state.mark_visited(page_url);

        let (results, secondary_links) = self.scan_page(html, &base, depth > 0);

        for (kind, urls) in results.iter().filter(|(k, _)| *k < StrategyKind::SecondaryPage) {
            report.added += insert_all(state, urls, *kind, page_url);
        }

        if depth > 0 {
            for link in secondary_links {
                if report.secondary_pages.len() >= self.max_secondary_pages {
                    debug!(
                        "Secondary page limit ({}) reached on {}",
                        self.max_secondary_pages, page_url
                    );
                    break;
                }
                if !state.visited_pages.insert(normalize_page_url(&link)) {
                    continue;
                }
                report.secondary_pages.push(link.clone());

                match fetcher.fetch_page(&link).await {
                    Ok(sub_html) => {
                        let urls = self.scan_secondary_page(&sub_html, &link);
                        let added = insert_all(state, &urls, StrategyKind::SecondaryPage, &link);
                        debug!("Secondary page {} yielded {} new candidates", link, added);
                        report.added += added;
                    }
                    Err(e) => {
                        warn!("Skipping secondary page {}: {}", link, e);
                        report.failed_pages.push((link, e.to_string()));
                    }
                }
            }
        }

        for (kind, urls) in results.iter().filter(|(k, _)| *k > StrategyKind::SecondaryPage) {
            report.added += insert_all(state, urls, *kind, page_url);
        }

        report
    }

    /// Parse once, run the chain, and collect secondary links when asked.
    fn scan_page(
        &self,
        html: &str,
        base: &Url,
        collect_secondary: bool,
    ) -> (Vec<(StrategyKind, Vec<String>)>, Vec<String>) {
        let document = Html::parse_document(html);

        let results: Vec<(StrategyKind, Vec<String>)> = self
            .strategies
            .iter()
            .map(|strategy| {
                let urls = strategy.extract(&document, base);
                if !urls.is_empty() {
                    debug!("{} found {} links on {}", strategy.kind(), urls.len(), base);
                }
                (strategy.kind(), urls)
            })
            .collect();

        let secondary = if collect_secondary {
            self.secondary_links(&document, base)
        } else {
            Vec::new()
        };

        (results, secondary)
    }

    fn scan_secondary_page(&self, html: &str, page_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut urls = Vec::new();
        for strategy in self.strategies.iter().filter(|s| s.applies_to_secondary_pages()) {
            for url in strategy.extract(&document, &base) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls
    }

    /// Aggregator seeds keep their own domain, so the page's root domain
    /// counts as well as the profile-wide one.
    fn is_allowed_host(&self, url: &Url, page_domain: &str) -> bool {
        host_matches(url, &self.allowed_domain)
            || (!page_domain.is_empty() && host_matches(url, page_domain))
    }

    /// Same-site anchors whose target path or visible text mentions a keyword.
    fn secondary_links(&self, document: &Html, base: &Url) -> Vec<String> {
        let Ok(selector) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        let page_key = normalize_page_url(base.as_str());
        let page_domain = root_domain(base.as_str());
        let mut links: Vec<String> = Vec::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_link(base, href) else {
                continue;
            };
            if has_pdf_suffix(&url) || !self.is_allowed_host(&url, &page_domain) {
                continue;
            }
            let path = url.path().to_lowercase();
            if NON_PAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
                continue;
            }

            // The host is excluded: aggregator domains often contain a keyword.
            let target = format!("{}?{}", path, url.query().unwrap_or_default().to_lowercase());
            let text = element.text().collect::<String>().to_lowercase();
            let matches = self
                .keywords
                .iter()
                .any(|k| target.contains(k.as_str()) || text.contains(k.as_str()));
            if !matches {
                continue;
            }

            let url = url.to_string();
            if normalize_page_url(&url) != page_key && !links.contains(&url) {
                links.push(url);
            }
        }

        links
    }
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::new(&[])
    }
}

fn insert_all(state: &mut DiscoveryState, urls: &[String], kind: StrategyKind, found_on: &str) -> usize {
    urls.iter()
        .filter(|url| state.candidates.insert(Candidate::new(url.as_str(), kind, found_on)))
        .count()
}

/// Page identity ignoring fragments and a trailing slash.
fn normalize_page_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::scrapers::http_client::HttpError;

    /// Serves canned pages and records what was requested.
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, HttpError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| HttpError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    const BASE: &str = "https://shop.example.com/";

    fn urls(state: &DiscoveryState) -> Vec<String> {
        state.candidates.iter().map(|c| c.url.clone()).collect()
    }

    #[test]
    fn test_anchor_and_iframe_scenario() {
        let html = r#"<a href="/promo/vol1.pdf">Volantino</a>
                      <iframe src="https://cdn.example.com/vol2.pdf"></iframe>"#;
        let found: Vec<String> = CandidateExtractor::default()
            .extract_page(html, BASE)
            .into_iter()
            .map(|c| c.url)
            .collect();
        assert_eq!(
            found,
            vec![
                "https://shop.example.com/promo/vol1.pdf",
                "https://cdn.example.com/vol2.pdf"
            ]
        );
    }

    #[test]
    fn test_recall_exactly_n_distinct_anchors() {
        let mut html = String::new();
        for i in 0..25 {
            html.push_str(&format!("<a href=\"/flyers/f{i}.pdf\">f{i}</a>"));
            html.push_str(&format!("<a href=\"{BASE}flyers/f{i}.pdf\">again</a>"));
        }
        let found = CandidateExtractor::default().extract_page(&html, BASE);
        assert_eq!(found.len(), 25);
        assert!(found.iter().all(|c| c.strategy == StrategyKind::DirectAnchor));
    }

    #[test]
    fn test_union_not_first_match() {
        let html = r#"
            <head><meta name="x" content="/m.pdf"></head>
            <a href="/a.pdf">a</a>
            <script>open("/s.pdf")</script>
            <div data-pdf="/p.pdf"></div>
        "#;
        let found = CandidateExtractor::default().extract_page(html, BASE);
        let kinds: Vec<StrategyKind> = found.iter().map(|c| c.strategy).collect();
        assert_eq!(
            kinds,
            vec![
                StrategyKind::DirectAnchor,
                StrategyKind::InlineScript,
                StrategyKind::SelectorProbe,
                StrategyKind::MetaTag
            ]
        );
    }

    #[test]
    fn test_invalid_base_yields_nothing() {
        assert!(CandidateExtractor::default()
            .extract_page("<a href='a.pdf'>x</a>", "not a url")
            .is_empty());
    }

    #[tokio::test]
    async fn test_secondary_pages_followed_once() {
        let seed = r#"
            <a href="/volantini/settimana">Sfoglia il volantino</a>
            <a href="/volantini/settimana#top">Again</a>
            <a href="/chi-siamo">Chi siamo</a>
            <a href="https://other.org/offerte">Partner offers</a>
            <a href="/promo/direct.pdf">PDF</a>
        "#;
        let sub = r#"<a href="/files/sub.pdf">Scarica</a><script>x('/files/ignored.pdf')</script>"#;
        let fetcher = StubFetcher::default()
            .with_page("https://shop.example.com/volantini/settimana", sub);

        let extractor = CandidateExtractor::default().with_allowed_domain("example.com");
        let mut state = DiscoveryState::new();
        let report = extractor.discover(seed, BASE, 1, &fetcher, &mut state).await;

        assert_eq!(
            fetcher.requested(),
            vec!["https://shop.example.com/volantini/settimana"]
        );
        assert_eq!(
            urls(&state),
            vec![
                "https://shop.example.com/promo/direct.pdf",
                "https://shop.example.com/files/sub.pdf"
            ]
        );
        assert_eq!(report.added, 2);
        let sub_candidate = state.candidates.iter().nth(1).unwrap();
        assert_eq!(sub_candidate.strategy, StrategyKind::SecondaryPage);
        assert_eq!(sub_candidate.found_on, "https://shop.example.com/volantini/settimana");
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_nothing() {
        let seed = r#"<a href="/offerte">Offerte</a><a href="/x.pdf">x</a>"#;
        let fetcher = StubFetcher::default();
        let mut state = DiscoveryState::new();
        CandidateExtractor::default()
            .discover(seed, BASE, 0, &fetcher, &mut state)
            .await;
        assert!(fetcher.requested().is_empty());
        assert_eq!(state.candidates.len(), 1);
    }

    #[tokio::test]
    async fn test_secondary_failures_are_skipped() {
        let seed = r#"<a href="/offerte/1">uno</a><a href="/offerte/2">due</a>"#;
        let fetcher =
            StubFetcher::default().with_page("https://shop.example.com/offerte/2", "<a href='two.pdf'>2</a>");
        let mut state = DiscoveryState::new();
        let report = CandidateExtractor::default()
            .discover(seed, BASE, 1, &fetcher, &mut state)
            .await;

        assert_eq!(report.failed_pages.len(), 1);
        assert_eq!(urls(&state), vec!["https://shop.example.com/offerte/two.pdf"]);
    }

    #[tokio::test]
    async fn test_secondary_page_cap() {
        let mut seed = String::new();
        for i in 0..20 {
            seed.push_str(&format!("<a href=\"/promo/{i}\">promo {i}</a>"));
        }
        let fetcher = StubFetcher::default();
        let mut state = DiscoveryState::new();
        let report = CandidateExtractor::default()
            .with_max_secondary_pages(3)
            .discover(&seed, BASE, 1, &fetcher, &mut state)
            .await;
        assert_eq!(report.secondary_pages.len(), 3);
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_visited_pages_shared_across_seeds() {
        let seed = r#"<a href="/offerte">Offerte</a>"#;
        let fetcher = StubFetcher::default().with_page("https://shop.example.com/offerte", "");
        let extractor = CandidateExtractor::default();
        let mut state = DiscoveryState::new();
        extractor.discover(seed, BASE, 1, &fetcher, &mut state).await;
        extractor
            .discover(seed, "https://shop.example.com/volantini", 1, &fetcher, &mut state)
            .await;
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn test_aggregator_seed_follows_its_own_domain() {
        let seed = r#"
            <a href="/eurospin/volantino-settimana">Volantino Eurospin</a>
            <a href="https://www.eurospin.it/offerte">Offerte</a>
            <a href="https://other.org/offerte">Altre offerte</a>
        "#;
        let fetcher = StubFetcher::default();
        let extractor = CandidateExtractor::default().with_allowed_domain("eurospin.it");
        let mut state = DiscoveryState::new();
        extractor
            .discover(seed, "https://www.volantinofacile.it/eurospin", 1, &fetcher, &mut state)
            .await;

        assert_eq!(
            fetcher.requested(),
            vec![
                "https://www.volantinofacile.it/eurospin/volantino-settimana",
                "https://www.eurospin.it/offerte",
            ]
        );
    }

    #[test]
    fn test_host_keyword_does_not_gate() {
        let extractor = CandidateExtractor::default();
        let base = Url::parse("https://ultimivolantini.it/").unwrap();
        let document = Html::parse_document(r#"<a href="/contatti">Contatti</a><a href="/lidl">Lidl volantino</a>"#);
        assert_eq!(
            extractor.secondary_links(&document, &base),
            vec!["https://ultimivolantini.it/lidl"]
        );
    }
}
