//! Link resolution against a page base URL.

use url::Url;

/// Resolve a raw attribute value to an absolute http(s) URL.
///
/// Handles absolute, protocol-relative, root-relative and path-relative
/// forms. Fragments are dropped so `a.pdf#page=2` and `a.pdf` collapse.
pub fn resolve_link(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || is_non_navigational(raw) {
        return None;
    }

    let mut url = base.join(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Links that can never point at a fetchable page or document.
pub fn is_non_navigational(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
}

/// Whether the URL path ends in `.pdf` (query and fragment ignored).
pub fn has_pdf_suffix(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Same test on an unresolved attribute value.
pub fn raw_has_pdf_suffix(raw: &str) -> bool {
    let path = raw.trim().split(['?', '#']).next().unwrap_or_default();
    path.to_ascii_lowercase().ends_with(".pdf")
}

/// Resolve `raw` and keep it only if it names a PDF.
pub fn resolve_pdf_link(base: &Url, raw: &str) -> Option<String> {
    resolve_link(base, raw)
        .filter(has_pdf_suffix)
        .map(|u| u.to_string())
}

/// Whether `url`'s host is `domain` or one of its subdomains.
pub fn host_matches(url: &Url, domain: &str) -> bool {
    if domain.is_empty() {
        return true;
    }
    match url.host_str() {
        Some(host) => {
            let host = host.to_ascii_lowercase();
            let domain = domain.to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{}", domain))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example.com/offerte/index.html").unwrap()
    }

    #[test]
    fn test_relative_and_absolute_forms_collapse() {
        let a = resolve_pdf_link(&base(), "/promo/vol1.pdf");
        let b = resolve_pdf_link(&base(), "https://shop.example.com/promo/vol1.pdf");
        let c = resolve_pdf_link(&base(), "../promo/vol1.pdf#page=3");
        assert_eq!(a.as_deref(), Some("https://shop.example.com/promo/vol1.pdf"));
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_path_relative_and_protocol_relative() {
        assert_eq!(
            resolve_pdf_link(&base(), "vol.pdf").as_deref(),
            Some("https://shop.example.com/offerte/vol.pdf")
        );
        assert_eq!(
            resolve_pdf_link(&base(), "//cdn.example.com/x.PDF").as_deref(),
            Some("https://cdn.example.com/x.PDF")
        );
    }

    #[test]
    fn test_query_string_ignored_for_suffix() {
        assert_eq!(
            resolve_pdf_link(&base(), "/files/volantino.pdf?v=2").as_deref(),
            Some("https://shop.example.com/files/volantino.pdf?v=2")
        );
        assert!(resolve_pdf_link(&base(), "/download?file=volantino.pdf").is_none());
        assert!(raw_has_pdf_suffix("/a/b.Pdf?x=1"));
        assert!(!raw_has_pdf_suffix("/a/b.pdf.html"));
    }

    #[test]
    fn test_non_navigational_links_rejected() {
        for raw in ["#top", "javascript:void(0)", "mailto:a@b.it", "tel:+39", "", "  "] {
            assert!(resolve_link(&base(), raw).is_none(), "{raw}");
        }
        assert!(resolve_link(&base(), "ftp://example.com/a.pdf").is_none());
    }

    #[test]
    fn test_host_matches_subdomains() {
        let url = Url::parse("https://volantini.example.com/x").unwrap();
        assert!(host_matches(&url, "example.com"));
        assert!(host_matches(&url, ""));
        assert!(!host_matches(&url, "ample.com"));
        assert!(!host_matches(&url, "other.it"));
    }
}
