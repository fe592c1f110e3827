//! Hyperlink extraction from fetched pages.

use scraper::{Html, Selector};
use url::Url;

/// Extracts every `a[href]` target from `html`, resolved against
/// `page_url` and with fragments discarded. Non-navigational schemes
/// (mailto, tel, javascript) and bare fragments are skipped. Duplicates are
/// left in; the frontier deduplicates on offer.
pub fn extract_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").unwrap();

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve(&base, href))
        .collect()
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    if href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);

    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://example.com/docs/index.html";

    #[test]
    fn resolves_relative_links() {
        let html = r#"<html><body>
            <a href="report.pdf">report</a>
            <a href="/docs/other/">other</a>
            <a href="https://example.com/docs/abs.pdf">abs</a>
        </body></html>"#;
        let links = extract_links(html, PAGE);
        assert_eq!(
            links,
            vec![
                "https://example.com/docs/report.pdf",
                "https://example.com/docs/other/",
                "https://example.com/docs/abs.pdf",
            ]
        );
    }

    #[test]
    fn discards_fragments() {
        let html = r#"<a href="page.html#section-2">jump</a>"#;
        let links = extract_links(html, PAGE);
        assert_eq!(links, vec!["https://example.com/docs/page.html"]);
    }

    #[test]
    fn skips_non_navigational_schemes() {
        let html = r##"
            <a href="#top">top</a>
            <a href="mailto:a@example.com">mail</a>
            <a href="tel:+123">call</a>
            <a href="javascript:void(0)">js</a>
            <a href="ftp://example.com/file">ftp</a>
        "##;
        assert!(extract_links(html, PAGE).is_empty());
    }

    #[test]
    fn malformed_hrefs_are_ignored() {
        let html = r#"<a href="https://">broken</a><a href="ok.html">ok</a>"#;
        let links = extract_links(html, PAGE);
        assert_eq!(links, vec!["https://example.com/docs/ok.html"]);
    }
}
