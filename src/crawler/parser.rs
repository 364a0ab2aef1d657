//! Reference extraction from fetched HTML and CSS
//!
//! This module handles parsing fetched payloads to extract:
//! - Hyperlinks, frames and embedded assets, classified by tag and attribute
//! - `url()` and `@import` references in stylesheets, style blocks and
//!   `style` attributes
//! - The page title and the effective base URL

use super::css;
use crate::state::{ContentKind, ResourceKind, ResourceRef};
use crate::url::is_skippable_reference;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracted information from a fetched payload
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// URL that relative references resolve against (honours `<base href>`)
    pub base: Url,

    /// The page title (from the `<title>` tag)
    pub title: Option<String>,

    /// Every reference found, in document order per rule
    pub references: Vec<ResourceRef>,
}

impl ParsedDocument {
    fn empty(base: &Url) -> Self {
        Self {
            base: base.clone(),
            title: None,
            references: Vec::new(),
        }
    }
}

/// Attributes holding a single URL, by selector
const URL_ATTRIBUTES: &[(&str, &str, ResourceKind)] = &[
    ("a[href]", "href", ResourceKind::Document),
    ("area[href]", "href", ResourceKind::Document),
    ("iframe[src]", "src", ResourceKind::Frame),
    ("frame[src]", "src", ResourceKind::Frame),
    ("script[src]", "src", ResourceKind::Script),
    ("img[src]", "src", ResourceKind::Image),
    ("input[src]", "src", ResourceKind::Image),
    ("video[poster]", "poster", ResourceKind::Image),
    ("video[src]", "src", ResourceKind::Media),
    ("audio[src]", "src", ResourceKind::Media),
    ("track[src]", "src", ResourceKind::Media),
    ("embed[src]", "src", ResourceKind::Other),
    ("object[data]", "data", ResourceKind::Other),
    ("[background]", "background", ResourceKind::Image),
];

/// Attributes holding a `srcset` candidate list
const SRCSET_ATTRIBUTES: &[(&str, &str)] = &[
    ("img[srcset]", "srcset"),
    ("source[srcset]", "srcset"),
    ("link[imagesrcset]", "imagesrcset"),
];

/// Extracts references from a fetched payload
///
/// # Extraction Rules
///
/// **HTML:**
/// - `<a>`/`<area>` hyperlinks, `<iframe>`/`<frame>` sources
/// - `<link>` by `rel`: stylesheets, icons, preloads, manifests
///   (`canonical`, `alternate` pages and connection hints are ignored)
/// - `<script src>`, `<img src|srcset>`, `<source src|srcset>`, media
///   sources and posters, `<embed>`, `<object data>`, `background`
/// - `<style>` blocks and `style` attributes, scanned as CSS
///
/// **CSS:** `url(...)` and `@import`
///
/// **Excluded:** empty values, fragment-only anchors, `javascript:`,
/// `mailto:`, `tel:`, `data:` and similar schemes.
///
/// Malformed markup never fails: html5ever recovers what it can and an
/// unreadable fragment simply yields no references.
///
/// # Arguments
///
/// * `body` - Payload bytes
/// * `kind` - How the payload is interpreted
/// * `base_url` - URL the payload was served from
///
/// # Example
///
/// ```
/// use site_mirror::crawler::extract_references;
/// use site_mirror::state::{ContentKind, ResourceKind};
/// use url::Url;
///
/// let html = br#"<html><head><title>Test</title><link rel="stylesheet" href="/a.css"></head></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let parsed = extract_references(html, ContentKind::Html, &base);
/// assert_eq!(parsed.title.as_deref(), Some("Test"));
/// assert_eq!(parsed.references[0].raw, "/a.css");
/// assert_eq!(parsed.references[0].kind, ResourceKind::Stylesheet);
/// ```
pub fn extract_references(body: &[u8], kind: ContentKind, base_url: &Url) -> ParsedDocument {
    match kind {
        ContentKind::Html => parse_html(body, base_url),
        ContentKind::Css => ParsedDocument {
            base: base_url.clone(),
            title: None,
            references: css_references(body, base_url),
        },
        ContentKind::Other => ParsedDocument::empty(base_url),
    }
}

fn parse_html(body: &[u8], base_url: &Url) -> ParsedDocument {
    let text = String::from_utf8_lossy(body);
    let document = Html::parse_document(&text);

    let base = extract_base(&document, base_url).unwrap_or_else(|| base_url.clone());
    let title = extract_title(&document);

    let mut references = Vec::new();
    let mut push = |raw: &str, kind: ResourceKind| {
        if !is_skippable_reference(raw) {
            references.push(ResourceRef::new(raw.trim(), base.clone(), kind));
        }
    };

    for (selector, attr, kind) in URL_ATTRIBUTES {
        for element in select(&document, selector) {
            if *attr == "src" && element.value().name() == "input" && !is_image_input(&element) {
                continue;
            }
            if let Some(value) = element.value().attr(attr) {
                push(value, *kind);
            }
        }
    }

    for element in select(&document, "link[href]") {
        if let (Some(href), Some(kind)) = (element.value().attr("href"), link_kind(&element)) {
            push(href, kind);
        }
    }

    for element in select(&document, "source[src]") {
        if let Some(src) = element.value().attr("src") {
            let in_picture = element
                .parent()
                .and_then(ElementRef::wrap)
                .map(|p| p.value().name() == "picture")
                .unwrap_or(false);
            push(
                src,
                if in_picture {
                    ResourceKind::Image
                } else {
                    ResourceKind::Media
                },
            );
        }
    }

    for (selector, attr) in SRCSET_ATTRIBUTES {
        for element in select(&document, selector) {
            if let Some(value) = element.value().attr(attr) {
                for candidate in srcset_urls(value) {
                    push(candidate, ResourceKind::Image);
                }
            }
        }
    }

    for element in select(&document, "style") {
        let css_text: String = element.text().collect();
        for found in css::scan(css_text.as_bytes()) {
            push(&found.value, found.kind);
        }
    }

    for element in select(&document, "[style]") {
        if let Some(style) = element.value().attr("style") {
            for found in css::scan(style.as_bytes()) {
                push(&found.value, found.kind);
            }
        }
    }

    ParsedDocument {
        base,
        title,
        references,
    }
}

/// Selects elements, treating an unparseable selector as matching nothing
fn select<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => {
            tracing::trace!("Skipping unparseable selector {}", selector);
            Vec::new()
        }
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    select(document, "title")
        .into_iter()
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves the first `<base href>` against the document URL
fn extract_base(document: &Html, base_url: &Url) -> Option<Url> {
    let href = select(document, "base[href]")
        .into_iter()
        .next()?
        .value()
        .attr("href")?
        .trim()
        .to_string();

    if href.is_empty() {
        return None;
    }

    let base = base_url.join(&href).ok()?;
    matches!(base.scheme(), "http" | "https").then_some(base)
}

fn is_image_input(element: &ElementRef) -> bool {
    element
        .value()
        .attr("type")
        .map(|t| t.eq_ignore_ascii_case("image"))
        .unwrap_or(false)
}

/// Classifies a `<link>` by its `rel` (and `as` for preloads)
///
/// Returns `None` for links that do not name a page dependency.
fn link_kind(element: &ElementRef) -> Option<ResourceKind> {
    let rel = element.value().attr("rel")?.to_ascii_lowercase();
    let tokens: Vec<&str> = rel.split_ascii_whitespace().collect();
    let has = |token: &str| tokens.iter().any(|t| *t == token);

    if has("stylesheet") {
        return Some(ResourceKind::Stylesheet);
    }
    if has("icon") || has("apple-touch-icon") || has("apple-touch-icon-precomposed") || has("mask-icon") {
        return Some(ResourceKind::Image);
    }
    if has("modulepreload") {
        return Some(ResourceKind::Script);
    }
    if has("preload") || has("prefetch") {
        let destination = element.value().attr("as").unwrap_or("").to_ascii_lowercase();
        return Some(match destination.as_str() {
            "style" => ResourceKind::Stylesheet,
            "script" | "worker" => ResourceKind::Script,
            "font" => ResourceKind::Font,
            "image" => ResourceKind::Image,
            "audio" | "video" | "track" => ResourceKind::Media,
            "document" => ResourceKind::Frame,
            _ => ResourceKind::Other,
        });
    }
    if has("manifest") {
        return Some(ResourceKind::Other);
    }

    None
}

/// Splits a `srcset` value into its candidate URLs
///
/// # Example
///
/// ```
/// use site_mirror::crawler::srcset_urls;
///
/// assert_eq!(srcset_urls("a.png 1x, b.png 2x"), vec!["a.png", "b.png"]);
/// ```
pub fn srcset_urls(value: &str) -> Vec<&str> {
    srcset_candidates(value)
        .into_iter()
        .map(|(url, _)| url)
        .collect()
}

/// Splits a `srcset` value into `(url, descriptor)` candidates
///
/// A URL runs up to the next whitespace, so commas inside it (as in `data:`
/// URLs) do not split candidates. Trailing commas end a URL without a
/// descriptor; otherwise the descriptor runs to the next comma outside
/// parentheses.
///
/// ```
/// use site_mirror::crawler::srcset_candidates;
///
/// assert_eq!(
///     srcset_candidates("data:image/png;base64,AAA 1x, b.png 2x"),
///     vec![("data:image/png;base64,AAA", "1x"), ("b.png", "2x")]
/// );
/// ```
pub fn srcset_candidates(value: &str) -> Vec<(&str, &str)> {
    let bytes = value.as_bytes();
    let mut candidates = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let url = &value[start..pos];

        if url.ends_with(',') {
            candidates.push((url.trim_end_matches(','), ""));
            continue;
        }

        let descriptor_start = pos;
        let mut parens = 0usize;
        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => parens += 1,
                b')' => parens = parens.saturating_sub(1),
                b',' if parens == 0 => break,
                _ => {}
            }
            pos += 1;
        }
        candidates.push((url, value[descriptor_start..pos].trim()));
    }

    candidates
}

fn css_references(body: &[u8], base_url: &Url) -> Vec<ResourceRef> {
    css::scan(body)
        .into_iter()
        .filter(|found| !is_skippable_reference(&found.value))
        .map(|found| ResourceRef::new(found.value.trim(), base_url.clone(), found.kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn refs(html: &str) -> Vec<(String, ResourceKind)> {
        extract_references(html.as_bytes(), ContentKind::Html, &base_url())
            .references
            .into_iter()
            .map(|r| (r.raw, r.kind))
            .collect()
    }

    fn has(found: &[(String, ResourceKind)], raw: &str, kind: ResourceKind) -> bool {
        found.iter().any(|(r, k)| r == raw && *k == kind)
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        let parsed = extract_references(html.as_bytes(), ContentKind::Html, &base_url());
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body></body></html>"#;
        let parsed = extract_references(html.as_bytes(), ContentKind::Html, &base_url());
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_classifies_by_tag() {
        let html = r#"
            <html><head>
              <link rel="stylesheet" href="style.css">
              <link rel="icon" href="/favicon.ico">
              <link rel="canonical" href="https://example.com/page">
              <script src="app.js"></script>
            </head><body>
              <a href="/about">About</a>
              <img src="logo.png">
              <iframe src="/embed"></iframe>
              <video src="clip.mp4" poster="poster.jpg"></video>
              <object data="movie.swf"></object>
              <table background="bg.gif"></table>
            </body></html>
        "#;
        let found = refs(html);

        assert!(has(&found, "style.css", ResourceKind::Stylesheet));
        assert!(has(&found, "/favicon.ico", ResourceKind::Image));
        assert!(has(&found, "app.js", ResourceKind::Script));
        assert!(has(&found, "/about", ResourceKind::Document));
        assert!(has(&found, "logo.png", ResourceKind::Image));
        assert!(has(&found, "/embed", ResourceKind::Frame));
        assert!(has(&found, "clip.mp4", ResourceKind::Media));
        assert!(has(&found, "poster.jpg", ResourceKind::Image));
        assert!(has(&found, "movie.swf", ResourceKind::Other));
        assert!(has(&found, "bg.gif", ResourceKind::Image));
        assert!(!found.iter().any(|(r, _)| r == "https://example.com/page"));
    }

    #[test]
    fn test_preload_uses_as_attribute() {
        let html = r#"<link rel="preload" href="/f.woff2" as="font"><link rel="modulepreload" href="/m.js">"#;
        let found = refs(html);
        assert!(has(&found, "/f.woff2", ResourceKind::Font));
        assert!(has(&found, "/m.js", ResourceKind::Script));
    }

    #[test]
    fn test_srcset_candidates() {
        let html = r#"<picture><source srcset="a.webp 1x, b.webp 2x"><img src="a.png" srcset="a@2x.png 2x"></picture>"#;
        let found = refs(html);
        assert!(has(&found, "a.webp", ResourceKind::Image));
        assert!(has(&found, "b.webp", ResourceKind::Image));
        assert!(has(&found, "a@2x.png", ResourceKind::Image));
    }

    #[test]
    fn test_srcset_with_data_url() {
        let html = r#"<img srcset="data:image/png;base64,AAA 1x, big.png 2x,small.png">"#;
        let found = refs(html);
        assert_eq!(found.len(), 2);
        assert!(has(&found, "big.png", ResourceKind::Image));
        assert!(has(&found, "small.png", ResourceKind::Image));
        assert!(!found.iter().any(|(raw, _)| raw.starts_with("AAA")));
    }

    #[test]
    fn test_srcset_candidates_grammar() {
        assert_eq!(
            srcset_candidates("a.png,b.png 2x , c.png 100w"),
            vec![("a.png", ""), ("b.png", "2x"), ("c.png", "100w")]
        );
        assert!(srcset_candidates(" , ").is_empty());
    }

    #[test]
    fn test_inline_css() {
        let html = r#"<style>body{background:url(bg.png)} @import "print.css";</style>
                      <div style="background-image: url('hero.jpg')"></div>"#;
        let found = refs(html);
        assert!(has(&found, "bg.png", ResourceKind::Image));
        assert!(has(&found, "print.css", ResourceKind::Stylesheet));
        assert!(has(&found, "hero.jpg", ResourceKind::Image));
    }

    #[test]
    fn test_excludes_special_schemes() {
        let html = r##"
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:+1234567890">Phone</a>
            <a href="#section">Anchor</a>
            <img src="data:image/png;base64,AAAA">
            <a href="">Empty</a>
        "##;
        assert!(refs(html).is_empty());
    }

    #[test]
    fn test_entities_are_decoded() {
        let found = refs(r#"<a href="/search?a=1&amp;b=2">x</a>"#);
        assert!(has(&found, "/search?a=1&b=2", ResourceKind::Document));
    }

    #[test]
    fn test_base_href_is_honoured() {
        let html = r#"<html><head><base href="https://example.com/static/"></head><body><img src="a.png"></body></html>"#;
        let parsed = extract_references(html.as_bytes(), ContentKind::Html, &base_url());
        assert_eq!(parsed.base.as_str(), "https://example.com/static/");
        assert_eq!(parsed.references[0].base.as_str(), "https://example.com/static/");
    }

    #[test]
    fn test_malformed_html_does_not_fail() {
        let html = r#"<html><body><a href="/ok">ok<div><img src="x.png" <p>unclosed"#;
        let found = refs(html);
        assert!(has(&found, "/ok", ResourceKind::Document));
    }

    #[test]
    fn test_css_payload() {
        let css = br#"@import url("base.css"); .a{background:url(../img/a.png)}"#;
        let base = Url::parse("https://example.com/css/site.css").unwrap();
        let parsed = extract_references(css, ContentKind::Css, &base);

        assert_eq!(parsed.references.len(), 2);
        assert_eq!(parsed.references[0].raw, "base.css");
        assert_eq!(parsed.references[0].kind, ResourceKind::Stylesheet);
        assert_eq!(parsed.references[1].raw, "../img/a.png");
        assert_eq!(parsed.references[1].base, base);
    }

    #[test]
    fn test_other_payload_has_no_references() {
        let parsed = extract_references(b"\x89PNG", ContentKind::Other, &base_url());
        assert!(parsed.references.is_empty());
    }
}
