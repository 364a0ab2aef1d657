//! CSS reference scanning shared by the parser and the rewriter
//!
//! Finds `url(...)` and `@import "..."` occurrences in stylesheet bytes,
//! style blocks and `style` attributes.

use crate::state::ResourceKind;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::ops::Range;

/// `url(...)` with a double-quoted, single-quoted or bare value
static URL_FUNCTION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^"'()\s][^()\s]*))\s*\)"#).ok()
});

/// `@import "..."` with a quoted string (the `url()` form is found above)
static IMPORT_STRING: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).ok());

/// `@import` followed only by whitespace, checked before a `url(` match
static IMPORT_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)@import\s*$").ok());

/// A URL occurrence inside CSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    /// Byte range of the URL value, excluding quotes
    pub span: Range<usize>,

    /// The URL value as written
    pub value: String,

    /// Stylesheet for imports, otherwise guessed from the extension
    pub kind: ResourceKind,
}

/// Scans CSS bytes for URL references, ordered by position
///
/// Unreadable fragments are skipped. Values inside comments are reported
/// like any other.
pub fn scan(css: &[u8]) -> Vec<CssUrl> {
    let mut found = Vec::new();

    if let Some(re) = URL_FUNCTION.as_ref() {
        for caps in re.captures_iter(css) {
            let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
                continue;
            };
            let Some(whole) = caps.get(0) else {
                continue;
            };

            let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
            let kind = if is_import(&css[..whole.start()]) {
                ResourceKind::Stylesheet
            } else {
                ResourceKind::guess_from_path(&text)
            };

            found.push(CssUrl {
                span: value.range(),
                value: text,
                kind,
            });
        }
    }

    if let Some(re) = IMPORT_STRING.as_ref() {
        for caps in re.captures_iter(css) {
            if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
                found.push(CssUrl {
                    span: value.range(),
                    value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    kind: ResourceKind::Stylesheet,
                });
            }
        }
    }

    found.sort_by_key(|u| u.span.start);
    found
}

fn is_import(preceding: &[u8]) -> bool {
    let tail = &preceding[preceding.len().saturating_sub(64)..];
    IMPORT_PREFIX
        .as_ref()
        .map(|re| re.is_match(tail))
        .unwrap_or(false)
}

/// Replaces URL values in CSS using `replacement`
///
/// Values for which `replacement` returns `None` are kept as written.
/// Quotes around each value are preserved.
pub fn rewrite<F>(css: &[u8], mut replacement: F) -> Vec<u8>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = Vec::with_capacity(css.len());
    let mut pos = 0;

    for found in scan(css) {
        if found.span.start < pos {
            continue;
        }
        if let Some(new_value) = replacement(&found.value) {
            out.extend_from_slice(&css[pos..found.span.start]);
            out.extend_from_slice(new_value.as_bytes());
            pos = found.span.end;
        }
    }

    out.extend_from_slice(&css[pos..]);
    out
}
