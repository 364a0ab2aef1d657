//! Reference rewriting for fetched documents
//!
//! Rewriting is a pure byte transformation: markup outside the rewritten
//! attribute values is copied through untouched, so the saved page differs
//! from the served one only where a reference changed.

use super::{css, srcset_candidates};
use crate::state::ContentKind;
use crate::url::relative_href;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;

/// Comments, or a start tag with its attribute list
static TAG: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<([a-zA-Z][a-zA-Z0-9:-]*)((?:\s*[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*/?>"#,
    )
    .ok()
});

/// One attribute inside a start tag
static ATTRIBUTE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).ok()
});

/// Where a reference points after mirroring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedRef {
    /// Mirrored: mirror-relative local path of the target
    Local(String),

    /// Not mirrored: absolute URL written in place of the original
    Remote(String),
}

/// Mapping from references as written in a document to their targets
///
/// Keys are the trimmed, entity-decoded attribute or `url()` values the
/// parser reported.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    entries: HashMap<String, MappedRef>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_local(&mut self, raw: &str, local_path: impl Into<String>) {
        self.entries
            .insert(raw.trim().to_string(), MappedRef::Local(local_path.into()));
    }

    pub fn insert_remote(&mut self, raw: &str, absolute: impl Into<String>) {
        self.entries
            .insert(raw.trim().to_string(), MappedRef::Remote(absolute.into()));
    }

    pub fn get(&self, raw: &str) -> Option<&MappedRef> {
        self.entries.get(raw.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inputs for rewriting one document
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Mirror-relative path the document is saved at
    pub document_path: &'a str,

    pub references: &'a ReferenceMap,
}

impl RewriteContext<'_> {
    /// Replacement for a reference, and whether it points at a local file
    ///
    /// Fragments on local targets are carried over; remote targets are used
    /// verbatim.
    fn replacement(&self, raw: &str) -> Option<(String, bool)> {
        let raw = raw.trim();
        match self.references.get(raw)? {
            MappedRef::Local(path) => {
                let mut href = relative_href(self.document_path, path);
                if let Some((_, fragment)) = raw.split_once('#') {
                    href.push('#');
                    href.push_str(fragment);
                }
                Some((href, true))
            }
            MappedRef::Remote(absolute) => Some((absolute.clone(), false)),
        }
    }
}

/// Rewrites every mapped reference in a document
///
/// - HTML: URL attributes (`href`, `src`, `poster`, `data`, `background`,
///   `srcset`, `imagesrcset`), `style` attributes and `<style>` blocks.
///   `<base>` tags are removed, `<script>` bodies and comments are copied
///   verbatim, and `integrity` is dropped from tags now pointing at a local
///   copy.
/// - CSS: `url(...)` and `@import` values.
/// - Anything else is returned unchanged.
///
/// References absent from the map are left as written.
pub fn rewrite(body: &[u8], kind: ContentKind, ctx: &RewriteContext<'_>) -> Vec<u8> {
    match kind {
        ContentKind::Html => rewrite_html(body, ctx),
        ContentKind::Css => css::rewrite(body, |value| ctx.replacement(value).map(|(v, _)| v)),
        ContentKind::Other => body.to_vec(),
    }
}

fn rewrite_html(body: &[u8], ctx: &RewriteContext<'_>) -> Vec<u8> {
    let Some(tag_re) = TAG.as_ref() else {
        return body.to_vec();
    };

    let mut out = Vec::with_capacity(body.len());
    let mut pos = 0;

    while let Some(caps) = tag_re.captures_at(body, pos) {
        let Some(whole) = caps.get(0) else {
            break;
        };
        out.extend_from_slice(&body[pos..whole.start()]);
        pos = whole.end();

        let Some(name) = caps.get(1) else {
            // Comment
            out.extend_from_slice(whole.as_bytes());
            continue;
        };

        let name = String::from_utf8_lossy(name.as_bytes()).to_ascii_lowercase();
        if name == "base" {
            continue;
        }

        let tag = whole.as_bytes();
        let attrs = caps
            .get(2)
            .map(|m| (m.start() - whole.start())..(m.end() - whole.start()))
            .unwrap_or(0..0);
        write_tag(&mut out, tag, &name, attrs, ctx);

        if name == "script" || name == "style" {
            let end = find_closing_tag(body, pos, &name);
            let content = &body[pos..end];
            if name == "style" {
                out.extend(css::rewrite(content, |v| ctx.replacement(v).map(|(v, _)| v)));
            } else {
                out.extend_from_slice(content);
            }
            pos = end;
        }
    }

    out.extend_from_slice(&body[pos..]);
    out
}

/// Finds the start of `</name` at or after `from`, or the end of input
fn find_closing_tag(body: &[u8], from: usize, name: &str) -> usize {
    let needle = format!("</{}", name);
    let needle = needle.as_bytes();
    body[from..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|i| from + i)
        .unwrap_or(body.len())
}

/// Attributes whose value is a single URL, with the tags they apply to
fn is_url_attribute(tag: &str, attr: &str) -> bool {
    match attr {
        "href" => matches!(tag, "a" | "area" | "link"),
        "src" => true,
        "poster" => tag == "video",
        "data" => tag == "object",
        "background" => true,
        _ => false,
    }
}

enum Quote {
    Double,
    Single,
    None,
}

struct Attribute<'a> {
    name: String,
    /// Byte range of the whole attribute within the attribute list
    span: Range<usize>,
    value: Option<(&'a [u8], Quote)>,
}

/// Writes a start tag, splicing rewritten attribute values into the
/// original bytes
///
/// `attrs` is the range of the attribute list within `tag`.
fn write_tag(
    out: &mut Vec<u8>,
    tag: &[u8],
    name: &str,
    attrs: Range<usize>,
    ctx: &RewriteContext<'_>,
) {
    let attr_bytes = &tag[attrs.clone()];
    let parsed = parse_attributes(attr_bytes);

    let mut replacements: Vec<Option<Vec<u8>>> = Vec::with_capacity(parsed.len());
    let mut points_local = false;

    for attr in &parsed {
        let replacement = attr.value.as_ref().and_then(|(value, quote)| {
            let decoded = String::from_utf8_lossy(value);
            let decoded = html_escape::decode_html_entities(&decoded);
            let (new_value, local) = rewrite_attribute_value(name, &attr.name, &decoded, ctx)?;
            points_local |= local;
            Some(encode_attribute(&attr.name, &new_value, quote))
        });
        replacements.push(replacement);
    }

    if replacements.iter().all(Option::is_none) {
        out.extend_from_slice(tag);
        return;
    }

    out.extend_from_slice(&tag[..attrs.start]);
    let mut cursor = 0;
    for (attr, replacement) in parsed.iter().zip(replacements) {
        let gap = &attr_bytes[cursor..attr.span.start];
        cursor = attr.span.end;
        if points_local && attr.name == "integrity" {
            continue;
        }
        out.extend_from_slice(gap);
        match replacement {
            Some(bytes) => out.extend(bytes),
            None => out.extend_from_slice(&attr_bytes[attr.span.clone()]),
        }
    }
    out.extend_from_slice(&attr_bytes[cursor..]);
    out.extend_from_slice(&tag[attrs.end..]);
}

fn parse_attributes(attrs: &[u8]) -> Vec<Attribute<'_>> {
    let Some(re) = ATTRIBUTE.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(attrs)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = String::from_utf8_lossy(caps.get(1)?.as_bytes()).to_ascii_lowercase();
            let value = if let Some(v) = caps.get(2) {
                Some((v.as_bytes(), Quote::Double))
            } else if let Some(v) = caps.get(3) {
                Some((v.as_bytes(), Quote::Single))
            } else {
                caps.get(4).map(|v| (v.as_bytes(), Quote::None))
            };
            Some(Attribute {
                name,
                span: whole.range(),
                value,
            })
        })
        .collect()
}

/// New value for one attribute, and whether it now points at a local file
fn rewrite_attribute_value(
    tag: &str,
    attr: &str,
    value: &str,
    ctx: &RewriteContext<'_>,
) -> Option<(String, bool)> {
    match attr {
        "srcset" | "imagesrcset" => rewrite_srcset(value, ctx),
        "style" => {
            let mut local = false;
            let mut changed = false;
            let out = css::rewrite(value.as_bytes(), |v| {
                let (new_value, is_local) = ctx.replacement(v)?;
                local |= is_local;
                changed = true;
                Some(new_value)
            });
            changed.then(|| (String::from_utf8_lossy(&out).into_owned(), local))
        }
        _ if is_url_attribute(tag, attr) => ctx.replacement(value),
        _ => None,
    }
}

fn rewrite_srcset(value: &str, ctx: &RewriteContext<'_>) -> Option<(String, bool)> {
    let mut local = false;
    let mut changed = false;

    let candidates: Vec<String> = srcset_candidates(value)
        .into_iter()
        .map(|(url, descriptor)| {
            let url: Cow<'_, str> = match ctx.replacement(url) {
                Some((new_url, is_local)) => {
                    local |= is_local;
                    changed = true;
                    Cow::Owned(new_url)
                }
                None => Cow::Borrowed(url),
            };
            if descriptor.is_empty() {
                url.into_owned()
            } else {
                format!("{} {}", url, descriptor)
            }
        })
        .collect();

    changed.then(|| (candidates.join(", "), local))
}

fn encode_attribute(name: &str, value: &str, quote: &Quote) -> Vec<u8> {
    match quote {
        Quote::Single => {
            format!("{}='{}'", name, html_escape::encode_single_quoted_attribute(value))
        }
        Quote::Double | Quote::None => {
            format!("{}=\"{}\"", name, html_escape::encode_double_quoted_attribute(value))
        }
    }
    .into_bytes()
}
