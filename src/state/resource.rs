//! Resource data types shared by the parser, resolver and coordinator

use super::ResourceState;
use std::fmt;
use url::Url;

/// What a reference is used for, decided from its tag and attribute context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Hyperlinked page (`<a>`, `<area>`)
    Document,
    /// Embedded page (`<iframe>`, `<frame>`)
    Frame,
    Stylesheet,
    Script,
    Image,
    Font,
    /// Audio, video and text tracks
    Media,
    Other,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Frame => "frame",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Font => "font",
            Self::Media => "media",
            Self::Other => "other",
        }
    }

    /// Extension (without the dot) given to saved files that have none
    pub fn default_extension(&self) -> Option<&'static str> {
        match self {
            Self::Document | Self::Frame => Some("html"),
            Self::Stylesheet => Some("css"),
            Self::Script => Some("js"),
            _ => None,
        }
    }

    /// Dispatch priority (lower is fetched first)
    ///
    /// Pages come first so their references are discovered early, then
    /// render-blocking stylesheets and scripts, then everything else.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Document | Self::Frame => 0,
            Self::Stylesheet => 1,
            Self::Script => 2,
            _ => 3,
        }
    }

    /// Returns true for kinds that hold an HTML page
    pub fn is_page(&self) -> bool {
        matches!(self, Self::Document | Self::Frame)
    }

    /// Guesses a kind from the extension of a URL or path
    ///
    /// Used where the markup gives no context, such as `url()` in CSS.
    pub fn guess_from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let ext = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "css" => Self::Stylesheet,
            "js" | "mjs" => Self::Script,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" | "bmp" | "cur" => {
                Self::Image
            }
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            "mp4" | "webm" | "ogg" | "mp3" | "wav" | "vtt" => Self::Media,
            "html" | "htm" | "xhtml" => Self::Frame,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a fetched payload is processed
///
/// Selected once per fetched resource; only HTML and CSS are parsed and
/// rewritten, everything else is stored verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Html,
    Css,
    Other,
}

impl ContentKind {
    /// Detects the content kind of a response
    ///
    /// The `Content-Type` header decides unless it is missing or generic
    /// (`text/plain`, `application/octet-stream`); then the URL extension,
    /// then a look at the start of the body for an HTML prologue.
    pub fn detect(content_type: Option<&str>, url: &Url, body: &[u8]) -> Self {
        if let Some(header) = content_type {
            let mime = header
                .split(';')
                .next()
                .unwrap_or("")
                .trim()
                .to_ascii_lowercase();

            match mime.as_str() {
                "text/html" | "application/xhtml+xml" => return Self::Html,
                "text/css" => return Self::Css,
                "" | "text/plain" | "application/octet-stream" => {}
                _ => return Self::Other,
            }
        }

        let ext = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match ext.as_deref() {
            Some("html") | Some("htm") | Some("xhtml") => return Self::Html,
            Some("css") => return Self::Css,
            _ => {}
        }

        if looks_like_html(body) {
            Self::Html
        } else {
            Self::Other
        }
    }

    /// Returns true if references are extracted from this kind
    pub fn is_parseable(&self) -> bool {
        matches!(self, Self::Html | Self::Css)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Other => "other",
        }
    }
}

fn looks_like_html(body: &[u8]) -> bool {
    let head = &body[..body.len().min(512)];
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let head = head[start..].to_ascii_lowercase();

    head.starts_with(b"<!doctype html") || head.starts_with(b"<html")
}

/// A reference found in a fetched document
///
/// Consumed by the resolver; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// The reference exactly as written (entity-decoded)
    pub raw: String,

    /// URL the reference is resolved against
    pub base: Url,

    pub kind: ResourceKind,
}

impl ResourceRef {
    pub fn new(raw: impl Into<String>, base: Url, kind: ResourceKind) -> Self {
        Self {
            raw: raw.into(),
            base,
            kind,
        }
    }
}

/// Per-canonical-URL bookkeeping entry
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    /// Canonical URL; the deduplication key
    pub url: Url,

    /// Kind from the first reference that registered this URL
    pub kind: ResourceKind,

    /// Hyperlink hops from the root page
    pub depth: u32,

    /// Mirror-relative path, assigned once and never changed
    pub local_path: Option<String>,

    pub state: ResourceState,

    /// Detected after fetching
    pub content_kind: Option<ContentKind>,

    pub bytes_written: Option<u64>,

    /// Page title, for HTML documents
    pub title: Option<String>,

    /// Document that first referenced this URL
    pub referrer: Option<Url>,
}

impl ResourceRecord {
    pub fn new(url: Url, kind: ResourceKind, depth: u32, referrer: Option<Url>) -> Self {
        Self {
            url,
            kind,
            depth,
            local_path: None,
            state: ResourceState::Pending,
            content_kind: None,
            bytes_written: None,
            title: None,
            referrer,
        }
    }
}
