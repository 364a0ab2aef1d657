//! Local path assignment for mirrored resources
//!
//! Paths are relative to the mirror root, use `/` as separator, and hold
//! decoded, filesystem-safe segment names. [`relative_href`] turns two such
//! paths back into a percent-encoded reference usable inside a document.

use crate::state::ResourceKind;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Longest segment name kept before truncation
const MAX_SEGMENT_LEN: usize = 120;

/// Server-side page extensions that are saved with an extra `.html`
const SERVER_PAGE_EXTENSIONS: &[&str] = &[
    "php", "php3", "php5", "asp", "aspx", "jsp", "jspx", "cgi", "pl", "cfm", "do", "action",
    "shtml",
];

/// Returns the first 8 hex characters of the SHA-256 of `input`
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// Derives the preferred local path for a URL
///
/// # Rules
///
/// - `/dir/` and `/` map to `dir/index.html` and `index.html`
/// - extension-less documents get `.html`, stylesheets `.css`, scripts `.js`
/// - documents served by server-side scripts (`page.php`) get an extra `.html`
/// - a query string adds `-<hash of query>` before the extension
/// - `host_dir` (for hosts other than the root's) prefixes the path
///
/// The result is only a candidate: [`PathRegistry::assign`] resolves collisions.
///
/// # Examples
///
/// ```
/// use site_mirror::state::ResourceKind;
/// use site_mirror::url::derive_local_path;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/css/site.css").unwrap();
/// assert_eq!(derive_local_path(&url, ResourceKind::Stylesheet, None), "css/site.css");
///
/// let url = Url::parse("https://example.com/about").unwrap();
/// assert_eq!(derive_local_path(&url, ResourceKind::Document, None), "about.html");
/// ```
pub fn derive_local_path(url: &Url, kind: ResourceKind, host_dir: Option<&str>) -> String {
    let mut segments: Vec<String> = Vec::new();

    if let Some(dir) = host_dir {
        segments.push(sanitize_segment(dir));
    }

    let raw: Vec<&str> = url
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();
    let trailing_slash = raw.last().map_or(true, |s| s.is_empty());

    for segment in raw.iter().filter(|s| !s.is_empty()) {
        segments.push(sanitize_segment(&decode_segment(segment)));
    }

    if trailing_slash {
        segments.push("index.html".to_string());
    } else if let Some(last) = segments.last_mut() {
        apply_default_extension(last, kind);
    }

    let path = segments.join("/");

    match url.query() {
        Some(query) => insert_suffix(&path, &format!("-{}", short_hash(query))),
        None => path,
    }
}

/// Tracks assigned paths and the directories they imply
///
/// A path is free when no file or directory already occupies it and none of
/// its parent directories is occupied by a file.
#[derive(Debug, Default)]
pub struct PathRegistry {
    files: HashSet<String>,
    dirs: HashSet<String>,
}

impl PathRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `path` can be claimed without conflicting
    pub fn is_free(&self, path: &str) -> bool {
        if self.files.contains(path) || self.dirs.contains(path) {
            return false;
        }
        !ancestors(path).any(|dir| self.files.contains(dir))
    }

    /// Claims `path` if it is free
    ///
    /// Returns false, leaving the registry unchanged, if it is not.
    pub fn claim(&mut self, path: &str) -> bool {
        if !self.is_free(path) {
            return false;
        }
        for dir in ancestors(path) {
            self.dirs.insert(dir.to_string());
        }
        self.files.insert(path.to_string());
        true
    }

    /// Assigns a unique path for `url`, starting from `candidate`
    ///
    /// Falls back to `candidate` with `-<hash of url>` before the extension,
    /// then to a flattened root-level name with the hash and a counter.
    pub fn assign(&mut self, candidate: &str, url: &Url) -> String {
        if self.claim(candidate) {
            return candidate.to_string();
        }

        let hash = short_hash(url.as_str());
        let suffixed = insert_suffix(candidate, &format!("-{}", hash));
        if self.claim(&suffixed) {
            return suffixed;
        }

        let flat = candidate.replace('/', "_");
        let mut counter = 0u32;
        loop {
            let name = if counter == 0 {
                insert_suffix(&flat, &format!("-{}", hash))
            } else {
                insert_suffix(&flat, &format!("-{}-{}", hash, counter))
            };
            if self.claim(&name) {
                return name;
            }
            counter += 1;
        }
    }

    /// Number of claimed file paths
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no path has been claimed
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Computes the href leading from the document at `from_file` to `to_file`
///
/// Both arguments are mirror-relative local paths. Each segment of the result
/// is percent-encoded so names with spaces or `%` survive URL parsing.
///
/// # Examples
///
/// ```
/// use site_mirror::url::relative_href;
///
/// assert_eq!(relative_href("index.html", "css/site.css"), "css/site.css");
/// assert_eq!(relative_href("blog/post.html", "css/site.css"), "../css/site.css");
/// assert_eq!(relative_href("a/b.html", "a/my file.png"), "my%20file.png");
/// ```
pub fn relative_href(from_file: &str, to_file: &str) -> String {
    let from: Vec<&str> = from_file.split('/').collect();
    let to: Vec<&str> = to_file.split('/').collect();

    let from_dirs = &from[..from.len().saturating_sub(1)];
    let (to_dirs, to_name) = match to.split_last() {
        Some((name, dirs)) => (dirs, *name),
        None => (&[][..], ""),
    };

    let common = from_dirs
        .iter()
        .zip(to_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from_dirs.len() {
        parts.push("..".to_string());
    }
    for dir in &to_dirs[common..] {
        parts.push(urlencoding::encode(dir).into_owned());
    }
    parts.push(urlencoding::encode(to_name).into_owned());

    parts.join("/")
}

/// Inserts `suffix` before the extension of the last segment of `path`
pub fn insert_suffix(path: &str, suffix: &str) -> String {
    let (dir, name) = match path.rfind('/') {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("", path),
    };

    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}{}", dir, &name[..dot], suffix, &name[dot..]),
        _ => format!("{}{}{}", dir, name, suffix),
    }
}

/// Returns the extension of a file name, without the dot
fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => Some(&name[dot + 1..]),
        _ => None,
    }
}

fn apply_default_extension(name: &mut String, kind: ResourceKind) {
    let Some(default_ext) = kind.default_extension() else {
        return;
    };

    match extension_of(name).map(|e| e.to_ascii_lowercase()) {
        None => {
            name.push('.');
            name.push_str(default_ext);
        }
        Some(ext) if default_ext == "html" && SERVER_PAGE_EXTENSIONS.contains(&ext.as_str()) => {
            name.push_str(".html");
        }
        Some(_) => {}
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Makes a decoded segment safe as a file or directory name
fn sanitize_segment(segment: &str) -> String {
    let mut clean: String = segment
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    while clean.ends_with('.') || clean.ends_with(' ') {
        clean.pop();
    }

    if clean.len() > MAX_SEGMENT_LEN {
        clean = truncate_keeping_extension(&clean);
    }

    if clean.is_empty() || clean == "." || clean == ".." {
        "_".to_string()
    } else {
        clean
    }
}

fn truncate_keeping_extension(name: &str) -> String {
    let ext = extension_of(name)
        .filter(|e| e.len() <= 10)
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut cut = MAX_SEGMENT_LEN - ext.len();
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }

    format!("{}{}", &name[..cut], ext)
}

fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('/').map(move |(idx, _)| &path[..idx])
}
