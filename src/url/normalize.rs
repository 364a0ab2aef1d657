use crate::UrlError;
use url::Url;

/// Parses and canonicalizes an absolute URL string
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Canonical URL (see [`canonicalize`])
/// * `Err(UrlError)` - Failed to parse, or not an HTTP(S) URL with a host
///
/// # Examples
///
/// ```
/// use site_mirror::url::normalize_url;
///
/// let url = normalize_url("HTTP://EXAMPLE.COM:80/page#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize(&url)
}

/// Canonicalizes an absolute URL into its deduplication key
///
/// # Normalization Steps
///
/// 1. Reject schemes other than HTTP and HTTPS
/// 2. Reject URLs without a host
/// 3. Lowercase the scheme and host
/// 4. Remove the port when it is the scheme's default
/// 5. Empty path becomes `/` (so `https://a.com` and `https://a.com/` are equal)
/// 6. Remove the fragment (`/page#a` and `/page#b` are the same resource)
/// 7. Remove an empty query string (trailing `?`)
///
/// Query strings are otherwise kept verbatim: they select distinct content.
pub fn canonicalize(url: &Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?;
    if host.is_empty() {
        return Err(UrlError::MissingDomain);
    }

    let mut url = url.clone();

    let lowered = host.to_lowercase();
    if lowered != host {
        url.set_host(Some(&lowered))
            .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    }

    if let Some(port) = url.port() {
        if Some(port) == default_port(url.scheme()) {
            url.set_port(None)
                .map_err(|_| UrlError::Malformed("Failed to clear default port".to_string()))?;
        }
    }

    if url.path().is_empty() {
        url.set_path("/");
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}
