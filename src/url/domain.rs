use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the origin key used for scope comparisons: the host, plus the
/// port when it is not the scheme's default
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::origin_key;
///
/// let url = Url::parse("http://127.0.0.1:8080/a").unwrap();
/// assert_eq!(origin_key(&url), Some("127.0.0.1:8080".to_string()));
///
/// let url = Url::parse("https://example.com/a").unwrap();
/// assert_eq!(origin_key(&url), Some("example.com".to_string()));
/// ```
pub fn origin_key(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", domain, port),
        None => domain,
    })
}

/// Directory name holding resources of a host other than the root's
///
/// The port separator is `_` so the name is valid on every filesystem.
pub fn host_dir_name(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    let domain = domain.trim_start_matches('[').trim_end_matches(']').replace(':', "_");
    Some(match url.port() {
        Some(port) => format!("{}_{}", domain, port),
        None => domain,
    })
}
