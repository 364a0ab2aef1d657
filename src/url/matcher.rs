/// Checks if a host matches an allowed-host pattern
///
/// Two kinds of patterns are supported:
/// 1. Exact: "cdn.example.com" matches only "cdn.example.com"
/// 2. Wildcard: "*.example.com" matches "example.com" and any subdomain
///    ("img.example.com", "a.b.example.com")
///
/// Comparison ignores ASCII case.
///
/// # Examples
///
/// ```
/// use site_mirror::url::matches_host_pattern;
///
/// assert!(matches_host_pattern("cdn.example.com", "CDN.example.com"));
/// assert!(matches_host_pattern("*.example.com", "example.com"));
/// assert!(matches_host_pattern("*.example.com", "img.example.com"));
/// assert!(!matches_host_pattern("*.example.com", "myexample.com"));
/// ```
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}
