//! Resolution of hyperlink targets against a page's base URL

use url::Url;

use super::ExtractError;

/// Build the base URL `scheme://domain` used to resolve a stored page's links
pub fn base_url(scheme: &str, domain: &str) -> Result<Url, ExtractError> {
    let raw = format!("{}://{}", scheme, domain);
    Url::parse(&raw).map_err(|source| ExtractError::BaseUrl { url: raw, source })
}

/// Resolve an href against a base URL.
///
/// Absolute hrefs pass through, absolute paths keep the base origin and
/// relative paths resolve against the base path. Empty hrefs, bare `#`
/// fragments and hrefs that cannot be joined yield `None`.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    base.join(href).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("https", "example.com").unwrap().as_str(), "https://example.com/");
        assert_eq!(
            base_url("http", "www.example.com").unwrap().as_str(),
            "http://www.example.com/"
        );
        assert!(base_url("https", "").is_err());
    }

    #[test]
    fn test_absolute_href_unchanged() {
        let url = resolve_href(&base(), "https://external.com/resource").unwrap();
        assert_eq!(url.as_str(), "https://external.com/resource");
    }

    #[test]
    fn test_absolute_path_uses_origin() {
        let url = resolve_href(&base(), "/about.html").unwrap();
        assert_eq!(url.as_str(), "http://example.com/about.html");
    }

    #[test]
    fn test_relative_path_uses_base_path() {
        let url = resolve_href(&base(), "products/product1.html").unwrap();
        assert_eq!(url.as_str(), "http://example.com/dir/products/product1.html");

        let url = resolve_href(&base(), "../up.html").unwrap();
        assert_eq!(url.as_str(), "http://example.com/up.html");
    }

    #[test]
    fn test_scheme_relative_takes_base_scheme() {
        let url = resolve_href(&base(), "//cdn.example.net/x").unwrap();
        assert_eq!(url.as_str(), "http://cdn.example.net/x");
    }

    #[test]
    fn test_skipped_hrefs() {
        assert!(resolve_href(&base(), "").is_none());
        assert!(resolve_href(&base(), "   ").is_none());
        assert!(resolve_href(&base(), "#").is_none());
        assert!(resolve_href(&base(), "#section-2").is_none());
        assert!(resolve_href(&base(), "http://[broken").is_none());
    }

    #[test]
    fn test_fragment_on_path_is_kept() {
        let url = resolve_href(&base(), "other.html#top").unwrap();
        assert_eq!(url.as_str(), "http://example.com/dir/other.html#top");
    }
}
