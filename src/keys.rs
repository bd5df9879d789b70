//! Object key derivation
//!
//! Raw pages are stored under a key derived from their URL, and the
//! processed JSON for a raw object lives at the same key with a `.json`
//! extension.

use std::str::FromStr;

use url::Url;
use uuid::Uuid;

/// Length of the random hex token in randomized keys
const TOKEN_LEN: usize = 8;

/// How raw object keys are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// `host + path`, overwriting earlier snapshots of the same URL
    #[default]
    Deterministic,
    /// Path base name plus a random token, keeping every snapshot
    Randomized,
}

impl FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deterministic" => Ok(Self::Deterministic),
            "randomized" | "random" => Ok(Self::Randomized),
            other => Err(format!(
                "unknown key strategy '{}', expected deterministic or randomized",
                other
            )),
        }
    }
}

impl KeyStrategy {
    /// Derive the raw object key for a URL
    pub fn raw_key(&self, url: &Url) -> String {
        match self {
            KeyStrategy::Deterministic => deterministic_key(url),
            KeyStrategy::Randomized => randomized_key(url),
        }
    }
}

/// `host[:port] + path`, with `index.html` for directory paths and `.html`
/// for extensionless ones
pub fn deterministic_key(url: &Url) -> String {
    let mut key = netloc(url);
    let path = url.path();

    if path.is_empty() {
        key.push_str("/index.html");
        return key;
    }

    key.push_str(path);
    if path.ends_with('/') {
        key.push_str("index.html");
    } else if extension_start(last_segment(path)).is_none() {
        key.push_str(".html");
    }
    key
}

/// Path base name with dots replaced, a random hex token and `.html`
pub fn randomized_key(url: &Url) -> String {
    let base = match last_segment(url.path()) {
        "" => url.host_str().unwrap_or("index"),
        segment => segment,
    };
    let token = Uuid::new_v4().simple().to_string();
    format!("{}_{}.html", base.replace('.', "_"), &token[..TOKEN_LEN])
}

/// Key of the processed JSON for a raw object key
pub fn processed_key(raw_key: &str) -> String {
    let segment_start = raw_key.rfind('/').map_or(0, |i| i + 1);
    match extension_start(&raw_key[segment_start..]) {
        Some(dot) => format!("{}.json", &raw_key[..segment_start + dot]),
        None => format!("{}.json", raw_key),
    }
}

fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Byte offset of the extension dot in a file name; leading dots do not count
fn extension_start(name: &str) -> Option<usize> {
    let leading = name.len() - name.trim_start_matches('.').len();
    name[leading..].rfind('.').map(|i| i + leading)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_path_with_extension_unchanged() {
        assert_eq!(
            deterministic_key(&url("http://example.com/some/page.html")),
            "example.com/some/page.html"
        );
        assert_eq!(
            deterministic_key(&url("https://example.com/feed.xml?page=2")),
            "example.com/feed.xml"
        );
    }

    #[test]
    fn test_root_becomes_index() {
        assert_eq!(deterministic_key(&url("http://example.com")), "example.com/index.html");
        assert_eq!(deterministic_key(&url("http://example.com/")), "example.com/index.html");
        assert_eq!(
            deterministic_key(&url("https://example.com/blog/")),
            "example.com/blog/index.html"
        );
    }

    #[test]
    fn test_extensionless_path_gets_html() {
        assert_eq!(
            deterministic_key(&url("https://example.com/catalogue/page-2")),
            "example.com/catalogue/page-2.html"
        );
        assert_eq!(
            deterministic_key(&url("https://example.com/v1.2/about")),
            "example.com/v1.2/about.html"
        );
        assert_eq!(
            deterministic_key(&url("https://example.com/.well-known")),
            "example.com/.well-known.html"
        );
    }

    #[test]
    fn test_explicit_port_kept() {
        assert_eq!(
            deterministic_key(&url("http://localhost:8080/a.html")),
            "localhost:8080/a.html"
        );
        // Default ports are not part of the key
        assert_eq!(deterministic_key(&url("https://example.com:443/a.html")), "example.com/a.html");
    }

    #[test]
    fn test_randomized_key() {
        let key = randomized_key(&url("https://example.com/products/item.php"));
        assert!(key.starts_with("item_php_"), "{}", key);
        assert!(key.ends_with(".html"));

        let token = &key["item_php_".len()..key.len() - ".html".len()];
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_randomized_keys_do_not_collide() {
        let u = url("https://example.com/");
        let first = randomized_key(&u);
        let second = randomized_key(&u);
        assert!(first.starts_with("example_com_"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_processed_key() {
        assert_eq!(processed_key("unconfigured-domain.com/page.html"), "unconfigured-domain.com/page.json");
        assert_eq!(processed_key("empty_file.html"), "empty_file.json");
        assert_eq!(processed_key("example.com/archive.tar.gz"), "example.com/archive.tar.json");
        assert_eq!(processed_key("example.com/v1.2/readme"), "example.com/v1.2/readme.json");
        assert_eq!(processed_key("example.com/.hidden"), "example.com/.hidden.json");
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("Deterministic".parse::<KeyStrategy>().unwrap(), KeyStrategy::Deterministic);
        assert_eq!("randomized".parse::<KeyStrategy>().unwrap(), KeyStrategy::Randomized);
        assert!("sequential".parse::<KeyStrategy>().is_err());
    }
}
