//! # Extraction Engine
//!
//! Turns the raw HTML of one stored page into a structured result. The
//! engine picks one of two link policies per document:
//!
//! - **Configured extraction** when the page's domain (or its apex, for
//!   `www.` hosts) has a [`DomainRule`]: the rule's selectors produce the
//!   next-page URL and the ordered list of result links.
//! - **Fallback extraction** otherwise: every anchor with an href, and no
//!   next page.
//!
//! Deployments that only need page outlines run the engine in
//! [`ExtractionMode::Headings`], which skips the rules entirely and collects
//! `h1`-`h3` text.
//!
//! Extraction never fails on bad markup. Empty or malformed documents give
//! empty results.

mod engine;
mod resolve;
mod rules;

pub use engine::{extract_headings, extract_links_with_base, ExtractionEngine};
pub use resolve::{base_url, resolve_href};
pub use rules::{DomainRule, DomainRules};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::storage::ObjectRef;

/// Error type for extraction setup
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The base URL for link resolution could not be built
    #[error("invalid base URL {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Which result shape a deployment produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Next page and result links, driven by domain rules
    #[default]
    Links,
    /// Level 1-3 heading text
    Headings,
}

impl FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "links" => Ok(Self::Links),
            "headings" => Ok(Self::Headings),
            other => Err(format!("unknown extraction mode '{}', expected links or headings", other)),
        }
    }
}

/// Where a raw document came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Fetched directly from a URL
    Url(Url),
    /// Read from the object store
    Object(ObjectRef),
}

/// The HTML of one page for the duration of one invocation
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: DocumentSource,
    pub html: String,
}

impl RawDocument {
    /// A document read from the object store
    pub fn from_object(object: ObjectRef, html: impl Into<String>) -> Self {
        Self {
            source: DocumentSource::Object(object),
            html: html.into(),
        }
    }

    /// A document fetched from the web
    pub fn from_url(url: Url, html: impl Into<String>) -> Self {
        Self {
            source: DocumentSource::Url(url),
            html: html.into(),
        }
    }

    /// Identifier recorded as `source_file`: the object name, or the URL
    pub fn identifier(&self) -> String {
        match &self.source {
            DocumentSource::Url(url) => url.to_string(),
            DocumentSource::Object(object) => object.name.clone(),
        }
    }
}

/// Domain of a stored file: everything before the first `/`
pub fn domain_of(source_file: &str) -> &str {
    source_file.split('/').next().unwrap_or(source_file)
}

/// Links found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkExtraction {
    pub source_file: String,
    pub next_page_url: Option<String>,
    pub result_urls: Vec<String>,
}

/// Headings found on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingExtraction {
    pub source_file: String,
    pub headings: Vec<String>,
}

/// Exactly one extraction result per processed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extraction {
    Links(LinkExtraction),
    Headings(HeadingExtraction),
}

impl Extraction {
    /// The file the result was extracted from
    pub fn source_file(&self) -> &str {
        match self {
            Extraction::Links(links) => &links.source_file,
            Extraction::Headings(headings) => &headings.source_file,
        }
    }

    /// URL to crawl next, only ever present for configured link extraction
    pub fn next_page_url(&self) -> Option<&str> {
        match self {
            Extraction::Links(links) => links.next_page_url.as_deref(),
            Extraction::Headings(_) => None,
        }
    }

    /// Number of result links or headings
    pub fn item_count(&self) -> usize {
        match self {
            Extraction::Links(links) => links.result_urls.len(),
            Extraction::Headings(headings) => headings.headings.len(),
        }
    }

    /// Pretty-printed JSON with two-space indentation
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// The branch the engine took for a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// A domain rule matched; `rule_domain` is the key it was found under
    Configured { rule_domain: String },
    /// No rule matched, every anchor was collected
    Fallback,
    /// Heading extraction, no rules consulted
    Headings,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Configured { rule_domain } => write!(f, "configured({})", rule_domain),
            Policy::Fallback => write!(f, "fallback"),
            Policy::Headings => write!(f, "headings"),
        }
    }
}

/// Engine output: the policy that ran and what it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub policy: Policy,
    pub extraction: Extraction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("example.com/a/b.html"), "example.com");
        assert_eq!(domain_of("empty_file.html"), "empty_file.html");
        assert_eq!(domain_of(""), "");
    }

    #[test]
    fn test_link_json_shape() {
        let extraction = Extraction::Links(LinkExtraction {
            source_file: "empty_file.html".to_string(),
            next_page_url: None,
            result_urls: vec![],
        });

        assert_eq!(
            extraction.to_json_pretty().unwrap(),
            "{\n  \"source_file\": \"empty_file.html\",\n  \"next_page_url\": null,\n  \"result_urls\": []\n}"
        );
    }

    #[test]
    fn test_heading_json_shape() {
        let extraction = Extraction::Headings(HeadingExtraction {
            source_file: "a.html".to_string(),
            headings: vec!["Title 1".to_string()],
        });

        assert_eq!(
            extraction.to_json_pretty().unwrap(),
            "{\n  \"source_file\": \"a.html\",\n  \"headings\": [\n    \"Title 1\"\n  ]\n}"
        );
        assert_eq!(extraction.next_page_url(), None);
        assert_eq!(extraction.item_count(), 1);
    }

    #[test]
    fn test_identifier() {
        let doc = RawDocument::from_object(ObjectRef::new("raw", "example.com/page.html"), "");
        assert_eq!(doc.identifier(), "example.com/page.html");

        let doc = RawDocument::from_url(Url::parse("https://example.com/x").unwrap(), "");
        assert_eq!(doc.identifier(), "https://example.com/x");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Links".parse::<ExtractionMode>().unwrap(), ExtractionMode::Links);
        assert_eq!("headings".parse::<ExtractionMode>().unwrap(), ExtractionMode::Headings);
        assert!("everything".parse::<ExtractionMode>().is_err());
    }
}
