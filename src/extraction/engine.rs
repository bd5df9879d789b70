//! Policy selection and the two extraction passes over a parsed document

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::resolve::{base_url, resolve_href};
use super::rules::{DomainRule, DomainRules};
use super::{
    domain_of, Extracted, Extraction, ExtractionMode, HeadingExtraction, LinkExtraction, Policy,
    RawDocument,
};
use crate::config::PipelineConfig;

const ANCHOR_SELECTOR: &str = "a[href]";
const HEADING_SELECTOR: &str = "h1, h2, h3";

/// Decides which extraction policy applies to a document and runs it
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    mode: ExtractionMode,
    scheme: String,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new(ExtractionMode::Links, "https")
    }
}

impl ExtractionEngine {
    /// Create an engine producing `mode` results and rebuilding base URLs with `scheme`
    pub fn new(mode: ExtractionMode, scheme: impl Into<String>) -> Self {
        Self {
            mode,
            scheme: scheme.into(),
        }
    }

    /// Create an engine from the pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.extraction_mode, config.base_url_scheme.clone())
    }

    /// The output shape this engine produces
    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Extract from a stored document; the domain is the first segment of its identifier
    pub fn extract(&self, document: &RawDocument, rules: &DomainRules) -> Extracted {
        let source_file = document.identifier();
        let domain = domain_of(&source_file).to_string();
        self.extract_with_domain(&document.html, &source_file, &domain, rules)
    }

    /// Extract from raw markup with an explicit domain
    #[instrument(skip(self, html, rules), fields(mode = ?self.mode))]
    pub fn extract_with_domain(
        &self,
        html: &str,
        source_file: &str,
        domain: &str,
        rules: &DomainRules,
    ) -> Extracted {
        if self.mode == ExtractionMode::Headings {
            let headings = extract_headings(html);
            debug!(headings = headings.len(), "Extracted headings");
            return Extracted {
                policy: Policy::Headings,
                extraction: Extraction::Headings(HeadingExtraction {
                    source_file: source_file.to_string(),
                    headings,
                }),
            };
        }

        let base = match base_url(&self.scheme, domain) {
            Ok(base) => Some(base),
            Err(e) => {
                warn!(error = %e, "Cannot build base URL, only absolute links will resolve");
                None
            }
        };

        let (policy, rule) = match rules.lookup(domain) {
            Some((rule_domain, rule)) => {
                info!("Found config for domain: {}. Extracting links.", domain);
                (
                    Policy::Configured {
                        rule_domain: rule_domain.to_string(),
                    },
                    Some(rule),
                )
            }
            None => {
                info!("No config for domain: {}. Fallback: extracting all links.", domain);
                (Policy::Fallback, None)
            }
        };

        let (next_page_url, result_urls) = extract_links(html, base.as_ref(), rule);

        Extracted {
            policy,
            extraction: Extraction::Links(LinkExtraction {
                source_file: source_file.to_string(),
                next_page_url,
                result_urls,
            }),
        }
    }
}

/// Extract links from markup resolved against `base`.
///
/// With a rule this is configured extraction (next page plus result links);
/// without one every anchor is collected and there is no next page.
pub fn extract_links_with_base(
    html: &str,
    base: &Url,
    rule: Option<&DomainRule>,
) -> (Option<String>, Vec<String>) {
    extract_links(html, Some(base), rule)
}

/// Text of every level 1-3 heading in document order
pub fn extract_headings(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(selector) = parse_selector(HEADING_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| {
            element
                .text()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn extract_links(
    html: &str,
    base: Option<&Url>,
    rule: Option<&DomainRule>,
) -> (Option<String>, Vec<String>) {
    let document = Html::parse_document(html);

    match rule {
        Some(rule) => {
            let next_page_url = rule
                .next_page_selector
                .as_deref()
                .and_then(parse_selector)
                .and_then(|selector| document.select(&selector).next())
                .and_then(|element| href_of(element, base));

            let result_urls = rule
                .result_link_selector
                .as_deref()
                .and_then(parse_selector)
                .map(|selector| collect_hrefs(&document, &selector, base))
                .unwrap_or_default();

            (next_page_url, result_urls)
        }
        None => {
            let result_urls = parse_selector(ANCHOR_SELECTOR)
                .map(|selector| collect_hrefs(&document, &selector, base))
                .unwrap_or_default();
            (None, result_urls)
        }
    }
}

fn collect_hrefs(document: &Html, selector: &Selector, base: Option<&Url>) -> Vec<String> {
    document
        .select(selector)
        .filter_map(|element| href_of(element, base))
        .collect()
}

fn href_of(element: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    let href = element.value().attr("href")?;
    let resolved = match base {
        Some(base) => resolve_href(base, href),
        None => Url::parse(href.trim()).ok(),
    };
    resolved.map(String::from)
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!("Failed to parse selector '{}': {}", selector, e);
            None
        }
    }
}
