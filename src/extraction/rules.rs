//! Per-domain selector rules

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// Selectors describing how to pull links out of one site's pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRule {
    /// CSS selector for the element carrying the next page href
    #[serde(default)]
    pub next_page_selector: Option<String>,

    /// CSS selector for every result link on the page
    #[serde(default)]
    pub result_link_selector: Option<String>,
}

impl DomainRule {
    /// A rule naming no selector at all counts as no rule
    pub fn is_empty(&self) -> bool {
        self.next_page_selector.is_none() && self.result_link_selector.is_none()
    }
}

/// Mapping from exact domain name to its rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DomainRules {
    rules: HashMap<String, DomainRule>,
}

impl DomainRules {
    /// An empty rule set, under which every page gets fallback extraction
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse rules from a JSON object of `domain -> rule`.
    ///
    /// The top level must be an object. Entries that are not rule objects
    /// (`null`, strings, mistyped selectors) are skipped with a warning so
    /// they only affect their own domain.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Map<String, Value> = serde_json::from_str(json)?;

        Ok(entries
            .into_iter()
            .filter_map(|(domain, value)| {
                if value.is_null() {
                    warn!(domain = %domain, "Selector rule is null, ignoring");
                    return None;
                }
                match serde_json::from_value::<DomainRule>(value) {
                    Ok(rule) => Some((domain, rule)),
                    Err(e) => {
                        warn!(domain = %domain, error = %e, "Invalid selector rule, ignoring");
                        None
                    }
                }
            })
            .collect())
    }

    /// Load rules from a JSON file.
    ///
    /// A missing or unreadable file never fails the caller: it is logged and
    /// an empty rule set is returned.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    path = %path.display(),
                    "{} not found. Using default processing.",
                    path.display()
                );
                return Self::empty();
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error reading selector rules");
                return Self::empty();
            }
        };

        match Self::from_json(&contents) {
            Ok(rules) => {
                debug!(path = %path.display(), domains = rules.len(), "Loaded selector rules");
                rules
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Error decoding selector rules");
                Self::empty()
            }
        }
    }

    /// Insert or replace the rule for a domain
    pub fn insert(&mut self, domain: impl Into<String>, rule: DomainRule) {
        self.rules.insert(domain.into(), rule);
    }

    /// Number of configured domains
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no domain is configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the rule for a domain.
    ///
    /// The exact domain is tried first. When it has no rule and starts with
    /// `www.`, that prefix is stripped once and the apex domain is tried.
    /// Empty rules are treated as absent at both steps. Returns the key that
    /// matched along with its rule.
    pub fn lookup<'a>(&'a self, domain: &'a str) -> Option<(&'a str, &'a DomainRule)> {
        if let Some(rule) = self.get(domain) {
            return Some((domain, rule));
        }

        let apex = domain.strip_prefix("www.")?;
        self.get(apex).map(|rule| (apex, rule))
    }

    fn get(&self, domain: &str) -> Option<&DomainRule> {
        self.rules.get(domain).filter(|rule| !rule.is_empty())
    }
}

impl FromIterator<(String, DomainRule)> for DomainRules {
    fn from_iter<I: IntoIterator<Item = (String, DomainRule)>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
