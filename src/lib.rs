//! # pagechain - Two-stage scrape and extract pipeline
//!
//! A small event-driven crawling pipeline split into two independent stages
//! connected only through object storage and a message queue.
//!
//! ## Stages
//!
//! - **Scrape**: a push-delivered crawl request names a URL; the page is
//!   fetched and its raw HTML written to the raw bucket under a key derived
//!   from the URL.
//! - **Process**: a "raw object stored" notification names an object; the
//!   HTML is read back, links (or headings) are extracted, the result is
//!   written as JSON to the processed bucket, and when a per-domain rule finds
//!   a next page, a new crawl request for it is published.
//!
//! Publishing next pages closes the loop, so one configured site is crawled
//! page by page through the same two stages.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pagechain::extraction::{DomainRule, DomainRules, ExtractionEngine};
//!
//! let mut rules = DomainRules::empty();
//! rules.insert(
//!     "books.toscrape.com",
//!     DomainRule {
//!         next_page_selector: Some("li.next > a".to_string()),
//!         result_link_selector: Some("article.product_pod h3 a".to_string()),
//!     },
//! );
//!
//! let html = r#"<li class="next"><a href="catalogue/page-2.html">next</a></li>"#;
//! let extracted = ExtractionEngine::default().extract_with_domain(
//!     html,
//!     "books.toscrape.com/index.html",
//!     "books.toscrape.com",
//!     &rules,
//! );
//! println!("{}", extracted.extraction.to_json_pretty().unwrap());
//! ```

mod error;

pub mod config;
pub mod extraction;
pub mod fetcher;
pub mod keys;
pub mod pipeline;
pub mod queue;
pub mod server;
pub mod storage;
pub mod trigger;

pub use error::{Error, Result};

/// Re-export of the commonly used types
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::extraction::{DomainRules, Extraction, ExtractionEngine};
    pub use crate::pipeline::{Pipeline, ProcessStage, ScrapeStage, StageResponse};
    pub use crate::storage::{ObjectRef, ObjectStore};
}
