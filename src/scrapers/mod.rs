//! Scrapers for business listing sources.
//!
//! Each scraper turns one configured source into a lazy stream of raw leads.
//! Scrapers are created per run through the [`ScraperRegistry`].

pub mod config;
pub mod direct;
pub mod extract;
pub mod http_client;
pub mod pacing;
pub mod proxy_pool;
pub mod proxy_rotating;
pub mod registry;
pub mod stream;

pub use config::{PauseRange, ScraperSettings};
pub use direct::DirectListingScraper;
pub use extract::{ListingParser, ParsedPage};
pub use http_client::{FetchError, HttpClient};
pub use pacing::Pacing;
pub use proxy_pool::{ProxyPool, RotatingFetcher};
pub use proxy_rotating::ProxyRotatingScraper;
pub use registry::{ScraperFactory, ScraperRegistry};
pub use stream::{LeadResult, LeadSink, LeadStream};

use async_trait::async_trait;
use scraper::ElementRef;
use thiserror::Error;

use crate::models::RawLead;

/// Errors raised by scrapers.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no scraper registered for source type '{0}'")]
    UnknownSourceType(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid {field} selector '{selector}'")]
    Selector { field: String, selector: String },
    #[error("lead producer panicked")]
    ProducerPanicked,
    #[error("{0}")]
    Other(String),
}

/// A scraping strategy for one kind of listing source.
#[async_trait]
pub trait LeadScraper: Send + Sync {
    /// Registry key for this implementation.
    fn source_type(&self) -> &'static str;

    /// Start producing leads.
    ///
    /// The stream ends on its own at the page limit, on an empty page, or when
    /// a page cannot be fetched. Malformed listing elements are skipped.
    async fn produce_leads(&mut self) -> Result<LeadStream, ScrapeError>;

    /// Extract a lead from one listing element, or `None` without a business name.
    fn parse_element(&self, element: &ElementRef<'_>) -> Option<RawLead>;

    /// Release resources held by the scraper.
    async fn cleanup(&mut self) {}
}
