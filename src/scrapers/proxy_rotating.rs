//! Scraper that fetches every page through rotating proxies.
//!
//! Defaults target the Yellow Pages search result layout; any selector can be
//! overridden by the source configuration.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::ElementRef;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::{PauseRange, ScraperSettings};
use super::extract::{page_url, ListingParser};
use super::proxy_pool::{ProxyPool, RotatingFetcher};
use super::stream::{LeadSink, LeadStream, DEFAULT_STREAM_CAPACITY};
use super::{LeadScraper, ScrapeError};
use crate::models::{RawLead, SourceConfig};

pub const DEFAULT_CONTAINER: &str = ".result, .search-results .result";

pub const DEFAULT_FIELDS: &[(&str, &str)] = &[
    ("business_name", ".business-name, h2.business-name, h2 a"),
    ("phone", ".phones, .phone"),
    ("city", ".locality"),
    ("state", ".region"),
];

pub struct ProxyRotatingScraper {
    name: String,
    base_url: String,
    fetcher: Arc<Mutex<RotatingFetcher>>,
    parser: ListingParser,
    max_pages: u32,
    element_pause: PauseRange,
    page_pause: PauseRange,
}

impl ProxyRotatingScraper {
    pub const SOURCE_TYPE: &'static str = "proxy_rotating";

    pub fn new(source: &SourceConfig, settings: &ScraperSettings) -> Result<Self, ScrapeError> {
        let parser = ListingParser::new(&source.selectors, DEFAULT_CONTAINER, DEFAULT_FIELDS)?
            .with_default_category(&source.name);
        let fetcher = RotatingFetcher::new(ProxyPool::new(settings), settings);

        Ok(Self {
            name: source.name.clone(),
            base_url: source.base_url.clone(),
            fetcher: Arc::new(Mutex::new(fetcher)),
            parser,
            max_pages: settings.max_pages.max(1),
            element_pause: settings.element_pause,
            page_pause: settings.page_pause,
        })
    }
}

#[async_trait]
impl LeadScraper for ProxyRotatingScraper {
    fn source_type(&self) -> &'static str {
        Self::SOURCE_TYPE
    }

    async fn produce_leads(&mut self) -> Result<LeadStream, ScrapeError> {
        let crawl = ProxiedCrawl {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            fetcher: self.fetcher.clone(),
            parser: self.parser.clone(),
            max_pages: self.max_pages,
            element_pause: self.element_pause,
            page_pause: self.page_pause,
        };
        Ok(LeadStream::spawn(DEFAULT_STREAM_CAPACITY, move |sink| {
            crawl.run(sink)
        }))
    }

    fn parse_element(&self, element: &ElementRef<'_>) -> Option<RawLead> {
        self.parser.parse_element(element)
    }

    async fn cleanup(&mut self) {
        let fetcher = self.fetcher.lock().await;
        debug!(
            "{}: proxy pool finished with {} working, {} failed",
            self.name,
            fetcher.pool().working_count(),
            fetcher.pool().failed_count()
        );
    }
}

struct ProxiedCrawl {
    name: String,
    base_url: String,
    fetcher: Arc<Mutex<RotatingFetcher>>,
    parser: ListingParser,
    max_pages: u32,
    element_pause: PauseRange,
    page_pause: PauseRange,
}

impl ProxiedCrawl {
    async fn run(self, sink: LeadSink) -> Result<(), ScrapeError> {
        let mut total = 0usize;

        for page in 1..=self.max_pages {
            let url = page_url(&self.base_url, page);
            let html = self.fetcher.lock().await.fetch(&url).await;
            let Some(html) = html else {
                warn!("{}: no response for page {}, stopping", self.name, page);
                break;
            };

            let parsed = self.parser.parse_page(&html);
            if parsed.elements == 0 {
                debug!("{}: page {} has no results", self.name, page);
                break;
            }

            for lead in parsed.leads {
                if !sink.send(lead).await {
                    return Ok(());
                }
                total += 1;
                self.element_pause.sleep().await;
            }

            if page < self.max_pages {
                self.page_pause.sleep().await;
            }
        }

        info!("{}: produced {} leads through proxies", self.name, total);
        Ok(())
    }
}
