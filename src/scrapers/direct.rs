//! Scraper for sites that list businesses directly in their HTML.

use async_trait::async_trait;
use scraper::ElementRef;
use tracing::{debug, info, warn};

use super::config::ScraperSettings;
use super::extract::{page_url, resolve_url, ListingParser};
use super::http_client::HttpClient;
use super::pacing::Pacing;
use super::stream::{LeadSink, LeadStream, DEFAULT_STREAM_CAPACITY};
use super::{LeadScraper, ScrapeError};
use crate::models::{PaginationType, RawLead, SourceConfig};

/// Container selector used when a source does not configure one.
pub const DEFAULT_CONTAINER: &str = ".listing";

/// Fetches listing pages and follows the source's pagination strategy.
pub struct DirectListingScraper {
    name: String,
    base_url: String,
    pagination: PaginationType,
    client: HttpClient,
    parser: ListingParser,
    max_pages: u32,
}

impl DirectListingScraper {
    pub const SOURCE_TYPE: &'static str = "direct_listing";

    pub fn new(source: &SourceConfig, settings: &ScraperSettings) -> Result<Self, ScrapeError> {
        let pacing = Pacing::new(
            source.rate_limit_delay,
            settings.min_delay_secs,
            settings.max_delay_secs,
        );
        let client = HttpClient::new(settings, pacing, source.proxy_config.as_ref())?;
        let parser = ListingParser::new(&source.selectors, DEFAULT_CONTAINER, &[])?;

        Ok(Self {
            name: source.name.clone(),
            base_url: source.base_url.clone(),
            pagination: source.pagination_type,
            client,
            parser,
            max_pages: settings.max_pages.max(1),
        })
    }
}

#[async_trait]
impl LeadScraper for DirectListingScraper {
    fn source_type(&self) -> &'static str {
        Self::SOURCE_TYPE
    }

    async fn produce_leads(&mut self) -> Result<LeadStream, ScrapeError> {
        let crawl = PageCrawl {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            pagination: self.pagination,
            client: self.client.clone(),
            parser: self.parser.clone(),
            max_pages: self.max_pages,
        };
        Ok(LeadStream::spawn(DEFAULT_STREAM_CAPACITY, move |sink| {
            crawl.run(sink)
        }))
    }

    fn parse_element(&self, element: &ElementRef<'_>) -> Option<RawLead> {
        self.parser.parse_element(element)
    }
}

/// Owned state for the producer task.
struct PageCrawl {
    name: String,
    base_url: String,
    pagination: PaginationType,
    client: HttpClient,
    parser: ListingParser,
    max_pages: u32,
}

impl PageCrawl {
    async fn run(self, sink: LeadSink) -> Result<(), ScrapeError> {
        let mut url = self.base_url.clone();
        let mut referer: Option<String> = None;
        let mut total = 0usize;

        for page in 1..=self.max_pages {
            let html = match self.client.get_text(&url, referer.as_deref()).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("{}: stopping at page {}: {}", self.name, page, e);
                    break;
                }
            };

            let parsed = self.parser.parse_page(&html);
            if parsed.elements == 0 {
                debug!("{}: page {} has no listings", self.name, page);
                break;
            }
            debug!(
                "{}: page {} yielded {}/{} listings",
                self.name,
                page,
                parsed.leads.len(),
                parsed.elements
            );

            for lead in parsed.leads {
                if !sink.send(lead).await {
                    return Ok(());
                }
                total += 1;
            }

            if page == self.max_pages {
                break;
            }
            let next = match self.pagination {
                PaginationType::Direct => break,
                PaginationType::ClickNext => {
                    match parsed.next_href.and_then(|href| resolve_url(&url, &href)) {
                        Some(next) => next,
                        None if self.parser.has_next_page_selector() => break,
                        None => page_url(&self.base_url, page + 1),
                    }
                }
                PaginationType::InfiniteScroll => page_url(&self.base_url, page + 1),
            };
            referer = Some(std::mem::replace(&mut url, next));
        }

        info!("{}: produced {} leads", self.name, total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectorMap;
    use chrono::Utc;
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    fn listing_page(page: u32, count: u32, next: bool) -> String {
        let mut html = String::from("<html><body>");
        for i in 0..count {
            html.push_str(&format!(
                r#"<div class="listing"><h2 class="name">Biz {page}-{i}</h2><span class="phone">555-{page}{i:03}</span></div>"#
            ));
        }
        if next {
            html.push_str(&format!(r#"<a class="next" href="/list?page={}">Next</a>"#, page + 1));
        }
        html.push_str("</body></html>");
        html
    }

    async fn serve(pages: u32) -> String {
        let router = Router::new().route(
            "/list",
            get(move |Query(q): Query<HashMap<String, String>>| async move {
                let page: u32 = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                if page > pages {
                    return (StatusCode::OK, "<html><body></body></html>".to_string());
                }
                (StatusCode::OK, listing_page(page, 2, page < pages))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/list", addr)
    }

    fn source(base_url: &str, pagination: PaginationType, selectors: &[(&str, &str)]) -> SourceConfig {
        SourceConfig {
            id: 1,
            name: "Fixture".into(),
            source_type: DirectListingScraper::SOURCE_TYPE.into(),
            base_url: base_url.into(),
            pagination_type: pagination,
            selectors: selectors
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<SelectorMap>(),
            rate_limit_delay: 0.0,
            proxy_config: None,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    async fn collect(scraper: &mut DirectListingScraper) -> Vec<RawLead> {
        let mut stream = scraper.produce_leads().await.unwrap();
        let mut leads = Vec::new();
        while let Some(item) = stream.next().await {
            leads.push(item.unwrap());
        }
        leads
    }

    const FIELDS: &[(&str, &str)] = &[("business_name", ".name"), ("phone", ".phone")];

    #[tokio::test]
    async fn test_direct_pagination_fetches_one_page() {
        let base = serve(3).await;
        let mut scraper = DirectListingScraper::new(
            &source(&base, PaginationType::Direct, FIELDS),
            &ScraperSettings::without_pauses(),
        )
        .unwrap();

        let leads = collect(&mut scraper).await;
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].business_name.as_deref(), Some("Biz 1-0"));
    }

    #[tokio::test]
    async fn test_click_next_follows_links_until_last_page() {
        let base = serve(3).await;
        let mut selectors = FIELDS.to_vec();
        selectors.push(("next_page", "a.next"));
        let mut scraper = DirectListingScraper::new(
            &source(&base, PaginationType::ClickNext, &selectors),
            &ScraperSettings::without_pauses(),
        )
        .unwrap();

        let leads = collect(&mut scraper).await;
        assert_eq!(leads.len(), 6);
        assert_eq!(leads[5].business_name.as_deref(), Some("Biz 3-1"));
    }

    #[tokio::test]
    async fn test_infinite_scroll_stops_on_empty_page_and_page_limit() {
        let base = serve(2).await;
        let mut scraper = DirectListingScraper::new(
            &source(&base, PaginationType::InfiniteScroll, FIELDS),
            &ScraperSettings::without_pauses(),
        )
        .unwrap();
        assert_eq!(collect(&mut scraper).await.len(), 4);

        let base = serve(10).await;
        let settings = ScraperSettings {
            max_pages: 3,
            ..ScraperSettings::without_pauses()
        };
        let mut scraper = DirectListingScraper::new(
            &source(&base, PaginationType::InfiniteScroll, FIELDS),
            &settings,
        )
        .unwrap();
        assert_eq!(collect(&mut scraper).await.len(), 6);
    }

    #[tokio::test]
    async fn test_unreachable_source_ends_stream() {
        let settings = ScraperSettings {
            request_timeout_secs: 2,
            ..ScraperSettings::without_pauses()
        };
        let mut scraper = DirectListingScraper::new(
            &source("http://127.0.0.1:9/list", PaginationType::Direct, FIELDS),
            &settings,
        )
        .unwrap();
        assert!(collect(&mut scraper).await.is_empty());
    }
}
