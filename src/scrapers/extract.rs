//! HTML listing extraction.
//!
//! Parsing is synchronous and never holds a document across an await point,
//! so scrapers parse a whole page and then stream the results.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::ScrapeError;
use crate::models::{RawLead, SelectorMap};

/// Selector key for the element wrapping one listing.
pub const CONTAINER_KEY: &str = "listing_container";
/// Selector key for the "next page" link.
pub const NEXT_PAGE_KEY: &str = "next_page";

/// Fields read from an attribute before falling back to text.
const HREF_FIELDS: &[&str] = &["website"];

/// Build the URL of a numbered page by setting its `page` query parameter.
pub fn page_url(base: &str, page: u32) -> String {
    if page <= 1 {
        return base.to_string();
    }
    match Url::parse(base) {
        Ok(mut url) => {
            let pairs: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| k != "page")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs)
                .append_pair("page", &page.to_string());
            url.to_string()
        }
        Err(_) => {
            let sep = if base.contains('?') { '&' } else { '?' };
            format!("{}{}page={}", base, sep, page)
        }
    }
}

/// Resolve a possibly relative link against the page it came from.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

fn collapse_text(element: &ElementRef) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Text of the first match of `selector` within `element`.
pub fn select_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(|e| collapse_text(&e))
}

/// `href` of the first match, falling back to its text.
pub fn select_href(element: &ElementRef, selector: &Selector) -> Option<String> {
    let found = element.select(selector).next()?;
    found
        .value()
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| collapse_text(&found))
}

fn compile(field: &str, selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|_| ScrapeError::Selector {
        field: field.to_string(),
        selector: selector.to_string(),
    })
}

/// One parsed listing page.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub leads: Vec<RawLead>,
    /// Listing elements present on the page, including unparseable ones.
    pub elements: usize,
    /// Link to the next page, if the page has one.
    pub next_href: Option<String>,
}

/// Extracts leads from listing pages using a source's selector map.
///
/// Selectors are kept as strings and compiled per page so the parser can move
/// freely between tasks.
#[derive(Debug, Clone)]
pub struct ListingParser {
    container: String,
    next_page: Option<String>,
    fields: Vec<(String, String)>,
    default_category: Option<String>,
}

impl ListingParser {
    /// Build a parser from configured selectors layered over defaults.
    ///
    /// An invalid container selector is a configuration error. Invalid field
    /// selectors are dropped with a warning, so that field is always empty.
    pub fn new(
        selectors: &SelectorMap,
        default_container: &str,
        default_fields: &[(&str, &str)],
    ) -> Result<Self, ScrapeError> {
        let container = selectors
            .get(CONTAINER_KEY)
            .map(String::as_str)
            .unwrap_or(default_container)
            .to_string();
        compile(CONTAINER_KEY, &container)?;

        let next_page = match selectors.get(NEXT_PAGE_KEY) {
            Some(sel) if compile(NEXT_PAGE_KEY, sel).is_ok() => Some(sel.clone()),
            Some(sel) => {
                warn!("Ignoring invalid next-page selector '{}'", sel);
                None
            }
            None => None,
        };

        let mut merged: Vec<(String, String)> = default_fields
            .iter()
            .filter(|(field, _)| !selectors.contains_key(*field))
            .map(|(f, s)| (f.to_string(), s.to_string()))
            .collect();
        merged.extend(
            selectors
                .iter()
                .filter(|(field, _)| *field != CONTAINER_KEY && *field != NEXT_PAGE_KEY)
                .map(|(f, s)| (f.clone(), s.clone())),
        );

        let fields = merged
            .into_iter()
            .filter(|(field, selector)| match compile(field, selector) {
                Ok(_) => true,
                Err(e) => {
                    warn!("{}; field will be empty", e);
                    false
                }
            })
            .collect();

        Ok(Self {
            container,
            next_page,
            fields,
            default_category: None,
        })
    }

    /// Category used when no category selector matches.
    pub fn with_default_category(mut self, category: &str) -> Self {
        self.default_category = Some(category.to_string());
        self
    }

    pub fn has_next_page_selector(&self) -> bool {
        self.next_page.is_some()
    }

    /// Extract one lead from a listing element.
    ///
    /// Returns `None` when the business name cannot be read.
    pub fn parse_element(&self, element: &ElementRef) -> Option<RawLead> {
        let mut lead = RawLead::default();
        for (field, selector) in &self.fields {
            let Ok(selector) = Selector::parse(selector) else {
                continue;
            };
            let value = if HREF_FIELDS.contains(&field.as_str()) {
                select_href(element, &selector)
            } else {
                select_text(element, &selector)
            };
            lead.set_field(field, value);
        }
        if lead.category.is_none() {
            lead.category = self.default_category.clone();
        }

        if lead.name().is_none() {
            debug!("Listing element without business name discarded");
            return None;
        }
        Some(lead)
    }

    /// Parse every listing element on a page.
    pub fn parse_page(&self, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);
        let mut page = ParsedPage::default();

        let Ok(container) = Selector::parse(&self.container) else {
            return page;
        };
        for element in document.select(&container) {
            page.elements += 1;
            match self.parse_element(&element) {
                Some(lead) => page.leads.push(lead),
                None => warn!("Skipping malformed listing element"),
            }
        }

        if let Some(next) = self.next_page.as_deref() {
            if let Ok(selector) = Selector::parse(next) {
                page.next_href = document
                    .select(&selector)
                    .next()
                    .and_then(|e| e.value().attr("href"))
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string);
            }
        }

        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="listing">
            <h2 class="name"> Joe's   Diner </h2>
            <span class="phone">(512) 555-0100</span>
            <a class="site" href="https://joes.test">Visit</a>
            <span class="rating">4.5</span>
          </div>
          <div class="listing">
            <span class="phone">555-0199</span>
          </div>
          <div class="listing">
            <h2 class="name">Acme Plumbing</h2>
            <a class="site">acme.test</a>
          </div>
          <a class="next" href="/list?page=2">Next</a>
        </body></html>
    "#;

    fn selectors() -> SelectorMap {
        [
            ("business_name", ".name"),
            ("phone", ".phone"),
            ("website", ".site"),
            ("rating", ".rating"),
            ("next_page", "a.next"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_parse_page_skips_nameless_elements() {
        let parser = ListingParser::new(&selectors(), ".listing", &[]).unwrap();
        let page = parser.parse_page(PAGE);

        assert_eq!(page.elements, 3);
        assert_eq!(page.leads.len(), 2);
        let joe = &page.leads[0];
        assert_eq!(joe.business_name.as_deref(), Some("Joe's Diner"));
        assert_eq!(joe.phone.as_deref(), Some("(512) 555-0100"));
        assert_eq!(joe.website.as_deref(), Some("https://joes.test"));
        assert_eq!(joe.metadata.get("rating").unwrap(), "4.5");

        // Website falls back to link text without an href.
        assert_eq!(page.leads[1].website.as_deref(), Some("acme.test"));
        assert_eq!(page.leads[1].phone, None);
        assert_eq!(page.next_href.as_deref(), Some("/list?page=2"));
    }

    #[test]
    fn test_configured_selectors_override_defaults() {
        let mut map = SelectorMap::new();
        map.insert("business_name".into(), "h2".into());
        let parser = ListingParser::new(
            &map,
            ".listing",
            &[("business_name", ".missing"), ("phone", ".phone")],
        )
        .unwrap()
        .with_default_category("Restaurants");

        let page = parser.parse_page(PAGE);
        assert_eq!(page.leads.len(), 2);
        assert_eq!(page.leads[0].business_name.as_deref(), Some("Joe's Diner"));
        assert_eq!(page.leads[0].category.as_deref(), Some("Restaurants"));
        assert!(page.next_href.is_none());
    }

    #[test]
    fn test_invalid_selectors() {
        let mut map = SelectorMap::new();
        map.insert("listing_container".into(), "[[[".into());
        assert!(matches!(
            ListingParser::new(&map, ".listing", &[]),
            Err(ScrapeError::Selector { .. })
        ));

        let mut map = selectors();
        map.insert("phone".into(), "<<bad>>".into());
        let parser = ListingParser::new(&map, ".listing", &[]).unwrap();
        let page = parser.parse_page(PAGE);
        assert_eq!(page.leads.len(), 2);
        assert_eq!(page.leads[0].phone, None);
    }

    #[test]
    fn test_page_url() {
        assert_eq!(page_url("https://x.test/list", 1), "https://x.test/list");
        assert_eq!(
            page_url("https://x.test/list", 3),
            "https://x.test/list?page=3"
        );
        assert_eq!(
            page_url("https://x.test/list?q=food&page=2", 4),
            "https://x.test/list?q=food&page=4"
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://x.test/list?page=1", "/list?page=2").as_deref(),
            Some("https://x.test/list?page=2")
        );
        assert_eq!(
            resolve_url("https://x.test/a", "https://y.test/b").as_deref(),
            Some("https://y.test/b")
        );
    }
}
