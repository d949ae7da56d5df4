//! Source models for lead listing sites.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a source paginates its listing pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    /// Everything is on the first page.
    #[default]
    Direct,
    /// A "next" link leads to the following page.
    ClickNext,
    /// Results load as the user scrolls; fetched page by page.
    InfiniteScroll,
}

impl PaginationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ClickNext => "click_next",
            Self::InfiniteScroll => "infinite_scroll",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "click_next" => Some(Self::ClickNext),
            "infinite_scroll" => Some(Self::InfiniteScroll),
            _ => None,
        }
    }
}

/// Static proxy settings for a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

/// Field name to CSS selector mapping.
pub type SelectorMap = BTreeMap<String, String>;

/// A configured listing source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database row ID.
    pub id: i64,
    /// Unique human-readable name.
    pub name: String,
    /// Registry key selecting the scraper implementation.
    pub source_type: String,
    /// Entry URL for the listing.
    pub base_url: String,
    pub pagination_type: PaginationType,
    pub selectors: SelectorMap,
    /// Base delay between requests, in seconds.
    pub rate_limit_delay: f64,
    pub proxy_config: Option<ProxyConfig>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceConfig {
    /// Look up the selector configured for a field.
    pub fn selector(&self, field: &str) -> Option<&str> {
        self.selectors.get(field).map(|s| s.as_str())
    }
}

/// A source definition that has not been stored yet.
///
/// This is the shape used by seed lists and config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSourceConfig {
    pub name: String,
    pub source_type: String,
    pub base_url: String,
    #[serde(default)]
    pub pagination_type: PaginationType,
    #[serde(default)]
    pub selectors: SelectorMap,
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_rate_limit_delay() -> f64 {
    3.0
}

fn default_enabled() -> bool {
    true
}

impl NewSourceConfig {
    /// Create an enabled source with default delay and no selectors.
    pub fn new(name: &str, source_type: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            source_type: source_type.to_string(),
            base_url: base_url.to_string(),
            pagination_type: PaginationType::Direct,
            selectors: SelectorMap::new(),
            rate_limit_delay: default_rate_limit_delay(),
            proxy_config: None,
            enabled: true,
        }
    }

    pub fn with_selector(mut self, field: &str, selector: &str) -> Self {
        self.selectors.insert(field.to_string(), selector.to_string());
        self
    }

    pub fn with_pagination(mut self, pagination_type: PaginationType) -> Self {
        self.pagination_type = pagination_type;
        self
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.rate_limit_delay = seconds;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Partial update of a source. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub name: Option<String>,
    pub source_type: Option<String>,
    pub base_url: Option<String>,
    pub pagination_type: Option<PaginationType>,
    pub selectors: Option<SelectorMap>,
    pub rate_limit_delay: Option<f64>,
    /// `Some(None)` clears the proxy.
    pub proxy_config: Option<Option<ProxyConfig>>,
    pub enabled: Option<bool>,
}

impl SourceUpdate {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }
}
