//! Registry mapping source types to scraper constructors.

use std::collections::HashMap;
use std::sync::Arc;

use super::config::ScraperSettings;
use super::direct::DirectListingScraper;
use super::proxy_rotating::ProxyRotatingScraper;
use super::{LeadScraper, ScrapeError};
use crate::models::SourceConfig;

/// Builds a scraper for one source.
pub type ScraperFactory = Arc<
    dyn Fn(&SourceConfig, &ScraperSettings) -> Result<Box<dyn LeadScraper>, ScrapeError>
        + Send
        + Sync,
>;

/// Explicit table of available scrapers, built once at startup.
#[derive(Clone)]
pub struct ScraperRegistry {
    factories: HashMap<String, ScraperFactory>,
    settings: ScraperSettings,
}

impl ScraperRegistry {
    /// An empty registry.
    pub fn new(settings: ScraperSettings) -> Self {
        Self {
            factories: HashMap::new(),
            settings,
        }
    }

    /// A registry with the built-in scrapers.
    pub fn with_defaults(settings: ScraperSettings) -> Self {
        let mut registry = Self::new(settings);
        registry.register(DirectListingScraper::SOURCE_TYPE, |source, settings| {
            Ok(Box::new(DirectListingScraper::new(source, settings)?))
        });
        registry.register(ProxyRotatingScraper::SOURCE_TYPE, |source, settings| {
            Ok(Box::new(ProxyRotatingScraper::new(source, settings)?))
        });
        registry
    }

    /// Register a constructor, replacing any existing one for the type.
    pub fn register<F>(&mut self, source_type: &str, factory: F)
    where
        F: Fn(&SourceConfig, &ScraperSettings) -> Result<Box<dyn LeadScraper>, ScrapeError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(source_type.to_string(), Arc::new(factory));
    }

    pub fn is_registered(&self, source_type: &str) -> bool {
        self.factories.contains_key(source_type)
    }

    /// Registered source types, sorted.
    pub fn source_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn settings(&self) -> &ScraperSettings {
        &self.settings
    }

    /// Instantiate the scraper for a source.
    pub fn create(&self, source: &SourceConfig) -> Result<Box<dyn LeadScraper>, ScrapeError> {
        let factory = self
            .factories
            .get(&source.source_type)
            .ok_or_else(|| ScrapeError::UnknownSourceType(source.source_type.clone()))?;
        factory(source, &self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaginationType, SelectorMap};
    use chrono::Utc;

    fn source(source_type: &str) -> SourceConfig {
        SourceConfig {
            id: 1,
            name: "Registry".into(),
            source_type: source_type.into(),
            base_url: "https://x.test".into(),
            pagination_type: PaginationType::Direct,
            selectors: SelectorMap::new(),
            rate_limit_delay: 1.0,
            proxy_config: None,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_defaults_registered() {
        let registry = ScraperRegistry::with_defaults(ScraperSettings::default());
        assert_eq!(
            registry.source_types(),
            vec!["direct_listing", "proxy_rotating"]
        );

        let scraper = registry.create(&source("direct_listing")).unwrap();
        assert_eq!(scraper.source_type(), "direct_listing");
        let scraper = registry.create(&source("proxy_rotating")).unwrap();
        assert_eq!(scraper.source_type(), "proxy_rotating");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let registry = ScraperRegistry::with_defaults(ScraperSettings::default());
        assert!(matches!(
            registry.create(&source("carrier_pigeon")),
            Err(ScrapeError::UnknownSourceType(t)) if t == "carrier_pigeon"
        ));
        assert!(!registry.is_registered("carrier_pigeon"));
    }
}
