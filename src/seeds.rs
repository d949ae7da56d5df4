//! Built-in source definitions loaded by `harvest init`.

use crate::models::{NewSourceConfig, PaginationType};
use crate::repository::SourceRepository;
use crate::scrapers::{DirectListingScraper, ProxyRotatingScraper};

struct Seed {
    name: &'static str,
    base_url: &'static str,
    pagination: PaginationType,
    delay: f64,
    selectors: &'static [(&'static str, &'static str)],
}

// Directory sources ship disabled; their markup changes often enough that
// selectors should be checked before a source is switched on.
const DIRECTORIES: &[Seed] = &[
    Seed {
        name: "Yellow Pages US",
        base_url: "https://www.yellowpages.com/search",
        pagination: PaginationType::ClickNext,
        delay: 4.0,
        selectors: &[
            ("listing_container", ".search-results .result"),
            ("business_name", ".business-name"),
            ("phone", ".phones"),
            ("website", ".track-visit-website"),
            ("address", ".street-address"),
            ("city", ".locality"),
            ("state", ".region"),
            ("category", ".categories a"),
        ],
    },
    Seed {
        name: "Yelp Business Directory",
        base_url: "https://www.yelp.com/search",
        pagination: PaginationType::InfiniteScroll,
        delay: 5.0,
        selectors: &[
            ("listing_container", "[data-testid='serp-ia-card']"),
            ("business_name", "h3 a"),
            ("phone", "[data-font-weight='semibold']"),
            ("website", "a[href*='biz_redir']"),
            ("address", "address"),
            ("category", "[data-testid='search-result-category']"),
        ],
    },
    Seed {
        name: "Better Business Bureau",
        base_url: "https://www.bbb.org/search",
        pagination: PaginationType::ClickNext,
        delay: 5.0,
        selectors: &[
            ("listing_container", ".search-result"),
            ("business_name", ".business-name"),
            ("phone", ".phone-link"),
            ("website", ".website-link"),
            ("address", ".address"),
        ],
    },
    Seed {
        name: "Indeed Employer Profiles",
        base_url: "https://www.indeed.com/companies",
        pagination: PaginationType::ClickNext,
        delay: 5.0,
        selectors: &[
            ("listing_container", ".css-kyg8or"),
            ("business_name", ".css-92r8pb"),
            ("category", ".css-1saizt3"),
            ("city", ".css-1p0sjhy"),
            ("website", ".css-1c9erw7"),
        ],
    },
    Seed {
        name: "Chamber of Commerce",
        base_url: "https://www.chamberofcommerce.com/business-directory",
        pagination: PaginationType::ClickNext,
        delay: 4.0,
        selectors: &[
            ("listing_container", ".business-card"),
            ("business_name", ".business-title"),
            ("phone", ".business-phone"),
            ("address", ".business-address"),
            ("category", ".business-category"),
            ("website", ".business-website"),
        ],
    },
    Seed {
        name: "Angi Service Providers",
        base_url: "https://www.angi.com/companylist/us/",
        pagination: PaginationType::ClickNext,
        delay: 5.0,
        selectors: &[
            ("listing_container", ".company-card"),
            ("business_name", ".company-name"),
            ("phone", ".phone-number"),
            ("category", ".service-category"),
            ("city", ".service-area"),
        ],
    },
    Seed {
        name: "Houzz Professionals",
        base_url: "https://www.houzz.com/professionals/",
        pagination: PaginationType::InfiniteScroll,
        delay: 6.0,
        selectors: &[
            ("listing_container", ".pro-card"),
            ("business_name", ".pro-name"),
            ("phone", ".contact-phone"),
            ("website", ".contact-website"),
            ("city", ".pro-location"),
            ("category", ".pro-specialties"),
        ],
    },
    Seed {
        name: "Thumbtack Service Pros",
        base_url: "https://www.thumbtack.com/",
        pagination: PaginationType::InfiniteScroll,
        delay: 5.0,
        selectors: &[
            ("listing_container", "[data-test='pro-card']"),
            ("business_name", "[data-test='pro-name']"),
            ("city", "[data-test='location']"),
            ("category", "[data-test='services']"),
        ],
    },
    Seed {
        name: "Zillow Real Estate Agents",
        base_url: "https://www.zillow.com/professionals/real-estate-agent-reviews/",
        pagination: PaginationType::ClickNext,
        delay: 5.0,
        selectors: &[
            ("listing_container", ".ldb-contact-card"),
            ("business_name", ".ldb-contact-name"),
            ("phone", ".ldb-contact-phone"),
            ("email", ".ldb-contact-email"),
            ("website", ".ldb-contact-website"),
            ("city", ".ldb-contact-location"),
        ],
    },
    Seed {
        name: "Healthgrades Providers",
        base_url: "https://www.healthgrades.com/",
        pagination: PaginationType::ClickNext,
        delay: 6.0,
        selectors: &[
            ("listing_container", ".card-provider"),
            ("business_name", ".provider-name"),
            ("category", ".specialty"),
            ("phone", ".phone-number"),
            ("address", ".provider-address"),
        ],
    },
];

/// The built-in sources: disabled directory listings plus the enabled
/// proxy-rotating Yellow Pages search.
pub fn production_sources() -> Vec<NewSourceConfig> {
    let mut sources: Vec<NewSourceConfig> = DIRECTORIES
        .iter()
        .map(|seed| {
            let source =
                NewSourceConfig::new(seed.name, DirectListingScraper::SOURCE_TYPE, seed.base_url)
                    .with_pagination(seed.pagination)
                    .with_delay(seed.delay)
                    .disabled();
            seed.selectors
                .iter()
                .fold(source, |s, (field, selector)| s.with_selector(field, selector))
        })
        .collect();

    sources.push(
        NewSourceConfig::new(
            "Yellow Pages PRO",
            ProxyRotatingScraper::SOURCE_TYPE,
            "https://www.yellowpages.com/new-york-ny/restaurants",
        )
        .with_pagination(PaginationType::ClickNext)
        .with_delay(5.0),
    );
    sources
}

/// What happened to one seed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Loaded(i64),
    Skipped,
    Failed(String),
}

/// Add each source whose name is not taken yet.
///
/// One failing entry never stops the rest.
pub async fn seed_sources(
    repo: &SourceRepository,
    sources: &[NewSourceConfig],
) -> Vec<(String, SeedOutcome)> {
    let mut outcomes = Vec::with_capacity(sources.len());
    for source in sources {
        let outcome = match repo.find_by_name(&source.name).await {
            Ok(Some(_)) => SeedOutcome::Skipped,
            Ok(None) => match repo.add(source).await {
                Ok(id) => SeedOutcome::Loaded(id),
                Err(e) => SeedOutcome::Failed(e.to_string()),
            },
            Err(e) => SeedOutcome::Failed(e.to_string()),
        };
        outcomes.push((source.name.clone(), outcome));
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DbContext;
    use tempfile::tempdir;

    #[test]
    fn test_production_sources_are_well_formed() {
        let sources = production_sources();
        assert_eq!(sources.len(), 11);

        let mut names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 11);

        for source in &sources {
            if source.source_type == DirectListingScraper::SOURCE_TYPE {
                assert!(!source.enabled);
                assert!(source.selectors.contains_key("listing_container"));
                assert!(source.selectors.contains_key("business_name"));
            }
        }
        let pro = sources.last().unwrap();
        assert_eq!(pro.source_type, ProxyRotatingScraper::SOURCE_TYPE);
        assert!(pro.enabled);
    }

    #[tokio::test]
    async fn test_seeding_skips_existing_names() {
        let dir = tempdir().unwrap();
        let ctx = DbContext::new(&dir.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.sources();

        let sources = production_sources();
        let first = seed_sources(&repo, &sources).await;
        assert!(first
            .iter()
            .all(|(_, outcome)| matches!(outcome, SeedOutcome::Loaded(_))));

        let second = seed_sources(&repo, &sources).await;
        assert!(second.iter().all(|(_, outcome)| *outcome == SeedOutcome::Skipped));
        assert_eq!(repo.get_all().await.unwrap().len(), sources.len());
    }
}
