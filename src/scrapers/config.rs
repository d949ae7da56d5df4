//! Request-layer settings shared by all scrapers.
//!
//! These are process-wide knobs; per-source values such as the base delay and
//! static proxy come from the source configuration itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A randomized pause, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseRange {
    pub min: f64,
    pub max: f64,
}

impl PauseRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn none() -> Self {
        Self { min: 0.0, max: 0.0 }
    }

    /// Pick a duration uniformly within the range.
    pub fn sample(&self) -> Duration {
        use rand::Rng;

        let secs = if self.max <= self.min {
            self.min
        } else {
            rand::rng().random_range(self.min..=self.max)
        };
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Sleep for a sampled duration. Zero ranges return immediately.
    pub async fn sleep(&self) {
        let pause = self.sample();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

/// Settings for HTTP fetching, pacing and proxy rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Lower bound of the jittered post-request delay.
    pub min_delay_secs: f64,
    /// Upper bound of the jittered post-request delay.
    pub max_delay_secs: f64,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// First backoff step; doubles on each retry.
    pub backoff_base_secs: f64,
    /// Page limit for paginated sources.
    pub max_pages: u32,
    /// `host:port` proxies tried before any discovered ones.
    pub proxies: Vec<String>,
    /// URLs serving plain `host:port` proxy lists.
    pub proxy_sources: Vec<String>,
    /// URL used to check that a proxy works.
    pub proxy_probe_url: String,
    pub proxy_probe_timeout_secs: u64,
    /// Candidates probed per draw before giving up.
    pub proxy_probe_batch: usize,
    /// Attempts per request through the rotating proxy path.
    pub proxy_max_attempts: u32,
    /// Pause after a successful proxied fetch.
    pub proxy_success_pause: PauseRange,
    /// Pause after a blocked or failed proxied fetch.
    pub proxy_retry_pause: PauseRange,
    /// Pause between parsed listing elements.
    pub element_pause: PauseRange,
    /// Pause between listing pages.
    pub page_pause: PauseRange,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            min_delay_secs: 2.0,
            max_delay_secs: 7.0,
            max_attempts: 3,
            backoff_base_secs: 1.0,
            max_pages: 5,
            proxies: Vec::new(),
            proxy_sources: vec![
                "https://api.proxyscrape.com/v2/?request=get&protocol=http&timeout=10000&country=all"
                    .to_string(),
                "https://www.proxy-list.download/api/v1/get?type=http".to_string(),
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt"
                    .to_string(),
            ],
            proxy_probe_url: "http://httpbin.org/ip".to_string(),
            proxy_probe_timeout_secs: 5,
            proxy_probe_batch: 10,
            proxy_max_attempts: 5,
            proxy_success_pause: PauseRange::new(3.0, 7.0),
            proxy_retry_pause: PauseRange::new(2.0, 3.0),
            element_pause: PauseRange::new(0.3, 1.0),
            page_pause: PauseRange::new(5.0, 10.0),
        }
    }
}

impl ScraperSettings {
    /// Settings with every pause and backoff disabled.
    ///
    /// Useful for local fixtures and tests.
    pub fn without_pauses() -> Self {
        Self {
            min_delay_secs: 0.0,
            max_delay_secs: 0.0,
            backoff_base_secs: 0.0,
            proxy_sources: Vec::new(),
            proxy_success_pause: PauseRange::none(),
            proxy_retry_pause: PauseRange::none(),
            element_pause: PauseRange::none(),
            page_pause: PauseRange::none(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_probe_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs_f64(self.backoff_base_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_range_sample_within_bounds() {
        let range = PauseRange::new(0.5, 1.5);
        for _ in 0..50 {
            let d = range.sample().as_secs_f64();
            assert!((0.5..=1.5).contains(&d));
        }
        assert!(PauseRange::none().sample().is_zero());
        // Inverted ranges collapse to the minimum.
        assert_eq!(PauseRange::new(2.0, 1.0).sample(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: ScraperSettings = toml::from_str("max_pages = 2").unwrap();
        assert_eq!(settings.max_pages, 2);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }
}
