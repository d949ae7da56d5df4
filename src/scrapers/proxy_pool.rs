//! Rotating proxy pool and the bounded retry-with-rotation fetch path.
//!
//! Proxy state lives in one pool per scraper instance and is never shared
//! between sources.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Proxy};
use tracing::{debug, info, warn};

use super::config::{PauseRange, ScraperSettings};
use super::http_client::{build_client, proxied_headers};

/// Parse a plain-text proxy list into `host:port` entries.
pub fn parse_proxy_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            line.rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                .unwrap_or(false)
        })
        .map(str::to_string)
        .collect()
}

/// Candidate, working and failed proxies for one scraper.
pub struct ProxyPool {
    candidates: VecDeque<String>,
    working: Vec<String>,
    failed: HashSet<String>,
    sources: Vec<String>,
    discovered: bool,
    probe_url: String,
    probe_timeout: Duration,
    probe_batch: usize,
}

impl ProxyPool {
    pub fn new(settings: &ScraperSettings) -> Self {
        Self {
            candidates: settings.proxies.iter().cloned().collect(),
            working: Vec::new(),
            failed: HashSet::new(),
            sources: settings.proxy_sources.clone(),
            discovered: false,
            probe_url: settings.proxy_probe_url.clone(),
            probe_timeout: settings.probe_timeout(),
            probe_batch: settings.proxy_probe_batch.max(1),
        }
    }

    /// Add candidates without going through discovery.
    pub fn with_candidates(mut self, proxies: impl IntoIterator<Item = String>) -> Self {
        self.add_candidates(proxies);
        self
    }

    fn add_candidates(&mut self, proxies: impl IntoIterator<Item = String>) -> usize {
        let mut added = 0;
        for proxy in proxies {
            if !self.failed.contains(&proxy)
                && !self.working.contains(&proxy)
                && !self.candidates.contains(&proxy)
            {
                self.candidates.push_back(proxy);
                added += 1;
            }
        }
        added
    }

    /// Fetch candidate lists from the configured sources.
    ///
    /// Failures are logged and skipped; finding nothing is not an error.
    pub async fn discover(&mut self) -> usize {
        self.discovered = true;
        if self.sources.is_empty() {
            return 0;
        }

        let client = match build_client(Duration::from_secs(10), Vec::new()) {
            Ok(client) => client,
            Err(e) => {
                warn!("Proxy discovery unavailable: {}", e);
                return 0;
            }
        };

        let mut found = Vec::new();
        for source in &self.sources {
            match client.get(source).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => found.extend(parse_proxy_list(&text)),
                    Err(e) => debug!("Proxy list {} unreadable: {}", source, e),
                },
                Ok(resp) => debug!("Proxy list {} returned {}", source, resp.status()),
                Err(e) => debug!("Proxy list {} failed: {}", source, e),
            }
        }

        let added = self.add_candidates(found);
        info!("Loaded {} proxy candidates", added);
        added
    }

    /// Draw a proxy: a known-working one if any, otherwise probe candidates.
    pub async fn draw(&mut self) -> Option<String> {
        if !self.working.is_empty() {
            let idx = rand::rng().random_range(0..self.working.len());
            return Some(self.working[idx].clone());
        }

        let mut probed = 0;
        while probed < self.probe_batch {
            if self.candidates.is_empty() && !self.discovered {
                self.discover().await;
            }
            let Some(candidate) = self.candidates.pop_front() else {
                break;
            };
            if self.failed.contains(&candidate) {
                continue;
            }
            probed += 1;
            if self.probe(&candidate).await {
                self.working.push(candidate.clone());
                return Some(candidate);
            }
            self.failed.insert(candidate);
        }

        None
    }

    async fn probe(&self, proxy: &str) -> bool {
        let Some(client) = proxied_client(proxy, self.probe_timeout) else {
            return false;
        };
        match client.get(&self.probe_url).send().await {
            Ok(resp) => resp.status().as_u16() == 200,
            Err(e) => {
                debug!("Proxy {} failed probe: {}", proxy, e);
                false
            }
        }
    }

    /// Take a proxy out of rotation.
    pub fn mark_failed(&mut self, proxy: &str) {
        self.working.retain(|p| p != proxy);
        self.failed.insert(proxy.to_string());
    }

    pub fn working_count(&self) -> usize {
        self.working.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

fn proxied_client(proxy: &str, timeout: Duration) -> Option<Client> {
    let proxy = match Proxy::all(format!("http://{}", proxy)) {
        Ok(p) => p,
        Err(e) => {
            debug!("Invalid proxy {}: {}", proxy, e);
            return None;
        }
    };
    build_client(timeout, vec![proxy]).ok()
}

/// Fetches pages through rotating proxies with a bounded number of attempts.
pub struct RotatingFetcher {
    pool: ProxyPool,
    current: Option<(String, Client)>,
    request_timeout: Duration,
    max_attempts: u32,
    success_pause: PauseRange,
    retry_pause: PauseRange,
}

impl RotatingFetcher {
    pub fn new(pool: ProxyPool, settings: &ScraperSettings) -> Self {
        Self {
            pool,
            current: None,
            request_timeout: settings.request_timeout(),
            max_attempts: settings.proxy_max_attempts.max(1),
            success_pause: settings.proxy_success_pause,
            retry_pause: settings.proxy_retry_pause,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Fetch a page. `None` means every attempt failed or no proxy was usable.
    ///
    /// 403 and transport errors retire the current proxy; other non-200
    /// statuses retry through the same proxy after a pause.
    pub async fn fetch(&mut self, url: &str) -> Option<String> {
        for attempt in 1..=self.max_attempts {
            if self.current.is_none() {
                let proxy = match self.pool.draw().await {
                    Some(proxy) => proxy,
                    None => {
                        warn!("No working proxy available for {}", url);
                        return None;
                    }
                };
                let client = match proxied_client(&proxy, self.request_timeout) {
                    Some(client) => client,
                    None => {
                        self.pool.mark_failed(&proxy);
                        continue;
                    }
                };
                self.current = Some((proxy, client));
            }
            let Some((proxy, client)) = self.current.as_ref() else {
                continue;
            };
            let proxy = proxy.clone();

            let mut request = client.get(url);
            for (name, value) in proxied_headers() {
                request = request.header(name, value);
            }

            match request.send().await {
                Ok(resp) if resp.status().as_u16() == 200 => match resp.text().await {
                    Ok(body) => {
                        self.success_pause.sleep().await;
                        return Some(body);
                    }
                    Err(e) => {
                        debug!("Body read via {} failed: {}", proxy, e);
                        self.retire(&proxy);
                    }
                },
                Ok(resp) if resp.status().as_u16() == 403 => {
                    warn!(
                        "Proxy {} blocked on {} (attempt {}/{})",
                        proxy, url, attempt, self.max_attempts
                    );
                    self.retire(&proxy);
                }
                Ok(resp) => {
                    debug!(
                        "{} via {} returned {} (attempt {}/{})",
                        url,
                        proxy,
                        resp.status(),
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => {
                    debug!("Request via {} failed: {}", proxy, e);
                    self.retire(&proxy);
                }
            }
            self.retry_pause.sleep().await;
        }

        warn!("Giving up on {} after {} proxy attempts", url, self.max_attempts);
        None
    }

    fn retire(&mut self, proxy: &str) {
        self.pool.mark_failed(proxy);
        self.current = None;
    }
}
