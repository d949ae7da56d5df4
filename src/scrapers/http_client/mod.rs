//! HTTP client with retry, backoff and per-source pacing.

mod user_agent;

pub use user_agent::{navigation_headers, proxied_headers, random_user_agent, USER_AGENTS};

use std::time::Duration;

use reqwest::{Client, Proxy};
use thiserror::Error;
use tracing::{debug, warn};

use super::config::ScraperSettings;
use super::pacing::Pacing;
use crate::models::ProxyConfig;

/// Statuses worth retrying with backoff.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Errors from fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{url} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    fn transport(url: &str, e: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }

    /// Connection failures and transient server statuses are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }
}

/// Build a reqwest client with optional proxies.
pub fn build_client(timeout: Duration, proxies: Vec<Proxy>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true);
    for proxy in proxies {
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| FetchError::Client(e.to_string()))
}

/// Translate a source's static proxy settings into reqwest proxies.
pub fn static_proxies(config: Option<&ProxyConfig>) -> Result<Vec<Proxy>, FetchError> {
    let Some(config) = config else {
        return Ok(Vec::new());
    };
    let mut proxies = Vec::new();
    if let Some(http) = &config.http {
        proxies.push(Proxy::http(http).map_err(|e| FetchError::Client(e.to_string()))?);
    }
    if let Some(https) = &config.https {
        proxies.push(Proxy::https(https).map_err(|e| FetchError::Client(e.to_string()))?);
    }
    Ok(proxies)
}

/// HTTP client used by listing scrapers.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    pacing: Pacing,
    max_attempts: u32,
    backoff_base: Duration,
}

impl HttpClient {
    /// Create a client for one source.
    pub fn new(
        settings: &ScraperSettings,
        pacing: Pacing,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(settings.request_timeout(), static_proxies(proxy)?)?,
            pacing,
            max_attempts: settings.max_attempts.max(1),
            backoff_base: settings.backoff_base(),
        })
    }

    /// Pacing applied after each successful fetch.
    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Fetch a page body, retrying transient failures with exponential backoff.
    ///
    /// On success the source's jittered delay is applied before returning.
    pub async fn get_text(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.fetch_once(url, referer).await {
                Ok(body) => {
                    self.pacing.pause().await;
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                    if attempt < self.max_attempts {
                        let backoff = self.backoff_base * 2u32.saturating_pow(attempt - 1);
                        debug!(
                            "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt, self.max_attempts, url, e, backoff
                        );
                        if !backoff.is_zero() {
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!("Giving up on {} after {} attempts", url, self.max_attempts);
        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            last: last_error,
        })
    }

    async fn fetch_once(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in navigation_headers(referer) {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::transport(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::Router;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> HttpClient {
        HttpClient::new(&ScraperSettings::without_pauses(), Pacing::disabled(), None).unwrap()
    }

    #[tokio::test]
    async fn test_retries_transient_status_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/flaky",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        (AxumStatus::SERVICE_UNAVAILABLE, "busy")
                    } else {
                        (AxumStatus::OK, "ok")
                    }
                }),
            )
            .with_state(hits.clone());
        let base = serve(router).await;

        let body = client().get_text(&format!("{}/flaky", base), None).await.unwrap();
        assert_eq!(body, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_three_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/down",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    AxumStatus::BAD_GATEWAY
                }),
            )
            .with_state(hits.clone());
        let base = serve(router).await;

        let err = client()
            .get_text(&format!("{}/down", base), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_fail_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/missing",
                get(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    AxumStatus::NOT_FOUND
                }),
            )
            .with_state(hits.clone());
        let base = serve(router).await;

        let err = client()
            .get_text(&format!("{}/missing", base), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sends_browser_headers() {
        let router = Router::new().route(
            "/headers",
            get(|headers: axum::http::HeaderMap| async move {
                let ua = headers
                    .get("user-agent")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let referer = headers
                    .get("referer")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                format!("{}|{}", ua, referer)
            }),
        );
        let base = serve(router).await;

        let body = client()
            .get_text(&format!("{}/headers", base), Some("https://ref.test/"))
            .await
            .unwrap();
        let (ua, referer) = body.split_once('|').unwrap();
        assert!(USER_AGENTS.contains(&ua));
        assert_eq!(referer, "https://ref.test/");
    }

    #[test]
    fn test_invalid_static_proxy_rejected() {
        let config = ProxyConfig {
            http: Some("not a url".into()),
            https: None,
        };
        assert!(static_proxies(Some(&config)).is_err());
        assert!(static_proxies(None).unwrap().is_empty());
    }
}
