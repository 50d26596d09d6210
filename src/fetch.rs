use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::config::Settings;
use crate::error::FetchError;

/// A page body together with the URL it was finally served from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub body: String,
}

/// Anything that can turn a URL into a page body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url).await
    }
}

/// reqwest-backed fetcher with exponential backoff on 429/5xx and transport errors.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
    base_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
            base_backoff: Duration::from_millis(settings.base_backoff_ms),
        })
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(transport)?;
        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            let started = std::time::Instant::now();
            match self.fetch_once(url).await {
                Ok(page) => {
                    debug!(url = %url, latency_ms = started.elapsed().as_millis() as u64, "Fetched");
                    return Ok(page);
                }
                Err(e) if attempt < self.max_retries && should_retry(&e) => {
                    let backoff = self.base_backoff * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        "Fetch failed for {} (attempt {}/{}): {}, backing off {:.1}s",
                        url,
                        attempt,
                        self.max_retries,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn should_retry(err: &FetchError) -> bool {
    match err {
        FetchError::Transport { .. } => true,
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        FetchError::NotFound { .. } => false,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpFetcher {
        let settings = Settings {
            max_retries: 2,
            base_backoff_ms: 1,
            request_timeout_secs: 5,
            ..Default::default()
        };
        HttpFetcher::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn returns_body_and_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jobs/612345-senior-python-developer/")
            .with_status(200)
            .with_body("<html><h1>ok</h1></html>")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/jobs/612345-senior-python-developer/", server.url())).unwrap();
        let page = fetcher().fetch(&url).await.unwrap();
        assert_eq!(page.body, "<html><h1>ok</h1></html>");
        assert_eq!(page.url, url);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jobs/gone/")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/jobs/gone/", server.url())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_retry_then_give_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jobs/")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/jobs/", server.url())).unwrap();
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
        mock.assert_async().await;
    }

    #[test]
    fn retry_policy() {
        let status = |s| FetchError::Status { url: "u".into(), status: s };
        assert!(should_retry(&status(429)));
        assert!(should_retry(&status(502)));
        assert!(!should_retry(&status(403)));
        assert!(!should_retry(&FetchError::NotFound { url: "u".into() }));
    }
}
