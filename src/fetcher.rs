//! HTTP fetching.
//!
//! One GET per URL, no retries. Every request carries the configured
//! `User-Agent` and is bounded by the configured timeout.

use reqwest::{Client, header};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::FetchResult;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, timeout, body read, or malformed URL.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status.
    #[error("http status {0}")]
    Http(u16),
}

/// Thin wrapper over a configured [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Build a client with a fixed user agent and request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("my,en;q=0.5"),
        );
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` once and report the outcome.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, url: &str) -> FetchResult {
        match self.get_text(url).await {
            Ok(html) => {
                debug!(bytes = html.len(), "Fetched page");
                FetchResult::success(url, html)
            }
            Err(e) => {
                warn!(error = %e, "Fetch failed");
                FetchResult::failure(url, e)
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(describe(&e)))
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else if e.is_builder() {
        format!("invalid request: {e}")
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchStatus;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout: Duration) -> Fetcher {
        Fetcher::new("corpus-test-agent/1.0", timeout).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .and(header_eq("user-agent", "corpus-test-agent/1.0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>မြန်မာ</html>", "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/a", server.uri());
        let result = fetcher(Duration::from_secs(5)).fetch(&url).await;

        assert_eq!(result.url, url);
        assert!(matches!(result.status, FetchStatus::Success));
        assert_eq!(result.payload.as_deref(), Some("<html>မြန်မာ</html>"));
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let result = fetcher(Duration::from_secs(5)).fetch(&url).await;

        assert!(result.payload.is_none());
        assert!(matches!(result.into_html(), Err(FetchError::Http(404))));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_string("slow"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/slow", server.uri());
        let result = fetcher(Duration::from_millis(50)).fetch(&url).await;

        assert!(matches!(result.into_html(), Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_fetch_malformed_url_is_network_error() {
        let result = fetcher(Duration::from_secs(1)).fetch("not a url").await;
        assert!(matches!(result.into_html(), Err(FetchError::Network(_))));
    }
}
