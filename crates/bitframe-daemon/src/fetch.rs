//! Source image retrieval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect, Client};
use thiserror::Error;
use tracing::debug;

use crate::config::FetchConfig;

/// Reasons a source image could not be retrieved.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection, TLS, redirect or body transfer failed.
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Deadline elapsed before the body was complete.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Upstream answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body exceeds the configured limit.
    #[error("{url} is larger than {limit} bytes")]
    TooLarge { url: String, limit: u64 },
}

impl FetchError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Retrieves raw source bytes for a URL.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Makes a single attempt; no retry.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) fetcher with a fixed deadline, bounded redirects and a size cap.
pub struct HttpFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching source image from {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher(max_bytes: u64, timeout_secs: u64) -> HttpFetcher {
        HttpFetcher::new(&FetchConfig {
            max_bytes,
            timeout_secs,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_body() {
        let base = serve(Router::new().route("/img", get(|| async { vec![1u8, 2, 3, 4] }))).await;
        let bytes = fetcher(1024, 5).fetch(&format!("{}/img", base)).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let base = serve(Router::new().route("/gone", get(|| async { StatusCode::NOT_FOUND }))).await;
        let err = fetcher(1024, 5)
            .fetch(&format!("{}/gone", base))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_body_limit() {
        let base = serve(Router::new().route("/big", get(|| async { vec![0u8; 4096] }))).await;
        let err = fetcher(100, 5)
            .fetch(&format!("{}/big", base))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 100, .. }));
    }

    #[tokio::test]
    async fn test_deadline() {
        let slow = get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        });
        let base = serve(Router::new().route("/slow", slow)).await;
        let err = fetcher(1024, 1)
            .fetch(&format!("{}/slow", base))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let err = fetcher(1024, 5)
            .fetch("http://127.0.0.1:1/nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }
}
