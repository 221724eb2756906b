//! HTTP-backed review oracle
//!
//! Client for a remote reviewer service exposing `POST /api/review` with a
//! `{model, text}` body and the review schema as its JSON response. This is
//! the deployment shape of the reviewer the pipeline is run against; the
//! service itself is out of scope here.

use crate::oracle::{OracleError, Review, ReviewOracle};
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default reviewer service URL.
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:8300";

/// Review oracle backed by an HTTP reviewer service.
#[derive(Debug, Clone)]
pub struct HttpReviewOracle {
    /// Base URL of the reviewer service.
    base_url: String,
    /// Model selector passed through to the service.
    model: String,
    /// Request timeout.
    timeout: Duration,
    /// HTTP client.
    client: Client,
}

impl HttpReviewOracle {
    /// Create a client against the default service URL.
    pub fn new(model: &str) -> Self {
        Self::with_url(model, DEFAULT_ORACLE_URL)
    }

    /// Create a client against a custom service URL.
    pub fn with_url(model: &str, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(300),
            client: Client::new(),
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for the review endpoint.
#[derive(Debug, Serialize)]
struct ReviewRequest {
    model: String,
    text: String,
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl ReviewOracle for HttpReviewOracle {
    fn review(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Review, OracleError>> + Send + '_>> {
        let text = text.to_string();

        Box::pin(async move {
            let request = ReviewRequest {
                model: self.model.clone(),
                text,
            };
            let url = format!("{}/api/review", self.base_url);

            let response = self
                .client
                .post(&url)
                .json(&request)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        OracleError::Timeout
                    } else if e.is_connect() {
                        OracleError::NetworkError(format!("Connection failed: {}", e))
                    } else {
                        OracleError::NetworkError(e.to_string())
                    }
                })?;

            let status = response.status();
            if status.as_u16() == 429 {
                return Err(OracleError::RateLimited {
                    retry_after: parse_retry_after(&response),
                });
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(OracleError::ApiError {
                    status: status.as_u16(),
                    message,
                });
            }

            response
                .json::<Review>()
                .await
                .map_err(|e| OracleError::InvalidResponse(format!("Failed to parse review: {}", e)))
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
