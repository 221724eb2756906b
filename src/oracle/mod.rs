//! Scoring Oracle Abstraction
//!
//! The reviewer that assigns ratings and decisions is external to this
//! repository; the pipeline only constrains how its output is consumed. A
//! unified async trait keeps the batch driver oracle-agnostic:
//!
//! ```text
//! evaluate_all() → ReviewOracle trait → [HttpReviewOracle, MockOracle]
//! ```

pub mod http;
pub mod mock;
pub mod retry;

pub use http::HttpReviewOracle;
pub use mock::MockOracle;
pub use retry::{call_with_retry, RetryConfig};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// One review produced by the scoring oracle.
///
/// Only `avg_rating` and `paper_decision` are required; everything else
/// defaults so partial oracle schemas still parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    /// Overall rating on the 0-10 scale.
    pub avg_rating: f64,
    /// Accept/reject-like decision string.
    pub paper_decision: String,
    /// Reviewer self-reported confidence.
    #[serde(default)]
    pub confidence: f64,
    /// Aspect sub-score.
    #[serde(default)]
    pub originality: f64,
    /// Aspect sub-score.
    #[serde(default)]
    pub quality: f64,
    /// Aspect sub-score.
    #[serde(default)]
    pub clarity: f64,
    /// Aspect sub-score.
    #[serde(default)]
    pub significance: f64,
    /// Free-text strengths.
    #[serde(default)]
    pub strength: Vec<String>,
    /// Free-text weaknesses.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// Free-text meta review.
    #[serde(default)]
    pub meta_review: String,
}

impl Review {
    /// Minimal review for tests and synthetic data.
    pub fn with_rating(avg_rating: f64, paper_decision: &str) -> Self {
        Self {
            avg_rating,
            paper_decision: paper_decision.to_string(),
            confidence: 0.0,
            originality: 0.0,
            quality: 0.0,
            clarity: 0.0,
            significance: 0.0,
            strength: Vec::new(),
            weaknesses: Vec::new(),
            meta_review: String::new(),
        }
    }

    /// Decision strings vary ("Accept", "Weak Accept", "accept (poster)");
    /// anything containing "accept" counts.
    pub fn is_accept(&self) -> bool {
        self.paper_decision.to_lowercase().contains("accept")
    }

    /// Counterpart of [`Review::is_accept`] for reject-like decisions.
    pub fn is_reject(&self) -> bool {
        self.paper_decision.to_lowercase().contains("reject")
    }
}

/// Errors that can occur during oracle calls.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Rate limited by the service (429).
    RateLimited {
        /// Suggested retry delay from a Retry-After header.
        retry_after: Option<Duration>,
    },
    /// Request timed out.
    Timeout,
    /// Network connectivity issue.
    NetworkError(String),
    /// Service returned an error response.
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from the service.
        message: String,
    },
    /// Response could not be parsed as a review.
    InvalidResponse(String),
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::RateLimited { retry_after } => {
                if let Some(d) = retry_after {
                    write!(f, "Rate limited, retry after {:?}", d)
                } else {
                    write!(f, "Rate limited")
                }
            }
            OracleError::Timeout => write!(f, "Request timed out"),
            OracleError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            OracleError::ApiError { status, message } => {
                write!(f, "API error {}: {}", status, message)
            }
            OracleError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for OracleError {}

impl OracleError {
    /// Check if this error is retryable.
    ///
    /// Retryable: RateLimited, Timeout, NetworkError, 5xx ApiErrors.
    /// Non-retryable: 4xx ApiErrors (except 429), InvalidResponse.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::RateLimited { .. } => true,
            OracleError::Timeout => true,
            OracleError::NetworkError(_) => true,
            OracleError::ApiError { status, .. } => *status >= 500 || *status == 429,
            OracleError::InvalidResponse(_) => false,
        }
    }
}

/// Unified trait for scoring oracles.
///
/// Object-safe through explicit boxing of the async return type, so the
/// batch driver can hold `&dyn ReviewOracle`.
pub trait ReviewOracle: Send + Sync {
    /// Score one paper text.
    fn review(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Review, OracleError>> + Send + '_>>;

    /// Identifier of the backing model.
    fn model_name(&self) -> &str;
}
