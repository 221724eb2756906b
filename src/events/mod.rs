//! Event-driven observability for the pipeline
//!
//! Core stages emit structured events - variant attempts, document
//! resampling, oracle evaluations - via an [`EventBus`] built on a broadcast
//! channel. Observers subscribe without blocking the emitter:
//!
//! ```text
//! Dataset Builder / Eval Driver → EventBus → [LoggingObserver, ...]
//! ```

pub mod bus;
pub mod observers;

pub use bus::EventBus;
pub use observers::LoggingObserver;

use crate::core::validate::VariantStatus;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// All events emitted by the pipeline. Tagged for JSON serialization and
/// timestamped for latency tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A transform was attempted on a document.
    VariantAttempted {
        /// Owning document key.
        document_id: String,
        /// Transform kind wire name.
        kind: String,
        /// Validator classification.
        status: VariantStatus,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// A replacement document was drawn after a strict-policy discard.
    DocumentResampled {
        /// Key of the replacement document.
        document_id: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// The oracle scored a variant.
    EvaluationCompleted {
        /// Owning document key.
        document_id: String,
        /// Transform kind wire name.
        kind: String,
        /// Rating assigned by the oracle.
        rating: f64,
        /// Decision assigned by the oracle.
        decision: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },

    /// An oracle call failed after retries; the batch continues.
    EvaluationFailed {
        /// Owning document key.
        document_id: String,
        /// Transform kind wire name.
        kind: String,
        /// Error description.
        error: String,
        #[serde(with = "system_time_serde")]
        timestamp: SystemTime,
    },
}

impl PipelineEvent {
    /// Create a VariantAttempted event.
    pub fn variant_attempted(document_id: &str, kind: &str, status: VariantStatus) -> Self {
        Self::VariantAttempted {
            document_id: document_id.to_string(),
            kind: kind.to_string(),
            status,
            timestamp: SystemTime::now(),
        }
    }

    /// Create a DocumentResampled event.
    pub fn document_resampled(document_id: &str) -> Self {
        Self::DocumentResampled {
            document_id: document_id.to_string(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create an EvaluationCompleted event.
    pub fn evaluation_completed(document_id: &str, kind: &str, rating: f64, decision: &str) -> Self {
        Self::EvaluationCompleted {
            document_id: document_id.to_string(),
            kind: kind.to_string(),
            rating,
            decision: decision.to_string(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create an EvaluationFailed event.
    pub fn evaluation_failed(document_id: &str, kind: &str, error: &str) -> Self {
        Self::EvaluationFailed {
            document_id: document_id.to_string(),
            kind: kind.to_string(),
            error: error.to_string(),
            timestamp: SystemTime::now(),
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::VariantAttempted { .. } => "VariantAttempted",
            Self::DocumentResampled { .. } => "DocumentResampled",
            Self::EvaluationCompleted { .. } => "EvaluationCompleted",
            Self::EvaluationFailed { .. } => "EvaluationFailed",
        }
    }

    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Self::VariantAttempted { timestamp, .. }
            | Self::DocumentResampled { timestamp, .. }
            | Self::EvaluationCompleted { timestamp, .. }
            | Self::EvaluationFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// Serde helpers for SystemTime as epoch milliseconds.
mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}
