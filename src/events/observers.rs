//! Logging observer
//!
//! Bridges pipeline events to `tracing`:
//! - INFO: EvaluationCompleted, DocumentResampled
//! - WARN: EvaluationFailed
//! - DEBUG: VariantAttempted (high-volume)

use crate::core::validate::VariantStatus;
use crate::events::{EventBus, PipelineEvent};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Observer that logs pipeline events using tracing.
pub struct LoggingObserver {
    receiver: broadcast::Receiver<PipelineEvent>,
}

impl LoggingObserver {
    /// Create a new logging observer subscribed to the event bus.
    pub fn new(bus: &EventBus) -> Self {
        Self {
            receiver: bus.subscribe(),
        }
    }

    /// Run the observer until the channel closes. Spawn as a tokio task:
    /// ```rust,ignore
    /// tokio::spawn(observer.run());
    /// ```
    pub async fn run(mut self) {
        loop {
            match self.receiver.recv().await {
                Ok(event) => Self::log_event(&event),
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("event bus closed, logging observer stopping");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "logging observer lagged, skipped {} events", count);
                }
            }
        }
    }

    /// Log a single event at the appropriate level.
    pub fn log_event(event: &PipelineEvent) {
        match event {
            PipelineEvent::VariantAttempted {
                document_id,
                kind,
                status,
                ..
            } => match status {
                VariantStatus::Failure => {
                    warn!(document = %document_id, kind = %kind, "variant attempt failed")
                }
                _ => debug!(
                    document = %document_id,
                    kind = %kind,
                    status = %status,
                    "variant attempted"
                ),
            },

            PipelineEvent::DocumentResampled { document_id, .. } => {
                info!(document = %document_id, "replacement document drawn");
            }

            PipelineEvent::EvaluationCompleted {
                document_id,
                kind,
                rating,
                decision,
                ..
            } => {
                info!(
                    document = %document_id,
                    kind = %kind,
                    rating = %rating,
                    decision = %decision,
                    "evaluation completed"
                );
            }

            PipelineEvent::EvaluationFailed {
                document_id,
                kind,
                error,
                ..
            } => {
                warn!(
                    document = %document_id,
                    kind = %kind,
                    error = %error,
                    "evaluation failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_observer_subscribes() {
        let bus = EventBus::with_default_capacity();
        let _observer = LoggingObserver::new(&bus);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_observer_drains_events() {
        let bus = EventBus::with_default_capacity();
        let observer = LoggingObserver::new(&bus);
        let handle = tokio::spawn(observer.run());

        for i in 0..10 {
            bus.emit(PipelineEvent::evaluation_completed(
                &format!("p{}", i),
                "original",
                5.0,
                "Accept",
            ));
        }

        drop(bus);
        // Observer stops once every sender clone is gone.
        handle.await.unwrap();
    }

    #[test]
    fn test_log_event_does_not_panic() {
        LoggingObserver::log_event(&PipelineEvent::variant_attempted(
            "p1",
            "remove_abstract",
            VariantStatus::Failure,
        ));
        LoggingObserver::log_event(&PipelineEvent::evaluation_failed(
            "p1",
            "original",
            "timeout",
        ));
    }
}
