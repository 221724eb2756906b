//! EventBus - broadcast event distribution
//!
//! Non-blocking, fire-and-forget emission over `tokio::sync::broadcast`.
//! Lagging receivers drop old events; emitters never wait on observers.

use super::PipelineEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default capacity for the event bus channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Central event bus for pipeline observability.
///
/// Cloning is cheap (Arc internally) and every clone emits into the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<PipelineEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create an EventBus with default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Emit an event to all subscribers. With no subscribers the event is
    /// silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
