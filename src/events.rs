use tokio::sync::broadcast;
use tracing::trace;

use crate::error::{ClassifiedError, ErrorKind};

/// Catch-all channel every classified error is mirrored onto.
pub const ANY_ERROR_CHANNEL: &str = "API:ANY_ERROR";

/// Snapshot of a classified error, delivered to external subscribers.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub channel: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub url: Option<String>,
}

/// Broadcast fan-out for pipeline failures. The pipeline only emits here;
/// recovery policy (toasts, redirects, retries) belongs to subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ErrorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ErrorEvent> {
        self.tx.subscribe()
    }

    /// Emit one event on the error's named channel and one on the catch-all.
    pub fn emit(&self, error: &ClassifiedError) {
        let event = ErrorEvent {
            channel: error.kind().channel(),
            kind: error.kind(),
            message: error.message().to_string(),
            status: error.status(),
            url: error.url().map(str::to_string),
        };
        trace!(channel = event.channel, message = %event.message, "forwarding error event");
        // send only fails when nobody is subscribed
        let _ = self.tx.send(ErrorEvent {
            channel: ANY_ERROR_CHANNEL,
            ..event.clone()
        });
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_delivers_named_and_catch_all() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(&ClassifiedError::new(ErrorKind::Network, "connection refused").with_url("/ping"));

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.channel, ANY_ERROR_CHANNEL);
        assert_eq!(second.channel, "API:NETWORK_ERROR");
        assert_eq!(second.kind, ErrorKind::Network);
        assert_eq!(second.url.as_deref(), Some("/ping"));
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_harmless() {
        let bus = EventBus::new(1);
        bus.emit(&ClassifiedError::new(ErrorKind::Unknown, "nobody listening"));
    }
}
