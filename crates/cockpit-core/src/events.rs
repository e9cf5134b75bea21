//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The executor publishes every [`ExecutorEvent`] here; the UI, loggers and
//! tests subscribe independently without the executor knowing about them.

use tokio::sync::broadcast;

use crate::domain::ExecutorEvent;

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ExecutorEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest unread events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when nobody listens.
    pub fn publish(&self, event: ExecutorEvent) {
        let _ = self.sender.send(event);
    }

    /// Events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKind, ProgressEvent, RunId};
    use chrono::Utc;
    use ulid::Ulid;

    fn progress(name: &str, value: u8) -> ExecutorEvent {
        ExecutorEvent::Progress(ProgressEvent {
            name: name.into(),
            kind: EntityKind::Job,
            run_id: RunId::from_ulid(Ulid::new()),
            value,
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(progress("Secrets Sync", 20));

        assert_eq!(rx1.recv().await.unwrap().name(), "Secrets Sync");
        assert_eq!(rx2.recv().await.unwrap().name(), "Secrets Sync");
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(progress("orphan", 0));
    }

    #[tokio::test]
    async fn slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for value in [20, 40, 60] {
            bus.publish(progress("Drift Detector", value));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().as_progress().unwrap().value, 40);
    }
}
