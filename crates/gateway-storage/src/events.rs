//! Lifecycle event emission (§4.4, §5 "background event queue").
//!
//! Emission is fire-and-forget: the coordinator enqueues an event after its
//! transaction commits and never awaits delivery, matching the "enqueue an
//! async `ObjectAdminDelete`" wording for overwritten versions.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    ObjectCreated {
        bucket: String,
        key: String,
        version: String,
        size: u64,
    },
    ObjectRemoved {
        bucket: String,
        key: String,
        version: String,
    },
    /// A previous version superseded by an overwrite, deleted from the
    /// backend out-of-band from the upsert transaction.
    ObjectAdminDelete {
        bucket: String,
        key: String,
        version: String,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: LifecycleEvent);
}

/// Drops every event. Used when `tenant.disable_events` is set.
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn emit(&self, _event: LifecycleEvent) {}
}

/// Hands events to an unbounded channel; a background task (owned by
/// `bin/gateway`) drains the receiver. Send errors (receiver dropped) are
/// swallowed since nothing downstream can still want the event.
pub struct ChannelEventSink {
    sender: UnboundedSender<LifecycleEvent>,
}

impl ChannelEventSink {
    #[must_use]
    pub fn new(sender: UnboundedSender<LifecycleEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: LifecycleEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("lifecycle event dropped: no receiver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelEventSink::new(tx);
        sink.emit(LifecycleEvent::ObjectCreated {
            bucket: "b".into(),
            key: "k".into(),
            version: "v1".into(),
            size: 10,
        })
        .await;

        let received = rx.recv().await.expect("event delivered");
        assert!(matches!(received, LifecycleEvent::ObjectCreated { .. }));
    }

    #[tokio::test]
    async fn channel_sink_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let sink = ChannelEventSink::new(tx);
        sink.emit(LifecycleEvent::ObjectRemoved {
            bucket: "b".into(),
            key: "k".into(),
            version: "v1".into(),
        })
        .await;
    }

    #[tokio::test]
    async fn noop_sink_accepts_anything() {
        let sink = NoopEventSink;
        sink.emit(LifecycleEvent::ObjectRemoved {
            bucket: "b".into(),
            key: "k".into(),
            version: "v1".into(),
        })
        .await;
    }
}
