//! Event types and broadcast bus for background job lifecycle
//!
//! Events are informational: the job queue delivers work, the bus only
//! tells observers (logs, tests, future push channels) what happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by Inkfluence services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InkEvent {
    /// Audiobook job accepted by the queue
    AudiobookJobQueued {
        job_id: String,
        user_id: String,
        chunk_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// One chunk synthesized
    AudiobookChunkSynthesized {
        job_id: String,
        chunk_index: usize,
        chunk_count: usize,
        bytes: usize,
        timestamp: DateTime<Utc>,
    },

    /// Terminal success record written
    AudiobookJobCompleted {
        job_id: String,
        audio_url: String,
        audio_size: u64,
        timestamp: DateTime<Utc>,
    },

    /// Terminal failure record written
    AudiobookJobFailed {
        job_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Subscription state merged into a user profile
    SubscriptionChanged {
        user_id: String,
        tier: String,
        status: String,
        timestamp: DateTime<Utc>,
    },
}

impl InkEvent {
    /// Event type name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            InkEvent::AudiobookJobQueued { .. } => "AudiobookJobQueued",
            InkEvent::AudiobookChunkSynthesized { .. } => "AudiobookChunkSynthesized",
            InkEvent::AudiobookJobCompleted { .. } => "AudiobookJobCompleted",
            InkEvent::AudiobookJobFailed { .. } => "AudiobookJobFailed",
            InkEvent::SubscriptionChanged { .. } => "SubscriptionChanged",
        }
    }
}

/// Broadcast bus for [`InkEvent`]s
///
/// Backed by `tokio::sync::broadcast`; slow subscribers lose the oldest
/// events once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InkEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<InkEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, event: InkEvent) -> Result<usize, broadcast::error::SendError<InkEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: InkEvent) {
        let event_type = event.event_type();
        if self.tx.send(event).is_err() {
            tracing::trace!(event_type, "No subscribers for event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(InkEvent::AudiobookJobFailed {
            job_id: "p1_c1".to_string(),
            error: "boom".to_string(),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "AudiobookJobFailed");
    }

    #[test]
    fn test_emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(10);
        let result = bus.emit(InkEvent::SubscriptionChanged {
            user_id: "u1".to_string(),
            tier: "free".to_string(),
            status: "canceled".to_string(),
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = InkEvent::AudiobookJobQueued {
            job_id: "p_c".to_string(),
            user_id: "u".to_string(),
            chunk_count: 3,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AudiobookJobQueued");
        assert_eq!(json["chunk_count"], 3);
    }
}
