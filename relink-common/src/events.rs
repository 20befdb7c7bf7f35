//! Progress event types and EventBus
//!
//! Events are broadcast via [`EventBus`] and are serializable so a presentation
//! layer can forward them as-is (JSON lines, SSE, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Relink event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelinkEvent {
    /// One more track has been resolved (found or not)
    ResolutionProgress {
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Outcome of resolving a single track
    TrackResolved {
        track_id: String,
        /// Method name (`ExactPath`, `NotFound`, ...)
        method: String,
        confidence: f32,
        resolved_path: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A conversion batch was submitted
    BatchStarted {
        total: usize,
        concurrency: usize,
        timestamp: DateTime<Utc>,
    },

    /// One job of the batch finished (success, failure or cancelled)
    JobCompleted {
        /// Submission index of the job
        index: usize,
        /// Input path; the stable key for correlating with results
        input_path: String,
        success: bool,
        /// Error kind name when `success` is false
        error_kind: Option<String>,
        completed: usize,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// The batch finished; counts cover every submitted job
    BatchCompleted {
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        timestamp: DateTime<Utc>,
    },

    /// Cancellation was requested for the running batch
    BatchCancelled { timestamp: DateTime<Utc> },
}

impl RelinkEvent {
    /// Event name for display and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RelinkEvent::ResolutionProgress { .. } => "ResolutionProgress",
            RelinkEvent::TrackResolved { .. } => "TrackResolved",
            RelinkEvent::BatchStarted { .. } => "BatchStarted",
            RelinkEvent::JobCompleted { .. } => "JobCompleted",
            RelinkEvent::BatchCompleted { .. } => "BatchCompleted",
            RelinkEvent::BatchCancelled { .. } => "BatchCancelled",
        }
    }
}

/// Broadcast channel for [`RelinkEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RelinkEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RelinkEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RelinkEvent,
    ) -> Result<usize, broadcast::error::SendError<RelinkEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RelinkEvent) {
        let _ = self.tx.send(event);
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
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let event = RelinkEvent::BatchStarted {
            total: 3,
            concurrency: 2,
            timestamp: Utc::now(),
        };
        assert_eq!(bus.emit(event.clone()).unwrap(), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        let event = RelinkEvent::BatchCancelled { timestamp: Utc::now() };

        assert!(bus.emit(event.clone()).is_err());
        // Lossy emit never fails
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RelinkEvent::JobCompleted {
            index: 0,
            input_path: "/music/a.flac".to_string(),
            success: false,
            error_kind: Some("Cancelled".to_string()),
            completed: 1,
            total: 2,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "JobCompleted");
        assert_eq!(json["input_path"], "/music/a.flac");
        assert_eq!(event.event_type(), "JobCompleted");
    }
}
