use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::constants::events;

/// Server-to-client notifications the workflow understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum RealtimeEvent {
    ClassificationComplete { cell_detection_image_id: String },
}

impl RealtimeEvent {
    pub fn classification_complete(cell_detection_image_id: impl Into<String>) -> Self {
        Self::ClassificationComplete {
            cell_detection_image_id: cell_detection_image_id.into(),
        }
    }

    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClassificationComplete { .. } => events::CLASSIFICATION_COMPLETE,
        }
    }

    /// Decode a named event with its payload; unknown names yield `None`
    pub fn from_raw(name: &str, payload: Value) -> Result<Option<Self>, PublishError> {
        match name {
            events::CLASSIFICATION_COMPLETE => {
                #[derive(Deserialize)]
                struct Payload {
                    cell_detection_image_id: String,
                }
                let payload: Payload = serde_json::from_value(payload)?;
                Ok(Some(Self::classification_complete(
                    payload.cell_detection_image_id,
                )))
            }
            _ => Ok(None),
        }
    }

    pub fn completes_classification_of(&self, cell_detection_image_id: &str) -> bool {
        match self {
            Self::ClassificationComplete {
                cell_detection_image_id: id,
            } => id == cell_detection_image_id,
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: RealtimeEvent,
    pub published_at: DateTime<Utc>,
}

/// Fan-out of realtime events to every waiting subscriber
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers that received it
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let name = event.name();
        let published = PublishedEvent {
            event,
            published_at: Utc::now(),
        };

        // No subscribers is not an error: nobody is waiting on this event
        match self.sender.send(published) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(_)) => {
                debug!(event = name, "Published event with no subscribers");
                0
            }
        }
    }

    /// Publish a named event as received from the framework's realtime feed.
    ///
    /// Returns `Ok(false)` for event names the workflow does not handle.
    pub fn publish_raw(&self, name: &str, payload: Value) -> Result<bool, PublishError> {
        match RealtimeEvent::from_raw(name, payload)? {
            Some(event) => {
                self.publish(event);
                Ok(true)
            }
            None => {
                debug!(event = name, "Ignoring unhandled realtime event");
                Ok(false)
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let publisher = EventPublisher::default();
        let mut rx = publisher.subscribe();

        let delivered = publisher.publish(RealtimeEvent::classification_complete("CDI-0001"));
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert!(received.event.completes_classification_of("CDI-0001"));
        assert!(!received.event.completes_classification_of("CDI-0002"));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.subscriber_count(), 0);
        assert_eq!(
            publisher.publish(RealtimeEvent::classification_complete("CDI-0001")),
            0
        );
    }

    #[test]
    fn test_raw_events() {
        let publisher = EventPublisher::default();
        assert!(publisher
            .publish_raw(
                "classification_complete",
                json!({"cell_detection_image_id": "CDI-0001"})
            )
            .unwrap());
        assert!(!publisher.publish_raw("list_update", json!({})).unwrap());
        assert!(publisher
            .publish_raw("classification_complete", json!({"unexpected": true}))
            .is_err());
    }

    #[test]
    fn test_event_serde_shape() {
        let value = serde_json::to_value(RealtimeEvent::classification_complete("CDI-0001")).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "classification_complete",
                "payload": {"cell_detection_image_id": "CDI-0001"}
            })
        );
    }
}
