use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Fan-out publisher for order lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event with the given name and context.
    ///
    /// Publishing with no subscribers is not an error; slow subscribers lag
    /// and observe `RecvError::Lagged` instead of blocking the publisher.
    pub async fn publish(
        &self,
        event_name: impl Into<String>,
        context: Value,
    ) -> Result<(), PublishError> {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: Utc::now(),
        };

        // SendError only means nobody is listening right now
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Serialize `payload` and publish it under `event_name`
    pub async fn publish_serialized<T: Serialize + ?Sized>(
        &self,
        event_name: impl Into<String>,
        payload: &T,
    ) -> Result<(), PublishError> {
        let context = serde_json::to_value(payload)?;
        self.publish(event_name, context).await
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::defaults::EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::new(4);
        assert_eq!(publisher.subscriber_count(), 0);
        assert!(publisher.publish("order.pending", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();

        publisher
            .publish("order.pending", json!({"order_id": "a"}))
            .await
            .unwrap();
        publisher
            .publish_serialized("order.accepted", &json!({"order_id": "a"}))
            .await
            .unwrap();

        assert_eq!(receiver.recv().await.unwrap().name, "order.pending");
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.name, "order.accepted");
        assert_eq!(second.context["order_id"], "a");
    }
}
