use async_trait::async_trait;
use serde::Serialize;

use crate::CoreResult;

/// Outbound domain events (wallet movements, settlements, subscription changes).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()>;
}

/// Serialize and publish an event. Delivery is best effort: a failure is
/// logged and never fails the operation that produced the event.
pub async fn emit<T: Serialize + Sync>(publisher: &dyn EventPublisher, topic: &str, key: &str, event: &T) {
    let payload = match serde_json::to_string(event) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("Failed to serialize event for {}: {}", topic, e);
            return;
        }
    };

    if let Err(e) = publisher.publish(topic, key, &payload).await {
        tracing::warn!("Failed to publish event to {} ({}): {}", topic, key, e);
    }
}

/// Publisher used when no broker is configured: events only reach the log.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()> {
        tracing::debug!(topic, key, "{}", payload);
        Ok(())
    }
}
