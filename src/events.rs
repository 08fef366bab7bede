//! Domain event publishing.
//!
//! Events go out after the state change they describe has committed, and
//! publishing is best-effort: a failure is logged by the caller and never
//! rolls anything back.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::events::DomainEvent;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("nats: {0}")]
    Nats(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

pub struct NatsPublisher { client: async_nats::Client }

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(event.subject().to_string(), payload.into()).await.map_err(|e| PublishError::Nats(e.to_string()))
    }
}

/// Used when no broker is configured.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        debug!(subject = event.subject(), ?event, "domain event (no broker configured)");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::OwnerId;

    #[test]
    fn test_event_wire_format() {
        let owner = OwnerId::new();
        let event = DomainEvent::CartRetired { owner_id: owner, lines_removed: 2 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cart_retired");
        assert_eq!(json["owner_id"], owner.to_string());
        assert_eq!(event.subject(), "ecommerce.cart.retired");
    }
}
