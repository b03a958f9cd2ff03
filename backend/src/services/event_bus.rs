use serde::Serialize;
use tokio::sync::broadcast;

/// A domain event published when stores or promotions change.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    /// Event type, e.g. "store.created", "promotion.completed"
    #[serde(rename = "type")]
    pub event_type: String,
    /// Store key or promotion id of the affected entity
    pub entity_id: String,
    /// Extra payload, e.g. source/target keys for promotion events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl DomainEvent {
    /// Create a domain event timestamped to now.
    pub fn now(
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        detail: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            detail,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcast-based event bus for domain events.
///
/// Subscribers receive events via `tokio::sync::broadcast`. If a subscriber
/// falls behind, it receives `RecvError::Lagged` and can request a full refresh.
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a domain event. If there are no subscribers the event is dropped silently.
    pub fn publish(&self, event: DomainEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to domain events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Convenience: create a timestamped domain event and publish it in one call.
    pub fn emit(&self, event_type: &str, entity_id: impl ToString) {
        self.publish(DomainEvent::now(event_type, entity_id.to_string(), None));
    }

    /// Like `emit`, with an extra JSON payload.
    pub fn emit_detail(&self, event_type: &str, entity_id: impl ToString, detail: serde_json::Value) {
        self.publish(DomainEvent::now(
            event_type,
            entity_id.to_string(),
            Some(detail),
        ));
    }
}
