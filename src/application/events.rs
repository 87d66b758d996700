//! In-process live event bus feeding the SSE endpoint.
//!
//! Delivery is best effort: the channel is bounded, events published with no
//! subscriber are dropped, and receivers that fall behind skip ahead.

use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::types::LiveEventName;

/// Who may observe an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    User(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub name: LiveEventName,
    pub audience: Audience,
    pub data: Value,
}

impl LiveEvent {
    /// Event addressed to every subscriber: `{ "id", "action" }`.
    pub fn broadcast(name: LiveEventName, id: Uuid, action: &str) -> Self {
        Self {
            name,
            audience: Audience::Everyone,
            data: json!({ "id": id, "action": action }),
        }
    }

    /// Event delivered only to connections authenticated as `recipient`.
    pub fn to_user(name: LiveEventName, recipient: Uuid, id: Uuid, action: &str) -> Self {
        Self {
            name,
            audience: Audience::User(recipient),
            data: json!({ "id": id, "action": action }),
        }
    }

    /// Attach an extra field to the payload.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.data {
            map.insert(key.to_string(), value.into());
        } else {
            let mut map = Map::new();
            map.insert(key.to_string(), value.into());
            self.data = Value::Object(map);
        }
        self
    }

    pub fn visible_to(&self, viewer: Option<Uuid>) -> bool {
        match self.audience {
            Audience::Everyone => true,
            Audience::User(recipient) => viewer == Some(recipient),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LiveEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; returns how many subscribers received it.
    pub fn publish(&self, event: LiveEvent) -> usize {
        metrics::counter!("agora_live_events_published_total", "event" => event.name.as_str())
            .increment(1);
        // no subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
