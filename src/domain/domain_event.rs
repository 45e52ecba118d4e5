//! Domain events published by external services.
//!
//! A [`DomainEvent`] is an opaque named event with a JSON payload. Producers
//! publish it through the [`super::EventBus`]; the fanout router decides
//! which connections receive it. Events are immutable once built: fields are
//! private and only readable through accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Event name emitted by the user service after an account is created.
pub const USER_CREATED: &str = "user.created";

/// Event name emitted by the order service after an order changes.
pub const ORDER_UPDATED: &str = "order.updated";

/// Named domain event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    name: String,
    payload: Value,
    emitted_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Builds an event stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }

    /// `user.created {createdUser}`.
    #[must_use]
    pub fn user_created(created_user: Value) -> Self {
        Self::new(USER_CREATED, json!({ "createdUser": created_user }))
    }

    /// `order.updated {orderId, ...details}`.
    ///
    /// `details` keys are merged next to `orderId`; an `orderId` key inside
    /// `details` is overwritten.
    #[must_use]
    pub fn order_updated(order_id: i64, details: Map<String, Value>) -> Self {
        let mut payload = details;
        payload.insert("orderId".to_string(), Value::from(order_id));
        Self::new(ORDER_UPDATED, Value::Object(payload))
    }

    /// Event name, e.g. `"order.updated"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload as published.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Publication timestamp.
    #[must_use]
    pub const fn emitted_at(&self) -> DateTime<Utc> {
        self.emitted_at
    }

    /// Looks up a top-level payload field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn user_created_wraps_user() {
        let event = DomainEvent::user_created(json!({ "id": 1, "email": "a@b.c" }));
        assert_eq!(event.name(), USER_CREATED);
        assert_eq!(
            event.field("createdUser").and_then(|u| u.get("id")),
            Some(&json!(1))
        );
    }

    #[test]
    fn order_updated_sets_order_id_last() {
        let mut details = Map::new();
        details.insert("status".to_string(), json!("shipped"));
        details.insert("orderId".to_string(), json!("bogus"));

        let event = DomainEvent::order_updated(7, details);
        assert_eq!(event.name(), ORDER_UPDATED);
        assert_eq!(event.field("orderId"), Some(&json!(7)));
        assert_eq!(event.field("status"), Some(&json!("shipped")));
    }

    #[test]
    fn missing_field_is_none() {
        let event = DomainEvent::new("custom.event", json!(null));
        assert!(event.field("anything").is_none());
    }
}
