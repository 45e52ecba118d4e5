//! Event fanout: maps each domain event to a delivery policy.
//!
//! A [`FanoutTable`] is fixed at startup and assigns every event name
//! exactly one [`Route`]. The [`FanoutRouter`] consumes the event bus and
//! applies the route of each event it receives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::Transport;
use crate::domain::domain_event::{ORDER_UPDATED, USER_CREATED};
use crate::domain::{ConnectionRegistry, DomainEvent, OutboundEvent, UserId};

/// Room name template with `{field}` placeholders filled from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTemplate(String);

impl RoomTemplate {
    /// Wraps a template such as `"order:{orderId}"`.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Renders the template against a payload.
    ///
    /// String and number fields are substituted verbatim. Returns the name
    /// of the first placeholder whose field is missing or not a scalar.
    ///
    /// # Errors
    ///
    /// Returns the unresolved field name.
    pub fn render(&self, payload: &Value) -> Result<String, String> {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        while let Some(start) = rest.find('{') {
            let (literal, tail) = rest.split_at(start);
            out.push_str(literal);
            let Some(end) = tail.find('}') else {
                out.push_str(tail);
                return Ok(out);
            };
            let field = tail.get(1..end).unwrap_or_default();
            match payload.get(field) {
                Some(Value::String(s)) if !s.is_empty() => out.push_str(s),
                Some(Value::Number(n)) => out.push_str(&n.to_string()),
                _ => return Err(field.to_string()),
            }
            rest = tail.get(end + 1..).unwrap_or_default();
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl fmt::Display for RoomTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery policy plus the outbound event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Every registered connection.
    Broadcast {
        /// Outbound event name.
        event: String,
    },
    /// The connection indexed for the user id found in `user_field`.
    User {
        /// Payload field holding the target user id.
        user_field: String,
        /// Outbound event name.
        event: String,
    },
    /// Every member of the rendered room.
    Room {
        /// Room name template.
        room: RoomTemplate,
        /// Outbound event name.
        event: String,
    },
}

/// Event name → route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutTable {
    routes: HashMap<String, Route>,
}

impl FanoutTable {
    /// Creates an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Adds or replaces the route for an event name.
    #[must_use]
    pub fn route(mut self, event_name: impl Into<String>, route: Route) -> Self {
        self.routes.insert(event_name.into(), route);
        self
    }

    /// Route assigned to an event name.
    #[must_use]
    pub fn get(&self, event_name: &str) -> Option<&Route> {
        self.routes.get(event_name)
    }

    /// Number of routed event names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no event is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for FanoutTable {
    /// `user.created → broadcast("user:created")`,
    /// `order.updated → room("order:{orderId}", "order:updated")`.
    fn default() -> Self {
        Self::empty()
            .route(
                USER_CREATED,
                Route::Broadcast {
                    event: "user:created".to_string(),
                },
            )
            .route(
                ORDER_UPDATED,
                Route::Room {
                    room: RoomTemplate::new("order:{orderId}"),
                    event: "order:updated".to_string(),
                },
            )
    }
}

/// Outcome of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Broadcast queued for `delivered` connections.
    Broadcast {
        /// Connections reached.
        delivered: usize,
    },
    /// Per-user event queued for the user's connection.
    User {
        /// Target user.
        user_id: UserId,
    },
    /// Per-user event whose user has no active connection. Not an error.
    DeliveryMiss {
        /// Target user.
        user_id: UserId,
    },
    /// Per-user event whose user is connected but could not take the frame
    /// (outbound buffer full, or the socket closed mid-delivery).
    Dropped {
        /// Target user.
        user_id: UserId,
    },
    /// Room event queued for `delivered` members.
    Room {
        /// Rendered room name.
        room: String,
        /// Members reached.
        delivered: usize,
    },
    /// No route for this event name; dropped.
    Unrouted,
    /// The payload lacks the field the route needs; dropped.
    Unroutable {
        /// Missing or invalid payload field.
        field: String,
    },
}

/// Applies the fanout table to domain events.
#[derive(Debug, Clone)]
pub struct FanoutRouter {
    table: Arc<FanoutTable>,
    registry: Arc<ConnectionRegistry>,
    transport: Arc<dyn Transport>,
}

impl FanoutRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(
        table: FanoutTable,
        registry: Arc<ConnectionRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            table: Arc::new(table),
            registry,
            transport,
        }
    }

    /// Routes one event according to the table.
    pub fn route(&self, event: &DomainEvent) -> Delivery {
        let Some(route) = self.table.get(event.name()) else {
            tracing::debug!(event = %event.name(), "no route for event");
            return Delivery::Unrouted;
        };

        match route {
            Route::Broadcast { event: outbound } => {
                let frame = OutboundEvent::shared(outbound.as_str(), event.payload().clone());
                Delivery::Broadcast {
                    delivered: self.transport.broadcast(&frame),
                }
            }
            Route::User {
                user_field,
                event: outbound,
            } => {
                let Some(user_id) = event.field(user_field).and_then(user_id_from) else {
                    return unroutable(event, user_field);
                };
                let frame = OutboundEvent::shared(outbound.as_str(), event.payload().clone());
                let Some(connection) = self.registry.lookup_by_user(user_id) else {
                    tracing::info!(%user_id, event = %event.name(), "user not connected, delivery missed");
                    return Delivery::DeliveryMiss { user_id };
                };
                if self.transport.send_to(connection.id, &frame) {
                    Delivery::User { user_id }
                } else {
                    tracing::warn!(
                        %user_id,
                        connection_id = %connection.id,
                        event = %event.name(),
                        "user connected but frame dropped"
                    );
                    Delivery::Dropped { user_id }
                }
            }
            Route::Room {
                room,
                event: outbound,
            } => match room.render(event.payload()) {
                Ok(room) => {
                    let frame = OutboundEvent::shared(outbound.as_str(), event.payload().clone());
                    let delivered = self.transport.send_to_room(&room, &frame);
                    Delivery::Room { room, delivered }
                }
                Err(field) => unroutable(event, &field),
            },
        }
    }

    /// Spawns the router task draining the given bus receiver.
    ///
    /// Subscribe before spawning so no event published in between is lost.
    /// The task ends when the bus is closed.
    #[must_use]
    pub fn spawn(self, mut events: broadcast::Receiver<DomainEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let delivery = self.route(&event);
                        tracing::debug!(event = %event.name(), ?delivery, "event routed");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "fanout router lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::info!("fanout router stopped");
        })
    }
}

fn user_id_from(value: &Value) -> Option<UserId> {
    match value {
        Value::Number(n) => n.as_i64().map(UserId::new),
        Value::String(s) => s.parse().ok().map(UserId::new),
        _ => None,
    }
}

fn unroutable(event: &DomainEvent, field: &str) -> Delivery {
    tracing::warn!(event = %event.name(), field, "event payload missing routing field");
    Delivery::Unroutable {
        field: field.to_string(),
    }
}
