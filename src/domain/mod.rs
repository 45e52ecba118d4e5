//! Domain layer: connection identity, the connection registry, and events.
//!
//! This module contains the server-side domain model: connection and user
//! identifiers, the resolved identity attached to a connection, the
//! registry that owns live connections, and the event bus that carries
//! domain events to the fanout router.

pub mod connection;
pub mod connection_id;
pub mod connection_registry;
pub mod domain_event;
pub mod event_bus;
pub mod identity;

pub use connection::{
    CloseReason, Connection, ConnectionHandle, DeliveryError, Outbound, OutboundEvent,
    OutboundReceiver,
};
pub use connection_id::ConnectionId;
pub use connection_registry::{ConnectionRegistry, RegistryStats};
pub use domain_event::DomainEvent;
pub use event_bus::EventBus;
pub use identity::{Identity, Role, UserId};
