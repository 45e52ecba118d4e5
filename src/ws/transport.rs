//! WebSocket implementation of the outbound [`Transport`] primitives.

use std::sync::Arc;

use crate::domain::connection::DeliveryError;
use crate::domain::{ConnectionHandle, ConnectionId, ConnectionRegistry, OutboundEvent};
use crate::gateway::Transport;

use super::rooms::RoomTable;

/// Delivers frames through the outbound handles held by the registry.
#[derive(Debug, Clone)]
pub struct WsTransport {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTable>,
}

impl WsTransport {
    /// Creates a transport over the shared registry and room table.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomTable>) -> Self {
        Self { registry, rooms }
    }

    /// Room table shared with the socket tasks.
    #[must_use]
    pub fn rooms(&self) -> &Arc<RoomTable> {
        &self.rooms
    }
}

fn deliver(id: ConnectionId, handle: &ConnectionHandle, event: &Arc<OutboundEvent>) -> bool {
    match handle.send(Arc::clone(event)) {
        Ok(()) => true,
        Err(DeliveryError::Full) => {
            tracing::warn!(connection_id = %id, event = %event.event, "outbound buffer full, frame dropped");
            false
        }
        Err(DeliveryError::Gone) => {
            tracing::debug!(connection_id = %id, "connection gone before delivery");
            false
        }
    }
}

impl Transport for WsTransport {
    fn send_to(&self, connection_id: ConnectionId, event: &Arc<OutboundEvent>) -> bool {
        self.registry
            .lookup_by_connection(connection_id)
            .is_some_and(|c| deliver(c.id, c.handle(), event))
    }

    fn send_to_room(&self, room: &str, event: &Arc<OutboundEvent>) -> usize {
        self.rooms
            .members(room)
            .into_iter()
            .filter(|id| self.send_to(*id, event))
            .count()
    }

    fn broadcast(&self, event: &Arc<OutboundEvent>) -> usize {
        self.registry
            .connections()
            .iter()
            .filter(|c| deliver(c.id, c.handle(), event))
            .count()
    }
}
