//! Outbound transport primitives consumed by the fanout router.

use std::fmt;
use std::sync::Arc;

use crate::domain::{ConnectionId, OutboundEvent};

/// Push side of the real-time transport.
///
/// The fanout router only decides *who* receives an event; how a frame
/// reaches a socket, and which sockets form a room, is the transport's
/// business.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Queues an event for one connection. Returns `false` if the
    /// connection is unknown, gone, or its buffer is full.
    fn send_to(&self, connection_id: ConnectionId, event: &Arc<OutboundEvent>) -> bool;

    /// Queues an event for every member of a room. Returns the number of
    /// connections the frame was queued for.
    fn send_to_room(&self, room: &str, event: &Arc<OutboundEvent>) -> usize;

    /// Queues an event for every registered connection. Returns the number
    /// of connections the frame was queued for.
    fn broadcast(&self, event: &Arc<OutboundEvent>) -> usize;
}
