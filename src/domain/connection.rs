//! Registered connections and their outbound delivery handle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Identity};

/// Event frame pushed to one or more connections.
///
/// Built once per domain event and shared across recipients behind an
/// [`Arc`]; each socket task renders its own envelope around it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    /// Client-facing event name (e.g. `"order:updated"`).
    pub event: String,
    /// Event payload forwarded unchanged from the domain event.
    pub payload: Value,
}

impl OutboundEvent {
    /// Creates a shared outbound event.
    #[must_use]
    pub fn shared(event: impl Into<String>, payload: Value) -> Arc<Self> {
        Arc::new(Self {
            event: event.into(),
            payload,
        })
    }
}

/// Why the server asks a connection to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer connection for the same user took over the user index.
    Superseded,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// WebSocket close code sent to the client.
    #[must_use]
    pub const fn close_code(self) -> u16 {
        match self {
            Self::Superseded => 4409,
            Self::Shutdown => 1001,
        }
    }

    /// Human-readable close reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Superseded => "superseded by a newer session",
            Self::Shutdown => "server shutting down",
        }
    }
}

/// Item drained by a connection's socket task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Forward an event frame to the client.
    Event(Arc<OutboundEvent>),
    /// Close the socket with the given reason.
    Close(CloseReason),
}

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection's outbound buffer is full; the frame was dropped.
    #[error("outbound buffer full")]
    Full,
    /// The socket task has already exited.
    #[error("connection gone")]
    Gone,
}

/// Sending half of a connection's outbound path.
///
/// Event frames go through a bounded queue and queuing never waits: a full
/// buffer drops the frame so one slow client cannot stall the fanout for
/// everyone else. Close requests travel on a separate watch channel with no
/// capacity limit, so a full buffer never keeps a socket open.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Arc<OutboundEvent>>,
    close: Arc<watch::Sender<Option<CloseReason>>>,
}

impl ConnectionHandle {
    /// Creates a handle and the receiver the socket task drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, OutboundReceiver) {
        let (tx, events) = mpsc::channel(capacity.max(1));
        let (close, close_rx) = watch::channel(None);
        let handle = Self {
            tx,
            close: Arc::new(close),
        };
        let receiver = OutboundReceiver {
            events,
            close: close_rx,
            close_seen: false,
        };
        (handle, receiver)
    }

    /// Queues an event frame.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Full`] when the buffer is full and
    /// [`DeliveryError::Gone`] when the receiver was dropped.
    pub fn send(&self, event: Arc<OutboundEvent>) -> Result<(), DeliveryError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Gone,
        })
    }

    /// Asks the socket task to close the connection.
    ///
    /// Independent of the event buffer. The first reason wins.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Gone`] when the receiver was dropped.
    pub fn close(&self, reason: CloseReason) -> Result<(), DeliveryError> {
        if self.close.is_closed() {
            return Err(DeliveryError::Gone);
        }
        self.close.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        Ok(())
    }
}

/// Receiving half of a connection's outbound path, owned by its socket task.
///
/// A pending close request is always yielded before queued event frames.
#[derive(Debug)]
pub struct OutboundReceiver {
    events: mpsc::Receiver<Arc<OutboundEvent>>,
    close: watch::Receiver<Option<CloseReason>>,
    close_seen: bool,
}

impl OutboundReceiver {
    /// Waits for the next item. `None` once every handle is dropped and
    /// the queue is drained.
    ///
    /// Cancel safe: usable as a `tokio::select!` branch.
    pub async fn recv(&mut self) -> Option<Outbound> {
        loop {
            if let Some(reason) = self.pending_close() {
                return Some(Outbound::Close(reason));
            }
            if self.close_seen {
                return self.events.recv().await.map(Outbound::Event);
            }
            tokio::select! {
                biased;
                changed = self.close.changed() => {
                    if changed.is_err() {
                        // Every handle is gone; only queued frames remain.
                        self.close_seen = true;
                    }
                }
                event = self.events.recv() => return event.map(Outbound::Event),
            }
        }
    }

    /// Non-blocking variant of [`OutboundReceiver::recv`].
    ///
    /// # Errors
    ///
    /// Returns [`mpsc::error::TryRecvError`] when nothing is pending.
    pub fn try_recv(&mut self) -> Result<Outbound, mpsc::error::TryRecvError> {
        if let Some(reason) = self.pending_close() {
            return Ok(Outbound::Close(reason));
        }
        self.events.try_recv().map(Outbound::Event)
    }

    fn pending_close(&mut self) -> Option<CloseReason> {
        if self.close_seen {
            return None;
        }
        let reason = *self.close.borrow_and_update();
        if reason.is_some() {
            self.close_seen = true;
        }
        reason
    }
}

/// One live, authenticated transport session owned by the registry.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Transport-assigned identifier.
    pub id: ConnectionId,
    /// Identity attached at registration.
    pub identity: Identity,
    /// When the transport accepted the socket.
    pub connected_at: DateTime<Utc>,
    /// When registration completed.
    pub authenticated_at: DateTime<Utc>,
    handle: ConnectionHandle,
}

impl Connection {
    /// Creates a connection accepted and authenticated just now.
    #[must_use]
    pub fn new(id: ConnectionId, identity: Identity, handle: ConnectionHandle) -> Self {
        let now = Utc::now();
        Self {
            id,
            identity,
            connected_at: now,
            authenticated_at: now,
            handle,
        }
    }

    /// Overrides the accept timestamp (the socket was accepted before
    /// authentication finished).
    #[must_use]
    pub fn accepted_at(mut self, at: DateTime<Utc>) -> Self {
        self.connected_at = at;
        self
    }

    /// Outbound handle used by the transport to push frames.
    #[must_use]
    pub const fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_reaches_receiver() {
        let (handle, mut rx) = ConnectionHandle::channel(4);
        let sent = handle.send(OutboundEvent::shared("user:created", json!({ "id": 1 })));
        assert!(sent.is_ok());

        let Some(Outbound::Event(event)) = rx.recv().await else {
            panic!("expected an event frame");
        };
        assert_eq!(event.event, "user:created");
    }

    #[test]
    fn full_buffer_drops_frame() {
        let (handle, _rx) = ConnectionHandle::channel(1);
        assert!(handle.send(OutboundEvent::shared("x", json!(null))).is_ok());
        assert_eq!(
            handle.send(OutboundEvent::shared("y", json!(null))),
            Err(DeliveryError::Full)
        );
    }

    #[test]
    fn close_bypasses_full_buffer() {
        let (handle, mut rx) = ConnectionHandle::channel(1);
        assert!(handle.send(OutboundEvent::shared("x", json!(null))).is_ok());
        assert!(handle.close(CloseReason::Superseded).is_ok());

        assert!(matches!(
            rx.try_recv(),
            Ok(Outbound::Close(CloseReason::Superseded))
        ));
        assert!(matches!(rx.try_recv(), Ok(Outbound::Event(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn first_close_reason_wins() {
        let (handle, mut rx) = ConnectionHandle::channel(1);
        assert!(handle.close(CloseReason::Superseded).is_ok());
        assert!(handle.close(CloseReason::Shutdown).is_ok());

        let Some(Outbound::Close(reason)) = rx.recv().await else {
            panic!("expected a close request");
        };
        assert_eq!(reason, CloseReason::Superseded);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn recv_ends_when_handles_drop() {
        let (handle, mut rx) = ConnectionHandle::channel(2);
        assert!(handle.send(OutboundEvent::shared("x", json!(null))).is_ok());
        drop(handle);

        assert!(matches!(rx.recv().await, Some(Outbound::Event(_))));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn dropped_receiver_is_gone() {
        let (handle, rx) = ConnectionHandle::channel(1);
        drop(rx);
        assert_eq!(
            handle.close(CloseReason::Superseded),
            Err(DeliveryError::Gone)
        );
    }
}
