//! Gateway lifecycle controller.
//!
//! Drives each connection through
//! `Connecting → Authenticating → Authenticated → Closed`:
//!
//! ```text
//! accept ── connect() ── Session (pending handshake)
//!              │
//!              ├── authenticate()  token → claims → identity (bounded by timeout)
//!              │       ├── ok   → complete_handshake → Authenticated
//!              │       └── err  → unregister         → Closed
//!              │
//!              └── drop(Session) / disconnect() → unregister + leave rooms
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Authenticator, Handshake};
use crate::config::{GatewayConfig, SupersedePolicy};
use crate::domain::{CloseReason, ConnectionHandle, ConnectionId, ConnectionRegistry, Identity};
use crate::error::GatewayError;
use crate::ws::rooms::RoomTable;
use crate::ws::transport::WsTransport;

/// Per-connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, handshake not started.
    Connecting,
    /// Token verification or identity lookup in flight.
    Authenticating,
    /// Registered and reachable by the fanout router.
    Authenticated,
    /// Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Lifecycle settings taken from [`GatewayConfig`].
#[derive(Debug, Clone, Copy)]
pub struct GatewaySettings {
    /// Upper bound on verify + resolve.
    pub auth_timeout: Duration,
    /// Policy for a user's superseded connection.
    pub supersede_policy: SupersedePolicy,
    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,
    /// Maximum rooms a single connection may join.
    pub max_rooms_per_connection: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(5),
            supersede_policy: SupersedePolicy::default(),
            outbound_buffer: 256,
            max_rooms_per_connection: 64,
        }
    }
}

impl From<&GatewayConfig> for GatewaySettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            auth_timeout: config.auth_timeout,
            supersede_policy: config.supersede_policy,
            outbound_buffer: config.outbound_buffer,
            max_rooms_per_connection: config.max_rooms_per_connection,
        }
    }
}

/// Guard for one accepted connection.
///
/// Dropping the session unregisters the connection and removes it from
/// every room, whatever state it reached.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    state: ConnectionState,
    identity: Option<Identity>,
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTable>,
}

impl Session {
    /// Connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity attached on successful authentication.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.registry.unregister(self.id);
        self.rooms.leave_all(self.id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != ConnectionState::Closed {
            tracing::debug!(connection_id = %self.id, state = %self.state, "session dropped");
        }
        self.close();
    }
}

/// Orchestrates authentication, registration, and teardown.
#[derive(Debug)]
pub struct Gateway {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomTable>,
    transport: Arc<WsTransport>,
    authenticator: Arc<Authenticator>,
    settings: GatewaySettings,
}

impl Gateway {
    /// Creates a gateway with an empty registry and room table.
    #[must_use]
    pub fn new(authenticator: Arc<Authenticator>, settings: GatewaySettings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomTable::new(settings.max_rooms_per_connection));
        let transport = Arc::new(WsTransport::new(
            Arc::clone(&registry),
            Arc::clone(&rooms),
        ));
        Self {
            registry,
            rooms,
            transport,
            authenticator,
            settings,
        }
    }

    /// Shared connection registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Shared room table.
    #[must_use]
    pub const fn rooms(&self) -> &Arc<RoomTable> {
        &self.rooms
    }

    /// Outbound transport over the registry and rooms.
    #[must_use]
    pub const fn transport(&self) -> &Arc<WsTransport> {
        &self.transport
    }

    /// Per-connection outbound queue depth.
    #[must_use]
    pub const fn outbound_buffer(&self) -> usize {
        self.settings.outbound_buffer
    }

    /// Accepts a transport connection and records its pending handshake.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateConnection`] if the id is in use.
    pub fn connect(&self, id: ConnectionId) -> Result<Session, GatewayError> {
        self.registry.begin_handshake(id)?;
        tracing::debug!(connection_id = %id, "connection accepted");
        Ok(Session {
            id,
            state: ConnectionState::Connecting,
            identity: None,
            registry: Arc::clone(&self.registry),
            rooms: Arc::clone(&self.rooms),
        })
    }

    /// Runs the authentication pipeline for a session and registers it.
    ///
    /// On any failure the session is closed and nothing remains in the
    /// registry. When the user already had a connection and the policy is
    /// [`SupersedePolicy::Evict`], the older connection is asked to close.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AuthTimeout`] when the pipeline exceeds the
    /// configured timeout, [`GatewayError::ConnectionClosed`] when the
    /// connection went away during authentication, or the pipeline's own
    /// rejection.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        handshake: &Handshake,
        handle: ConnectionHandle,
    ) -> Result<Identity, GatewayError> {
        if session.state != ConnectionState::Connecting {
            return Err(GatewayError::InvalidRequest(format!(
                "cannot authenticate a {} connection",
                session.state
            )));
        }
        session.state = ConnectionState::Authenticating;

        let pipeline = self.authenticator.authenticate(handshake.token());
        let identity = match tokio::time::timeout(self.settings.auth_timeout, pipeline).await {
            Ok(Ok(identity)) => identity,
            Ok(Err(err)) => return Err(reject(session, err)),
            Err(_) => return Err(reject(session, GatewayError::AuthTimeout)),
        };

        let superseded = match self
            .registry
            .complete_handshake(session.id, identity.clone(), handle)
        {
            Ok(superseded) => superseded,
            Err(err) => return Err(reject(session, err)),
        };

        session.state = ConnectionState::Authenticated;
        session.identity = Some(identity.clone());
        tracing::info!(
            connection_id = %session.id,
            user_id = %identity.user_id,
            role = %identity.role,
            "connection authenticated"
        );

        if let Some(previous) = superseded {
            tracing::info!(
                connection_id = %previous.id,
                user_id = %identity.user_id,
                policy = ?self.settings.supersede_policy,
                "connection superseded"
            );
            if self.settings.supersede_policy == SupersedePolicy::Evict
                && let Err(err) = previous.handle().close(CloseReason::Superseded)
            {
                tracing::debug!(connection_id = %previous.id, error = %err, "superseded connection already gone");
            }
        }

        Ok(identity)
    }

    /// Joins a room on behalf of an authenticated session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionNotFound`] if the session is not
    /// registered, or the room table's validation error.
    pub fn join_room(&self, session: &Session, room: &str) -> Result<usize, GatewayError> {
        self.ensure_registered(session)?;
        let count = self.rooms.join(session.id, room)?;
        tracing::debug!(connection_id = %session.id, room, "room joined");
        Ok(count)
    }

    /// Leaves a room. Returns `true` if the session was a member.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionNotFound`] if the session is not
    /// registered.
    pub fn leave_room(&self, session: &Session, room: &str) -> Result<bool, GatewayError> {
        self.ensure_registered(session)?;
        Ok(self.rooms.leave(session.id, room))
    }

    fn ensure_registered(&self, session: &Session) -> Result<(), GatewayError> {
        if session.state == ConnectionState::Authenticated
            && self.registry.lookup_by_connection(session.id).is_some()
        {
            Ok(())
        } else {
            Err(GatewayError::ConnectionNotFound(session.id))
        }
    }

    /// Unregisters a connection regardless of its state. Idempotent.
    ///
    /// Returns `true` if a pending handshake or registration was removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let was_pending = self.registry.is_pending(id);
        let removed = self.registry.unregister(id);
        let rooms = self.rooms.leave_all(id);
        if let Some(connection) = &removed {
            tracing::info!(
                connection_id = %id,
                user_id = %connection.identity.user_id,
                rooms,
                "connection closed"
            );
        }
        removed.is_some() || was_pending
    }
}

fn reject(session: &mut Session, err: GatewayError) -> GatewayError {
    tracing::warn!(
        connection_id = %session.id,
        error = %err,
        code = err.error_code(),
        "authentication failed"
    );
    session.close();
    err
}
