//! Registry of live connections, keyed by connection id and by user id.
//!
//! [`ConnectionRegistry`] is the only mutable state shared between socket
//! tasks and the fanout router. Both maps and the pending-handshake set sit
//! behind a single [`Mutex`], so every operation is applied atomically and
//! no caller can observe a user index entry without its connection.
//!
//! # Concurrency
//!
//! - Critical sections are short map operations; they never await and never
//!   perform I/O, so a blocking mutex is used rather than an async lock.
//! - The lock is taken synchronously, which also lets drop guards release a
//!   connection on every exit path.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::connection::{Connection, ConnectionHandle};
use super::{ConnectionId, Identity, UserId};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct RegistryState {
    /// Sockets accepted but not yet authenticated.
    pending: HashMap<ConnectionId, DateTime<Utc>>,
    /// Primary ownership of authenticated connections.
    connections: HashMap<ConnectionId, Connection>,
    /// Secondary index: the connection currently targeted for a user.
    users: HashMap<UserId, ConnectionId>,
}

impl RegistryState {
    fn insert(&mut self, connection: Connection) -> Result<Option<Connection>, GatewayError> {
        let id = connection.id;
        if self.connections.contains_key(&id) {
            return Err(GatewayError::DuplicateConnection(id));
        }
        let user_id = connection.identity.user_id;
        let superseded = self
            .users
            .insert(user_id, id)
            .and_then(|previous| self.connections.get(&previous).cloned());
        self.connections.insert(id, connection);
        Ok(superseded)
    }

    fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.pending.remove(&id);
        let connection = self.connections.remove(&id)?;
        let user_id = connection.identity.user_id;
        if self.users.get(&user_id) == Some(&id) {
            self.users.remove(&user_id);
        }
        Some(connection)
    }
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Authenticated connections in the primary map.
    pub connections: usize,
    /// Users with an indexed connection.
    pub users: usize,
    /// Handshakes still in flight.
    pub pending: usize,
}

/// Concurrent store of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a freshly accepted socket whose handshake is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateConnection`] if the id is already
    /// pending or registered.
    pub fn begin_handshake(&self, id: ConnectionId) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if state.pending.contains_key(&id) || state.connections.contains_key(&id) {
            return Err(GatewayError::DuplicateConnection(id));
        }
        state.pending.insert(id, Utc::now());
        Ok(())
    }

    /// Completes a pending handshake by registering the connection.
    ///
    /// The pending check and the insertion happen in one critical section,
    /// so a connection unregistered while it was authenticating can never be
    /// registered afterwards.
    ///
    /// Returns the connection previously indexed for the same user, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionClosed`] if the handshake is no
    /// longer pending (the transport closed in the meantime).
    pub fn complete_handshake(
        &self,
        id: ConnectionId,
        identity: Identity,
        handle: ConnectionHandle,
    ) -> Result<Option<Connection>, GatewayError> {
        let mut state = self.lock();
        let Some(accepted_at) = state.pending.remove(&id) else {
            return Err(GatewayError::ConnectionClosed(id));
        };
        state.insert(Connection::new(id, identity, handle).accepted_at(accepted_at))
    }

    /// Inserts a connection into both maps.
    ///
    /// If the user already has an indexed connection, the index now points
    /// at `id` and the previous connection is returned. The previous
    /// connection stays in the primary map until it is unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DuplicateConnection`] if `id` is already
    /// registered; an attached identity is never replaced.
    pub fn register(
        &self,
        id: ConnectionId,
        identity: Identity,
        handle: ConnectionHandle,
    ) -> Result<Option<Connection>, GatewayError> {
        let mut state = self.lock();
        state.pending.remove(&id);
        state.insert(Connection::new(id, identity, handle))
    }

    /// Removes a connection, or its pending handshake.
    ///
    /// The user index entry is removed only if it still points at `id`, so a
    /// late unregister of a superseded connection leaves the fresher
    /// registration intact. Idempotent.
    pub fn unregister(&self, id: ConnectionId) -> Option<Connection> {
        self.lock().remove(id)
    }

    /// Returns the registered connection with the given id.
    #[must_use]
    pub fn lookup_by_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.lock().connections.get(&id).cloned()
    }

    /// Returns the connection currently indexed for a user.
    #[must_use]
    pub fn lookup_by_user(&self, user_id: UserId) -> Option<Connection> {
        let state = self.lock();
        state
            .users
            .get(&user_id)
            .and_then(|id| state.connections.get(id))
            .cloned()
    }

    /// Returns `true` if the id has a handshake in flight.
    #[must_use]
    pub fn is_pending(&self, id: ConnectionId) -> bool {
        self.lock().pending.contains_key(&id)
    }

    /// Snapshot of every registered connection.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.lock().connections.values().cloned().collect()
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().connections.len()
    }

    /// Returns `true` if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().connections.is_empty()
    }

    /// Number of users with an indexed connection.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// Number of handshakes in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Consistent counters taken under one lock.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let state = self.lock();
        RegistryStats {
            connections: state.connections.len(),
            users: state.users.len(),
            pending: state.pending.len(),
        }
    }

    /// Checks that every user index entry points at a registered connection
    /// carrying that user id.
    #[cfg(test)]
    fn check_index(&self) -> Result<(), String> {
        let state = self.lock();
        for (user_id, id) in &state.users {
            let Some(connection) = state.connections.get(id) else {
                return Err(format!("user {user_id} indexed to missing connection {id}"));
            };
            if connection.identity.user_id != *user_id {
                return Err(format!("user {user_id} indexed to foreign connection {id}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::domain::Role;

    fn identity(user_id: i64) -> Identity {
        Identity {
            user_id: UserId::new(user_id),
            email: format!("user{user_id}@example.com"),
            name: format!("User {user_id}"),
            role: Role::User,
        }
    }

    fn handle() -> ConnectionHandle {
        ConnectionHandle::channel(8).0
    }

    #[test]
    fn register_indexes_both_maps() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        assert!(matches!(registry.register(id, identity(42), handle()), Ok(None)));

        assert!(registry.lookup_by_connection(id).is_some());
        let Some(by_user) = registry.lookup_by_user(UserId::new(42)) else {
            panic!("user 42 should be indexed");
        };
        assert_eq!(by_user.id, id);
    }

    #[test]
    fn second_registration_supersedes_index_only() {
        let registry = ConnectionRegistry::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let _ = registry.register(first, identity(42), handle());

        let Ok(Some(superseded)) = registry.register(second, identity(42), handle()) else {
            panic!("expected the first connection to be superseded");
        };
        assert_eq!(superseded.id, first);
        assert_eq!(registry.user_count(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.lookup_by_user(UserId::new(42)).map(|c| c.id),
            Some(second)
        );
        assert!(registry.lookup_by_connection(first).is_some());
    }

    #[test]
    fn stale_unregister_keeps_fresh_index() {
        let registry = ConnectionRegistry::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        let _ = registry.register(first, identity(7), handle());
        let _ = registry.register(second, identity(7), handle());

        assert!(registry.unregister(first).is_some());
        assert_eq!(
            registry.lookup_by_user(UserId::new(7)).map(|c| c.id),
            Some(second)
        );

        assert!(registry.unregister(second).is_some());
        assert!(registry.lookup_by_user(UserId::new(7)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _ = registry.register(id, identity(1), handle());
        let result = registry.register(id, identity(2), handle());
        assert!(matches!(result, Err(GatewayError::DuplicateConnection(_))));
        assert_eq!(
            registry.lookup_by_connection(id).map(|c| c.identity.user_id),
            Some(UserId::new(1))
        );
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.unregister(ConnectionId::new()).is_none());
    }

    #[test]
    fn handshake_completes_only_while_pending() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        assert!(registry.begin_handshake(id).is_ok());
        assert!(registry.is_pending(id));
        assert_eq!(registry.pending_count(), 1);
        assert!(registry.lookup_by_connection(id).is_none());

        assert!(registry.complete_handshake(id, identity(3), handle()).is_ok());
        assert!(!registry.is_pending(id));
        assert!(registry.lookup_by_connection(id).is_some());
    }

    #[test]
    fn handshake_after_close_is_refused() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _ = registry.begin_handshake(id);
        assert!(registry.unregister(id).is_none());

        let result = registry.complete_handshake(id, identity(3), handle());
        assert!(matches!(result, Err(GatewayError::ConnectionClosed(_))));
        assert!(registry.is_empty());
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn begin_handshake_twice_is_rejected() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let _ = registry.begin_handshake(id);
        assert!(registry.begin_handshake(id).is_err());
    }

    #[test]
    fn stats_are_consistent() {
        let registry = ConnectionRegistry::new();
        let _ = registry.begin_handshake(ConnectionId::new());
        let _ = registry.register(ConnectionId::new(), identity(1), handle());
        let _ = registry.register(ConnectionId::new(), identity(1), handle());
        let _ = registry.register(ConnectionId::new(), identity(2), handle());

        let stats = registry.stats();
        assert_eq!(stats.connections, 3);
        assert_eq!(stats.users, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(registry.connections().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_keeps_index_consistent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();
        for worker in 0..16_i64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                for round in 0..50_i64 {
                    let id = ConnectionId::new();
                    let _ = registry.register(id, identity((worker + round) % 5), handle());
                    tokio::task::yield_now().await;
                    if round % 3 != 0 {
                        registry.unregister(id);
                    }
                }
            }));
        }
        for task in tasks {
            assert!(task.await.is_ok());
        }
        assert_eq!(registry.check_index(), Ok(()));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register { slot: usize, user: i64 },
        Unregister { slot: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..8_usize, 0..4_i64).prop_map(|(slot, user)| Op::Register { slot, user }),
            (0..8_usize).prop_map(|slot| Op::Unregister { slot }),
        ]
    }

    proptest! {
        #[test]
        fn no_dangling_index_after_any_sequence(ops in proptest::collection::vec(op(), 0..64)) {
            let slots: Vec<ConnectionId> = (0..8).map(|_| ConnectionId::new()).collect();
            let registry = ConnectionRegistry::new();
            for op in ops {
                match op {
                    Op::Register { slot, user } => {
                        if let Some(id) = slots.get(slot) {
                            let _ = registry.register(*id, identity(user), handle());
                        }
                    }
                    Op::Unregister { slot } => {
                        if let Some(id) = slots.get(slot) {
                            registry.unregister(*id);
                        }
                    }
                }
                prop_assert_eq!(registry.check_index(), Ok(()));
            }
        }
    }
}
