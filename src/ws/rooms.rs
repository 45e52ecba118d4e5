//! Room membership table.
//!
//! Tracks which connections joined which named rooms (e.g. `order:7`).
//! Rooms are a transport concept: the registry knows nothing about them
//! and the fanout router only names the room it targets.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::ConnectionId;
use crate::error::GatewayError;

/// Longest accepted room name, in bytes.
pub const MAX_ROOM_NAME_LEN: usize = 128;

#[derive(Debug, Default)]
struct RoomState {
    members: HashMap<String, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<String>>,
}

/// Two-way index between rooms and their member connections.
#[derive(Debug)]
pub struct RoomTable {
    state: Mutex<RoomState>,
    max_rooms_per_connection: usize,
}

impl RoomTable {
    /// Creates an empty table with a per-connection room limit.
    #[must_use]
    pub fn new(max_rooms_per_connection: usize) -> Self {
        Self {
            state: Mutex::new(RoomState::default()),
            max_rooms_per_connection,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a connection to a room. Joining a room twice is a no-op.
    ///
    /// Returns the number of rooms the connection is now in.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the room name is empty,
    /// too long, or contains whitespace, or if the connection already sits
    /// in the maximum number of rooms.
    pub fn join(&self, connection_id: ConnectionId, room: &str) -> Result<usize, GatewayError> {
        validate_room_name(room)?;
        let mut state = self.lock();
        let (already_member, current) = state
            .joined
            .get(&connection_id)
            .map_or((false, 0), |rooms| (rooms.contains(room), rooms.len()));
        if !already_member && current >= self.max_rooms_per_connection {
            return Err(GatewayError::InvalidRequest(format!(
                "room limit of {} reached",
                self.max_rooms_per_connection
            )));
        }
        let joined = state.joined.entry(connection_id).or_default();
        joined.insert(room.to_string());
        let count = joined.len();
        state
            .members
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
        Ok(count)
    }

    /// Removes a connection from a room. Returns `true` if it was a member.
    pub fn leave(&self, connection_id: ConnectionId, room: &str) -> bool {
        let mut state = self.lock();
        let was_member = state
            .joined
            .get_mut(&connection_id)
            .is_some_and(|rooms| rooms.remove(room));
        if state.joined.get(&connection_id).is_some_and(HashSet::is_empty) {
            state.joined.remove(&connection_id);
        }
        if let Some(members) = state.members.get_mut(room) {
            members.remove(&connection_id);
            if members.is_empty() {
                state.members.remove(room);
            }
        }
        was_member
    }

    /// Removes a connection from every room it joined. Returns how many.
    pub fn leave_all(&self, connection_id: ConnectionId) -> usize {
        let mut state = self.lock();
        let Some(rooms) = state.joined.remove(&connection_id) else {
            return 0;
        };
        for room in &rooms {
            if let Some(members) = state.members.get_mut(room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    state.members.remove(room);
                }
            }
        }
        rooms.len()
    }

    /// Snapshot of a room's members.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.lock()
            .members
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms a connection currently sits in, sorted.
    #[must_use]
    pub fn rooms_of(&self, connection_id: ConnectionId) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .lock()
            .joined
            .get(&connection_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Number of non-empty rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.lock().members.len()
    }
}

fn validate_room_name(room: &str) -> Result<(), GatewayError> {
    if room.is_empty() || room.len() > MAX_ROOM_NAME_LEN {
        return Err(GatewayError::InvalidRequest(format!(
            "room name must be 1..={MAX_ROOM_NAME_LEN} bytes"
        )));
    }
    if room.chars().any(char::is_whitespace) {
        return Err(GatewayError::InvalidRequest(
            "room name must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}
