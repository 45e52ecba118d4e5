//! Connection listing DTOs for the admin endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::{IdentityDto, PaginationMeta};
use crate::domain::Connection;

/// One registered connection.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionSummaryDto {
    /// Connection identifier.
    pub connection_id: uuid::Uuid,
    /// Identity attached at registration.
    pub user: IdentityDto,
    /// When the socket was accepted.
    pub connected_at: DateTime<Utc>,
    /// When authentication completed.
    pub authenticated_at: DateTime<Utc>,
    /// Rooms the connection has joined.
    pub rooms: Vec<String>,
}

impl ConnectionSummaryDto {
    /// Builds a summary from a registry snapshot entry and its rooms.
    #[must_use]
    pub fn new(connection: &Connection, rooms: Vec<String>) -> Self {
        Self {
            connection_id: *connection.id.as_uuid(),
            user: IdentityDto::from(&connection.identity),
            connected_at: connection.connected_at,
            authenticated_at: connection.authenticated_at,
            rooms,
        }
    }
}

/// Registry counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistryStatsDto {
    /// Authenticated connections.
    pub connections: usize,
    /// Users with an indexed connection.
    pub users: usize,
    /// Handshakes in flight.
    pub pending: usize,
    /// Non-empty rooms.
    pub rooms: usize,
}

/// Response body for `GET /connections`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionListResponse {
    /// Point-in-time counters.
    pub stats: RegistryStatsDto,
    /// Page of connections, oldest first.
    pub data: Vec<ConnectionSummaryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
