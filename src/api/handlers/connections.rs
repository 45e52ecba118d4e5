//! Admin view of the connection registry.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    ConnectionListResponse, ConnectionSummaryDto, PaginationParams, RegistryStatsDto,
};
use crate::app_state::AppState;
use crate::error::ErrorResponse;

/// `GET /connections` — Registry statistics and a page of connections.
#[utoipa::path(
    get,
    path = "/api/v1/connections",
    tag = "Admin",
    summary = "List connections",
    description = "Returns registry counters and a paginated list of authenticated connections, oldest first. Requires the admin role.",
    security(("bearer" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Registry snapshot", body = ConnectionListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Json<ConnectionListResponse> {
    let registry = state.gateway.registry();
    let rooms = state.gateway.rooms();
    let stats = registry.stats();

    let mut connections = registry.connections();
    connections.sort_by_key(|c| c.connected_at);
    let (page, pagination) = params.page_of(connections);
    let data = page
        .iter()
        .map(|c| ConnectionSummaryDto::new(c, rooms.rooms_of(c.id)))
        .collect();

    Json(ConnectionListResponse {
        stats: RegistryStatsDto {
            connections: stats.connections,
            users: stats.users,
            pending: stats.pending,
            rooms: rooms.room_count(),
        },
        data,
        pagination,
    })
}

/// Connection routes; require the admin role.
pub fn routes() -> Router<AppState> {
    Router::new().route("/connections", get(list_connections))
}
