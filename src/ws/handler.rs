//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::auth::Handshake;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    /// Bearer token fallback for clients that cannot set headers.
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// Credentials are captured here and verified after the upgrade, so a
/// rejected client receives a close frame with a specific close code.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let handshake = Handshake::from_parts(&headers, query.token);
    let gateway = Arc::clone(&state.gateway);

    ws.on_upgrade(move |socket| run_connection(socket, handshake, gateway))
}
