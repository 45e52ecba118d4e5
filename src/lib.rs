//! # relay-gateway
//!
//! Authenticated WebSocket gateway with a connection registry and
//! domain-event fanout.
//!
//! Every connection is authenticated once, at accept time, with a bearer
//! token. The resolved identity is registered under both the connection id
//! and the user id; domain events published on the [`domain::EventBus`] are
//! then pushed to every connection, to one user, or to a room.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/) ── require_auth / require_admin
//!     ├── WS Handler (ws/)
//!     │
//!     ├── Authenticator (auth/) ── TokenValidator ── IdentityResolver
//!     │                                                   │
//!     │                                      UserDirectory (directory/)
//!     │                                      memory │ PostgreSQL
//!     │
//!     ├── Gateway (gateway/) ── ConnectionRegistry (domain/)
//!     │
//!     └── EventBus (domain/) ── FanoutRouter (gateway/) ── Transport (ws/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use app_state::AppState;
use ws::handler::ws_handler;

/// Builds the full HTTP application: REST routes, the `/ws` upgrade, and
/// the shared tracing and CORS layers.
///
/// `http_timeout` bounds REST requests only; upgraded sockets are
/// long-lived.
pub fn build_app(state: AppState, http_timeout: Duration) -> Router {
    let api = api::build_router(&state).layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        http_timeout,
    ));

    Router::new()
        .merge(api)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
