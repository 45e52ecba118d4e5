//! REST endpoint handlers organized by resource.

pub mod connections;
pub mod events;
pub mod session;
pub mod system;

use axum::{Router, middleware};

use crate::app_state::AppState;
use crate::auth::middleware::{require_admin, require_auth};

/// Composes all resource routes under `/api/v1`.
///
/// Every route requires a bearer token; admin routes also require the
/// admin role.
pub fn routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .merge(connections::routes())
        .merge(events::routes())
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .merge(session::routes())
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
